// todostore - Reactive to-do task store over SQLite

pub mod config;
pub mod error;
pub mod query;
pub mod row;
pub mod store;
pub mod subscription;
pub mod task;

// Re-export main types for convenience
pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use query::TaskQuery;
pub use row::{IntentQueue, RowEvent, RowIntent, RowView, TaskRow, TaskRowCallbacks, TrailingIcon};
pub use store::TaskStore;
pub use subscription::Subscription;
pub use task::{NewTask, RequestState, Snapshot, TodoTask};
