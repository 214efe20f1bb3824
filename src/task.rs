// Data model for the task store

use serde::{Deserialize, Serialize};

/// A single to-do item as persisted in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoTask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub favorite: bool,
}

impl TodoTask {
    /// Build a fresh task from caller input with a newly assigned id
    pub fn from_new(new: NewTask) -> Self {
        Self {
            id: new_id(),
            title: new.title,
            description: new.description,
            completed: false,
            favorite: false,
        }
    }

    pub fn has_description(&self) -> bool {
        !self.description.is_empty()
    }
}

/// Caller-supplied fields for `TaskStore::add`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// State of a request as seen by a consumer
///
/// `TaskStore` publishes its first `Success` before `open` returns, so its
/// subscribers only ever see `Success` or `Error`. `Loading` is the seed value
/// of a channel that has not been published to yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "data", rename_all = "lowercase")]
pub enum RequestState<T> {
    Loading,
    Success(T),
    Error(String),
}

impl<T> RequestState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, RequestState::Loading)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RequestState::Success(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RequestState::Error(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            RequestState::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            RequestState::Error(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            RequestState::Success(data) => Some(data),
            _ => None,
        }
    }
}

/// One emitted state of a task query
pub type Snapshot = RequestState<Vec<TodoTask>>;

/// Time-ordered unique id for a new task
pub fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}
