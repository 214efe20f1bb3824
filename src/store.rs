// Task store backed by SQLite with live query snapshots

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::query::TaskQuery;
use crate::subscription::Subscription;
use crate::task::{NewTask, RequestState, Snapshot, TodoTask};
use fs2::FileExt;
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::fs::{self, File, OpenOptions};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, info, warn};

const SELECT_BY_COMPLETED: &str =
    "SELECT id, title, description, completed, favorite FROM tasks WHERE completed = ?1 ORDER BY rowid";
const SELECT_BY_ID: &str = "SELECT id, title, description, completed, favorite FROM tasks WHERE id = ?1";

const MAX_ID_LEN: usize = 256;

/// Persistent collection of `TodoTask` records with reactive queries
///
/// Cloning is cheap and every clone shares the same connection. The connection is
/// opened by [`TaskStore::open`] and released by [`TaskStore::close`] or when the
/// last clone is dropped.
#[derive(Clone)]
pub struct TaskStore {
    inner: Arc<Inner>,
}

struct Inner {
    config: StoreConfig,
    db: Mutex<Option<Connection>>,
    lock: Mutex<Option<File>>,
    active: watch::Sender<Snapshot>,
    completed: watch::Sender<Snapshot>,
}

impl TaskStore {
    /// Open or create a store in `config.path`
    ///
    /// Takes an exclusive lock on the directory, creates the schema if needed and
    /// compacts the database when `compact_on_open` is set.
    pub fn open(config: StoreConfig) -> Result<Self> {
        fs::create_dir_all(&config.path)?;

        let lock = Self::acquire_lock(&config)?;

        let db = Connection::open(config.db_path())?;
        Self::create_schema(&db)?;

        if config.compact_on_open {
            debug!(path = ?config.db_path(), "Compacting database");
            db.execute_batch("VACUUM")?;
        }

        let (active, _) = watch::channel(Snapshot::Loading);
        let (completed, _) = watch::channel(Snapshot::Loading);

        let inner = Inner {
            config,
            db: Mutex::new(None),
            lock: Mutex::new(Some(lock)),
            active,
            completed,
        };
        inner.publish(&db);
        *inner.lock_db() = Some(db);

        info!(path = ?inner.config.path, "Opened task store");

        Ok(Self { inner: Arc::new(inner) })
    }

    /// Configuration this store was opened with
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn is_open(&self) -> bool {
        self.inner.lock_db().is_some()
    }

    /// Close the connection and release the directory lock
    ///
    /// Every live subscription receives an error snapshot; later writes fail with
    /// `ConnectionUnavailable`. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let Some(db) = self.inner.lock_db().take() else {
            return Ok(());
        };

        let closed = RequestState::Error(StoreError::ConnectionUnavailable.to_string());
        self.inner.active.send_replace(closed.clone());
        self.inner.completed.send_replace(closed);

        let lock = self.inner.lock.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(file) = lock
            && let Err(e) = FileExt::unlock(&file)
        {
            warn!(error = %e, "Failed to release store lock");
        }

        info!(path = ?self.inner.config.path, "Closed task store");
        db.close().map_err(|(_, e)| StoreError::Transaction(e))
    }

    fn acquire_lock(config: &StoreConfig) -> Result<File> {
        let lock_path = config.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;

        file.try_lock_exclusive()
            .map_err(|e| lock_error(e, &config.path))?;

        Ok(file)
    }

    fn create_schema(db: &Connection) -> Result<()> {
        debug!("Creating database schema");

        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                completed INTEGER NOT NULL DEFAULT 0,
                favorite INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_completed ON tasks(completed);
            "#,
        )?;

        Ok(())
    }

    // ========================================================================
    // Reactive reads
    // ========================================================================

    /// Live view of incomplete tasks, favorites first
    pub fn read_active(&self) -> Subscription {
        self.subscribe(TaskQuery::Active)
    }

    /// Live view of completed tasks in storage order
    pub fn read_completed(&self) -> Subscription {
        self.subscribe(TaskQuery::Completed)
    }

    pub fn subscribe(&self, query: TaskQuery) -> Subscription {
        Subscription::new(query, self.inner.sender(query).subscribe())
    }

    /// Fetch a single task by id
    pub async fn get(&self, id: &str) -> Result<Option<TodoTask>> {
        Self::validate_id(id)?;
        let id = id.to_string();

        self.with_connection(move |db| {
            let task = db
                .prepare_cached(SELECT_BY_ID)?
                .query_row([&id], row_to_task)
                .optional()?;
            Ok(task)
        })
        .await
    }

    /// One-shot read of a query's current result set
    pub async fn list(&self, query: TaskQuery) -> Result<Vec<TodoTask>> {
        self.with_connection(move |db| Ok(load(db, query)?)).await
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Insert a new task and return it with its assigned id
    pub async fn add(&self, new: NewTask) -> Result<TodoTask> {
        let task = TodoTask::from_new(new);
        let record = task.clone();

        self.write("add", move |tx| {
            tx.execute(
                "INSERT INTO tasks (id, title, description, completed, favorite)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    record.id,
                    record.title,
                    record.description,
                    record.completed,
                    record.favorite
                ],
            )?;
            Ok(())
        })
        .await?;

        Ok(task)
    }

    /// Overwrite title and description of an existing task
    pub async fn update(&self, id: &str, title: &str, description: &str) -> Result<()> {
        Self::validate_id(id)?;

        let id = id.to_string();
        let title = title.to_string();
        let description = description.to_string();

        self.write("update", move |tx| {
            let changed = tx.execute(
                "UPDATE tasks SET title = ?2, description = ?3 WHERE id = ?1",
                rusqlite::params![id, title, description],
            )?;
            found(changed, &id)
        })
        .await
    }

    pub async fn set_completed(&self, id: &str, completed: bool) -> Result<()> {
        self.set_flag("set_completed", "completed", id, completed).await
    }

    pub async fn set_favorite(&self, id: &str, favorite: bool) -> Result<()> {
        self.set_flag("set_favorite", "favorite", id, favorite).await
    }

    /// Permanently remove a task
    pub async fn delete(&self, id: &str) -> Result<()> {
        Self::validate_id(id)?;
        let id = id.to_string();

        self.write("delete", move |tx| {
            let changed = tx.execute("DELETE FROM tasks WHERE id = ?1", [&id])?;
            found(changed, &id)
        })
        .await
    }

    async fn set_flag(&self, op: &'static str, column: &'static str, id: &str, value: bool) -> Result<()> {
        Self::validate_id(id)?;
        let id = id.to_string();

        self.write(op, move |tx| {
            // column is one of two literals above, never caller input
            let sql = format!("UPDATE tasks SET {} = ?2 WHERE id = ?1", column);
            let changed = tx.execute(&sql, rusqlite::params![id, value])?;
            found(changed, &id)
        })
        .await
    }

    // ========================================================================
    // Helper methods
    // ========================================================================

    /// Run `f` in its own transaction on a blocking worker, then publish fresh snapshots
    async fn write<F, R>(&self, op: &'static str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction<'_>) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);

        let result = tokio::task::spawn_blocking(move || -> Result<R> {
            let mut guard = inner.lock_db();
            let db = guard.as_mut().ok_or(StoreError::ConnectionUnavailable)?;

            let tx = db.transaction()?;
            let out = f(&tx)?;
            tx.commit()?;

            inner.publish(db);
            Ok(out)
        })
        .await
        .unwrap_or_else(|e| Err(StoreError::from(e)));

        match &result {
            Ok(_) => debug!(op, "Write committed"),
            Err(e) => warn!(op, error = %e, "Write failed"),
        }

        result
    }

    async fn with_connection<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);

        tokio::task::spawn_blocking(move || -> Result<R> {
            let guard = inner.lock_db();
            let db = guard.as_ref().ok_or(StoreError::ConnectionUnavailable)?;
            f(db)
        })
        .await?
    }

    fn validate_id(id: &str) -> Result<()> {
        if id.trim().is_empty() {
            return Err(StoreError::InvalidInput("Task ID cannot be empty".to_string()));
        }
        if id.len() > MAX_ID_LEN {
            return Err(StoreError::InvalidInput(format!(
                "Task ID too long: {} chars (max {})",
                id.len(),
                MAX_ID_LEN
            )));
        }
        Ok(())
    }
}

impl Inner {
    fn lock_db(&self) -> MutexGuard<'_, Option<Connection>> {
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn sender(&self, query: TaskQuery) -> &watch::Sender<Snapshot> {
        match query {
            TaskQuery::Active => &self.active,
            TaskQuery::Completed => &self.completed,
        }
    }

    /// Re-run every query and push the results to subscribers
    fn publish(&self, db: &Connection) {
        for query in TaskQuery::ALL {
            let snapshot = match load(db, query) {
                Ok(tasks) => RequestState::Success(tasks),
                Err(e) => {
                    warn!(%query, error = %e, "Failed to refresh query");
                    RequestState::Error(e.to_string())
                }
            };
            self.sender(query).send_replace(snapshot);
        }
    }
}

fn load(db: &Connection, query: TaskQuery) -> rusqlite::Result<Vec<TodoTask>> {
    let mut stmt = db.prepare_cached(SELECT_BY_COMPLETED)?;
    let tasks = stmt
        .query_map([query.completed_value()], row_to_task)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(query.arrange(tasks))
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<TodoTask> {
    Ok(TodoTask {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        completed: row.get(3)?,
        favorite: row.get(4)?,
    })
}

/// Contention means another owner; anything else is a plain io failure
fn lock_error(e: std::io::Error, path: &std::path::Path) -> StoreError {
    if e.kind() == fs2::lock_contended_error().kind() {
        StoreError::Locked(path.to_path_buf())
    } else {
        StoreError::Io(e)
    }
}

fn found(changed: usize, id: &str) -> Result<()> {
    if changed == 0 {
        return Err(StoreError::RecordNotFound(id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open(temp: &TempDir) -> TaskStore {
        TaskStore::open(StoreConfig::new(temp.path())).unwrap()
    }

    fn ids(tasks: &[TodoTask]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    async fn snapshot(sub: &mut Subscription) -> Vec<TodoTask> {
        sub.next().await.unwrap().into_data().unwrap()
    }

    #[test]
    fn test_store_open_creates_files() {
        let temp = TempDir::new().unwrap();

        let store = open(&temp);
        assert!(store.is_open());
        assert!(temp.path().join("todo.db").exists());
        assert!(temp.path().join("todo.lock").exists());
    }

    #[test]
    fn test_open_twice_is_locked() {
        let temp = TempDir::new().unwrap();
        let _store = open(&temp);

        let second = TaskStore::open(StoreConfig::new(temp.path()));
        assert!(matches!(second, Err(StoreError::Locked(_))));
    }

    #[tokio::test]
    async fn test_add_then_get_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);

        let added = store
            .add(NewTask::new("Buy milk").with_description("2 liters"))
            .await
            .unwrap();

        let fetched = store.get(&added.id).await.unwrap().unwrap();
        assert_eq!(fetched, added);
        assert_eq!(fetched.title, "Buy milk");
        assert_eq!(fetched.description, "2 liters");
        assert!(!fetched.completed);
        assert!(!fetched.favorite);
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);

        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_title_round_trips() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);

        let task = store.add(NewTask::new("")).await.unwrap();
        let fetched = store.get(&task.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "");

        let named = store.add(NewTask::new("named")).await.unwrap();
        store.update(&named.id, "", "d").await.unwrap();
        let updated = store.get(&named.id).await.unwrap().unwrap();
        assert_eq!(updated.title, "");
        assert_eq!(updated.description, "d");
    }

    #[test]
    fn test_lock_error_mapping() {
        let path = std::path::Path::new("/tmp/tasks");

        let contended = lock_error(fs2::lock_contended_error(), path);
        assert!(matches!(contended, StoreError::Locked(p) if p == path));

        let denied = lock_error(std::io::Error::from(std::io::ErrorKind::PermissionDenied), path);
        assert!(matches!(denied, StoreError::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied));
    }

    #[tokio::test]
    async fn test_initial_snapshots_are_empty_success() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);

        let mut active = store.read_active();
        let mut completed = store.read_completed();
        assert_eq!(active.next().await, Some(RequestState::Success(vec![])));
        assert_eq!(completed.next().await, Some(RequestState::Success(vec![])));
    }

    #[tokio::test]
    async fn test_active_stream_favorites_first() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);

        let a = store.add(NewTask::new("a")).await.unwrap();
        let b = store.add(NewTask::new("b")).await.unwrap();
        let c = store.add(NewTask::new("c")).await.unwrap();
        let d = store.add(NewTask::new("d")).await.unwrap();

        store.set_favorite(&c.id, true).await.unwrap();
        store.set_favorite(&b.id, true).await.unwrap();

        let mut active = store.read_active();
        let tasks = snapshot(&mut active).await;
        assert_eq!(ids(&tasks), vec![b.id.as_str(), c.id.as_str(), a.id.as_str(), d.id.as_str()]);
    }

    #[tokio::test]
    async fn test_streams_partition_by_completed() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);

        let mut added = Vec::new();
        for i in 0..6 {
            added.push(store.add(NewTask::new(format!("task {}", i))).await.unwrap());
        }
        for task in added.iter().step_by(2) {
            store.set_completed(&task.id, true).await.unwrap();
        }
        store.delete(&added[1].id).await.unwrap();

        let active = snapshot(&mut store.read_active()).await;
        let completed = snapshot(&mut store.read_completed()).await;

        assert!(active.iter().all(|t| !t.completed));
        assert!(completed.iter().all(|t| t.completed));
        assert_eq!(active.len(), 2);
        assert_eq!(
            ids(&completed),
            vec![added[0].id.as_str(), added[2].id.as_str(), added[4].id.as_str()]
        );
    }

    #[tokio::test]
    async fn test_set_completed_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);

        let task = store.add(NewTask::new("once")).await.unwrap();
        store.set_completed(&task.id, true).await.unwrap();
        store.set_completed(&task.id, true).await.unwrap();

        let completed = snapshot(&mut store.read_completed()).await;
        assert_eq!(completed.len(), 1);
        assert!(completed[0].completed);
        assert!(store.list(TaskQuery::Active).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_changes_only_text() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);

        let target = store.add(NewTask::new("old").with_description("old desc")).await.unwrap();
        let other = store.add(NewTask::new("other")).await.unwrap();
        store.set_favorite(&target.id, true).await.unwrap();

        store.update(&target.id, "new", "new desc").await.unwrap();

        let updated = store.get(&target.id).await.unwrap().unwrap();
        assert_eq!(updated.id, target.id);
        assert_eq!(updated.title, "new");
        assert_eq!(updated.description, "new desc");
        assert!(updated.favorite);
        assert!(!updated.completed);

        assert_eq!(store.get(&other.id).await.unwrap().unwrap(), other);
    }

    #[tokio::test]
    async fn test_delete_removes_from_streams() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);

        let mut active = store.read_active();
        assert!(snapshot(&mut active).await.is_empty());

        let task = store.add(NewTask::new("gone soon")).await.unwrap();
        assert_eq!(ids(&snapshot(&mut active).await), vec![task.id.as_str()]);

        store.delete(&task.id).await.unwrap();
        assert!(snapshot(&mut active).await.is_empty());
        assert!(store.get(&task.id).await.unwrap().is_none());
        assert!(store.list(TaskQuery::Completed).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);

        assert!(matches!(
            store.set_completed("nope", true).await,
            Err(StoreError::RecordNotFound(id)) if id == "nope"
        ));
        assert!(matches!(
            store.set_favorite("nope", true).await,
            Err(StoreError::RecordNotFound(_))
        ));
        assert!(matches!(
            store.update("nope", "t", "").await,
            Err(StoreError::RecordNotFound(_))
        ));
        assert!(matches!(store.delete("nope").await, Err(StoreError::RecordNotFound(_))));
    }

    #[tokio::test]
    async fn test_invalid_ids_rejected() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);

        assert!(matches!(store.delete("").await, Err(StoreError::InvalidInput(_))));
        assert!(matches!(
            store.get(&"x".repeat(MAX_ID_LEN + 1)).await,
            Err(StoreError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_favorite_then_complete_scenario() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);

        let first = store.add(NewTask::new("Walk dog")).await.unwrap();
        let milk = store.add(NewTask::new("Buy milk")).await.unwrap();

        let mut active = store.read_active();
        let mut completed = store.read_completed();

        let tasks = snapshot(&mut active).await;
        assert_eq!(ids(&tasks), vec![first.id.as_str(), milk.id.as_str()]);
        assert!(!tasks[1].favorite);

        store.set_favorite(&milk.id, true).await.unwrap();
        let tasks = snapshot(&mut active).await;
        assert_eq!(ids(&tasks), vec![milk.id.as_str(), first.id.as_str()]);

        store.set_completed(&milk.id, true).await.unwrap();
        let tasks = snapshot(&mut active).await;
        assert_eq!(ids(&tasks), vec![first.id.as_str()]);

        let done = snapshot(&mut completed).await;
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id, milk.id);
        assert!(done[0].favorite);
    }

    #[tokio::test]
    async fn test_close_delivers_error_and_rejects_writes() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);

        let mut active = store.read_active();
        assert!(active.next().await.unwrap().is_success());

        store.close().unwrap();
        assert!(!store.is_open());

        let snap = active.next().await.unwrap();
        assert_eq!(snap.error(), Some("store is closed"));

        // New subscriptions on a closed store start in the error state
        let mut completed = store.read_completed();
        assert!(completed.next().await.unwrap().is_error());

        assert!(matches!(
            store.add(NewTask::new("late")).await,
            Err(StoreError::ConnectionUnavailable)
        ));
        assert!(matches!(store.get("any").await, Err(StoreError::ConnectionUnavailable)));

        // Second close is a no-op
        store.close().unwrap();
    }

    #[tokio::test]
    async fn test_reopen_preserves_tasks() {
        let temp = TempDir::new().unwrap();

        let task = {
            let store = open(&temp);
            let task = store.add(NewTask::new("persisted")).await.unwrap();
            store.set_favorite(&task.id, true).await.unwrap();
            store.close().unwrap();
            task
        };

        let store = TaskStore::open(StoreConfig::new(temp.path()).compact_on_open(false)).unwrap();
        let fetched = store.get(&task.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "persisted");
        assert!(fetched.favorite);
    }

    #[tokio::test]
    async fn test_subscription_ends_when_store_dropped() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);

        let mut active = store.read_active();
        active.next().await;

        drop(store);
        assert_eq!(active.next().await, None);
    }

    #[tokio::test]
    async fn test_clones_share_connection() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        let other = store.clone();

        let task = other.add(NewTask::new("shared")).await.unwrap();
        assert!(store.get(&task.id).await.unwrap().is_some());

        other.close().unwrap();
        assert!(!store.is_open());
    }
}
