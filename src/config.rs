// Store configuration

use std::path::{Path, PathBuf};

/// Directory name used under the platform data dir
pub const APP_DIR: &str = "todostore";

pub const DB_FILE: &str = "todo.db";
pub const LOCK_FILE: &str = "todo.lock";

/// How to open a `TaskStore`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory holding the database and lock file
    pub path: PathBuf,
    /// Run VACUUM right after opening
    pub compact_on_open: bool,
}

impl StoreConfig {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            compact_on_open: true,
        }
    }

    pub fn compact_on_open(mut self, compact: bool) -> Self {
        self.compact_on_open = compact;
        self
    }

    pub fn db_path(&self) -> PathBuf {
        self.path.join(DB_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.path.join(LOCK_FILE)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(default_store_path())
    }
}

/// Platform data directory for the store, falling back to the working directory
pub fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".").join(format!(".{}", APP_DIR)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let config = StoreConfig::new("/tmp/tasks");
        assert_eq!(config.db_path(), PathBuf::from("/tmp/tasks/todo.db"));
        assert_eq!(config.lock_path(), PathBuf::from("/tmp/tasks/todo.lock"));
        assert!(config.compact_on_open);
    }

    #[test]
    fn test_builder() {
        let config = StoreConfig::new("/tmp/tasks").compact_on_open(false);
        assert!(!config.compact_on_open);
    }

    #[test]
    fn test_default_path_ends_with_app_dir() {
        let path = default_store_path();
        let name = path.file_name().and_then(|s| s.to_str()).unwrap();
        assert!(name.ends_with(APP_DIR));
    }
}
