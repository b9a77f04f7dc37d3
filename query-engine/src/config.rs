//! Settings for opening a database.

use std::path::PathBuf;
use std::time::Duration;

/// Rows shown by a console preview.
pub const DEFAULT_PREVIEW_ROWS: usize = 10;

/// Rows drawn by `sample` when the caller does not choose.
pub const DEFAULT_SAMPLE_ROWS: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Database file. `None` opens a private in-memory database.
    pub path: Option<PathBuf>,
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Duration,
    pub preview_rows: usize,
    pub sample_rows: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout: Duration::from_secs(5),
            preview_rows: DEFAULT_PREVIEW_ROWS,
            sample_rows: DEFAULT_SAMPLE_ROWS,
        }
    }
}

impl Config {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// The name the store reports for itself.
    pub fn store_name(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => ":memory:".to_string(),
        }
    }
}
