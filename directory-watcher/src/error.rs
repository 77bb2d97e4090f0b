//! Error types for the directory watcher.

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, WatcherError>;

/// Errors that can occur in the directory watcher.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Directory not found.
    #[error("directory not found: {0}")]
    DirectoryNotFound(String),

    /// Watcher already running.
    #[error("watcher already running for: {0}")]
    AlreadyWatching(String),

    /// Invalid ignore pattern.
    #[error("invalid ignore pattern: {0}")]
    InvalidPattern(String),

    /// Notify error.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The event receiver was already handed out.
    #[error("event receiver already taken")]
    ReceiverTaken,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}
