//! Error types for the sync service.

use thiserror::Error;

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur in the sync service.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Document tree error.
    #[error("tree error: {0}")]
    Tree(#[from] notes_document_tree::TreeError),

    /// Directory watcher error.
    #[error("watcher error: {0}")]
    Watcher(#[from] notes_directory_watcher::WatcherError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The event queue is no longer consumed.
    #[error("event queue closed")]
    QueueClosed,
}

impl SyncError {
    /// Whether the underlying tree error degrades instead of failing.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Tree(e) => e.is_recoverable(),
            _ => false,
        }
    }
}
