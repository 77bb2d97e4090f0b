//! Error types for the document tree.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::messages::Message;
use crate::node::NodeId;

/// Result type alias for tree operations.
pub type Result<T> = std::result::Result<T, TreeError>;

/// Errors that can occur while mirroring, mutating or searching the tree.
#[derive(Error, Debug)]
pub enum TreeError {
    /// Path vanished between discovery and read.
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A rename or create target sanitizes to nothing.
    #[error("invalid name: {0:?}")]
    InvalidName(String),

    /// The operating system refused access.
    #[error("permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    /// File content is not valid UTF-8.
    #[error("invalid text encoding: {}", .0.display())]
    EncodingError(PathBuf),

    /// Two distinct paths share an identity hash.
    #[error("identity collision on {hash}: {} and {}", .existing.display(), .incoming.display())]
    IdentityCollision {
        hash: i32,
        existing: PathBuf,
        incoming: PathBuf,
    },

    /// Rename or create target is already taken.
    #[error("already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    /// No node with this id is in the tree.
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    /// Operation needs a file.
    #[error("not a file: {}", .0.display())]
    NotAFile(PathBuf),

    /// Operation needs a directory.
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// Move target is the node itself, one of its descendants, or the root.
    #[error("invalid move: {}", .0.display())]
    InvalidMove(PathBuf),

    /// Path is not under the workspace root.
    #[error("outside workspace: {}", .0.display())]
    OutsideWorkspace(PathBuf),

    /// The trash collaborator failed.
    #[error("failed to move to trash: {0}")]
    Trash(String),

    /// Watch configuration error.
    #[error("watch configuration: {0}")]
    Watcher(#[from] notes_directory_watcher::WatcherError),

    /// Any other IO error.
    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl TreeError {
    /// Convert an IO error for `path` into the tree taxonomy.
    pub fn from_io(err: io::Error, path: &Path) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            io::ErrorKind::InvalidData => Self::EncodingError(path.to_path_buf()),
            io::ErrorKind::AlreadyExists => Self::AlreadyExists(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    /// Whether reconciliation and search should degrade instead of failing.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::EncodingError(_) | Self::IdentityCollision { .. }
        )
    }

    /// Localizable description of this error.
    pub fn message(&self) -> Message {
        match self {
            Self::NotFound(path) => Message::new("error.not_found").with("path", path.display()),
            Self::InvalidName(name) => Message::new("error.invalid_name").with("name", name),
            Self::PermissionDenied(path) => {
                Message::new("error.permission_denied").with("path", path.display())
            }
            Self::EncodingError(path) => {
                Message::new("error.encoding").with("path", path.display())
            }
            Self::IdentityCollision {
                existing, incoming, ..
            } => Message::new("error.identity_collision")
                .with("existing", existing.display())
                .with("incoming", incoming.display()),
            Self::AlreadyExists(path) => {
                Message::new("error.already_exists").with("path", path.display())
            }
            Self::UnknownNode(id) => Message::new("error.unknown_node").with("id", id),
            Self::NotAFile(path) => Message::new("error.not_a_file").with("path", path.display()),
            Self::NotADirectory(path) => {
                Message::new("error.not_a_directory").with("path", path.display())
            }
            Self::InvalidMove(path) => {
                Message::new("error.invalid_move").with("path", path.display())
            }
            Self::OutsideWorkspace(path) => {
                Message::new("error.outside_workspace").with("path", path.display())
            }
            Self::Trash(reason) => Message::new("error.trash").with("reason", reason),
            Self::Watcher(e) => Message::new("error.config").with("reason", e),
            Self::Io { path, source } => Message::new("error.io")
                .with("path", path.display())
                .with("reason", source),
        }
    }
}
