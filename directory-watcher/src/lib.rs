//! # Directory Watcher
//!
//! File system monitoring for the notes document tree. It watches a document
//! directory, normalizes platform events and filters ignored paths before they
//! reach the tree.
//!
//! ## Features
//!
//! - **Real-time Watching**: Monitor directories for file changes
//! - **Ignore Rules**: Basename patterns for directories, extension allow-list for files
//! - **Event Normalization**: `change`, `unlink`, `add`, `add-dir`, `unlink-dir` and rename pairs
//! - **Echo Suppression**: Expected events registered ahead of our own writes
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Directory Watcher                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  DirectoryConfig ──► Watcher ──► FileEvent                     │
//! │       │                │              │                         │
//! │       ▼                ▼              ▼                         │
//! │  IgnoreRules      notify backend  ExpectationTable             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod expectation;
pub mod watcher;

pub use config::{DirectoryConfig, IgnoreRules};
pub use error::{Result, WatcherError};
pub use event::{FileEvent, FileEventKind};
pub use expectation::{DEFAULT_EXPECTATION_TTL, ExpectationTable};
pub use watcher::{DEFAULT_CHANNEL_CAPACITY, DirectoryWatcher};
