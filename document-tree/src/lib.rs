//! # Document Tree
//!
//! In-memory mirror of a directory of text documents. The tree is loaded from
//! disk once, then kept in sync by applying watcher events, and answers
//! weighted searches over file names and content.
//!
//! ## Features
//!
//! - **Identity**: 32-bit path hashes as light lookup keys
//! - **Scanning**: snippet, `#tags` and `@ID:` document identifiers
//! - **Virtual Directories**: tag-driven or hand-picked groupings of files
//! - **Reconciliation**: watcher events re-derived from disk state
//! - **Search**: AND/OR terms over names and lines with weighted matches
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Workspace                                │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  FileEvent ──► reconcile ──► DocumentTree ──► TreeChange        │
//! │                    │              │                             │
//! │                    ▼              ▼                             │
//! │  FileSystem ──► scanner      search ──► FileMatches             │
//! │  Trash ◄── ops                                                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod change;
pub mod config;
pub mod error;
pub mod fs;
pub mod hash;
pub mod messages;
pub mod node;
pub mod ops;
mod reconcile;
pub mod scanner;
pub mod search;
pub mod transfer;
pub mod trash;
pub mod tree;
pub mod utils;
pub mod workspace;

pub use change::TreeChange;
pub use config::{SortKey, WorkspaceConfig};
pub use error::{Result, TreeError};
pub use fs::{DirEntry, EntryKind, FileSystem, Stat, StdFileSystem};
pub use hash::{hash_path, hash_str};
pub use messages::{KeyLocalizer, Localizer, Message};
pub use node::{DirectoryNode, FileNode, Node, NodeHeader, NodeId, NodeType, VirtualDirectory};
pub use ops::sanitize_name;
pub use scanner::{ScanResult, scan};
pub use search::{FileMatches, Match, Position, SearchTerm, parse_query, search};
pub use transfer::Transfer;
pub use trash::{Trash, TrashDir};
pub use tree::{DocumentTree, Scope};
pub use utils::{IgnoreRules, sort_children};
pub use workspace::Workspace;
