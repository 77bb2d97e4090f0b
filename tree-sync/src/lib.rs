//! # Tree Sync
//!
//! Keeps a [`notes_document_tree::Workspace`] in sync with its directory.
//! Watcher events and user operations go through one lock, and every change
//! they produce is broadcast to subscribers.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         SyncService                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  DirectoryWatcher ──► event queue ──► pump ──► Workspace        │
//! │                                                   │             │
//! │  save / rename / move / delete ───────────────────┤             │
//! │                                                   ▼             │
//! │                                   broadcast ◄── TreeChange      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod service;

pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use service::SyncService;
