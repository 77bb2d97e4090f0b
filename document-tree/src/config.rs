//! Workspace configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use notes_directory_watcher::{DEFAULT_EXPECTATION_TTL, DirectoryConfig};

/// Ordering applied to files inside a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    /// Case-insensitive name, A to Z.
    #[default]
    NameUp,
    /// Case-insensitive name, Z to A.
    NameDown,
    /// Oldest modification first.
    TimeUp,
    /// Newest modification first.
    TimeDown,
}

/// Configuration for one open document workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Root directory and ignore rules.
    pub directory: DirectoryConfig,

    /// File ordering inside directories.
    pub sort: SortKey,

    /// How long an expected watcher echo stays registered.
    pub expectation_ttl_ms: u64,

    /// Where deleted entries go. Defaults to `.trash` under the root.
    pub trash_dir: Option<PathBuf>,
}

impl WorkspaceConfig {
    /// Create a config for the given root with default settings.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            directory: DirectoryConfig::new(root),
            sort: SortKey::default(),
            expectation_ttl_ms: DEFAULT_EXPECTATION_TTL.as_millis() as u64,
            trash_dir: None,
        }
    }

    /// Set the sort key.
    pub fn with_sort(mut self, sort: SortKey) -> Self {
        self.sort = sort;
        self
    }

    /// Replace the directory config, keeping its root.
    pub fn with_directory(mut self, directory: DirectoryConfig) -> Self {
        self.directory = directory;
        self
    }

    /// Set the trash directory.
    pub fn with_trash_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.trash_dir = Some(dir.into());
        self
    }

    /// Workspace root.
    pub fn root(&self) -> &std::path::Path {
        &self.directory.path
    }

    /// Expectation lifetime.
    pub fn expectation_ttl(&self) -> Duration {
        Duration::from_millis(self.expectation_ttl_ms)
    }

    /// Resolved trash directory.
    pub fn trash_dir(&self) -> PathBuf {
        self.trash_dir
            .clone()
            .unwrap_or_else(|| self.directory.path.join(".trash"))
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self::new(PathBuf::new())
    }
}
