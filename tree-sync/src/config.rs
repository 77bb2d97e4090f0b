//! Configuration for the sync service.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use notes_directory_watcher::DEFAULT_CHANNEL_CAPACITY;
use notes_document_tree::WorkspaceConfig;

use crate::error::{Result, SyncError};

/// Configuration for one synced workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// The mirrored directory.
    pub workspace: WorkspaceConfig,

    /// Whether to watch the directory in real time.
    pub realtime_watch: bool,

    /// Capacity of the event queue and of the change broadcast.
    pub channel_capacity: usize,
}

impl SyncConfig {
    /// Create a configuration for `root` with default values.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            workspace: WorkspaceConfig::new(root),
            realtime_watch: true,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Set the workspace configuration.
    pub fn with_workspace(mut self, workspace: WorkspaceConfig) -> Self {
        self.workspace = workspace;
        self
    }

    /// Only apply events that are injected by hand.
    pub fn without_watch(mut self) -> Self {
        self.realtime_watch = false;
        self
    }

    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| SyncError::Config(e.to_string()))?;
        if config.channel_capacity == 0 {
            return Err(SyncError::Config(
                "channel_capacity must be positive".to_string(),
            ));
        }
        Ok(config)
    }

    /// Load a TOML file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// Serialize to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| SyncError::Config(e.to_string()))
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(PathBuf::new())
    }
}
