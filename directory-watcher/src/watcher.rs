//! Directory watcher implementation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, error, info, warn};

use crate::config::{DirectoryConfig, IgnoreRules};
use crate::error::{Result, WatcherError};
use crate::event::{FileEvent, FileEventKind};

/// Default capacity of the event channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// A watched root together with its compiled ignore rules.
#[derive(Debug, Clone)]
struct WatchedDirectory {
    config: DirectoryConfig,
    rules: IgnoreRules,
}

impl WatchedDirectory {
    /// Whether an event under this root should reach consumers.
    fn accepts(&self, event: &FileEvent) -> bool {
        let root = &self.config.path;
        let path = &event.path;

        if self.rules.has_ignored_ancestor(root, path) {
            return false;
        }

        match event.kind {
            FileEventKind::AddDir | FileEventKind::UnlinkDir => {
                !self.rules.should_ignore_directory(path)
            }
            FileEventKind::Add | FileEventKind::Change if path.is_file() => {
                !self.rules.should_ignore_file(path)
            }
            _ => true,
        }
    }
}

/// Directory watcher that monitors file system changes.
pub struct DirectoryWatcher {
    /// Watched directories.
    directories: Arc<RwLock<HashMap<PathBuf, WatchedDirectory>>>,

    /// Internal notify watcher.
    watcher: Option<RecommendedWatcher>,

    /// Event sender.
    event_tx: mpsc::Sender<FileEvent>,

    /// Event receiver, until a consumer takes it.
    event_rx: Option<mpsc::Receiver<FileEvent>>,

    /// Whether the watcher is running.
    running: Arc<RwLock<bool>>,
}

impl DirectoryWatcher {
    /// Create a new directory watcher.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a watcher whose event channel holds `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        let (event_tx, event_rx) = mpsc::channel(capacity);

        Self {
            directories: Arc::new(RwLock::new(HashMap::new())),
            watcher: None,
            event_tx,
            event_rx: Some(event_rx),
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Add a directory to watch.
    pub async fn add(&mut self, config: DirectoryConfig) -> Result<()> {
        let path = config.path.clone();

        if !path.exists() {
            return Err(WatcherError::DirectoryNotFound(path.display().to_string()));
        }

        if !path.is_dir() {
            return Err(WatcherError::Config(format!(
                "Path is not a directory: {}",
                path.display()
            )));
        }

        {
            let directories = self.directories.read().await;
            if directories.contains_key(&path) {
                return Err(WatcherError::AlreadyWatching(path.display().to_string()));
            }
        }

        let rules = config.rules()?;
        info!("Adding directory to watch: {}", path.display());

        if *self.running.read().await {
            if let Some(ref mut w) = self.watcher {
                w.watch(&path, recursive_mode(&config))?;
            }
        }

        self.directories
            .write()
            .await
            .insert(path, WatchedDirectory { config, rules });

        Ok(())
    }

    /// Remove a directory from watching.
    pub async fn remove(&mut self, path: &Path) -> Result<()> {
        let mut directories = self.directories.write().await;

        if directories.remove(path).is_none() {
            return Err(WatcherError::DirectoryNotFound(path.display().to_string()));
        }

        if let Some(ref mut w) = self.watcher {
            if let Err(e) = w.unwatch(path) {
                warn!("Failed to unwatch {}: {e}", path.display());
            }
        }

        info!("Removed directory from watch: {}", path.display());
        Ok(())
    }

    /// Start watching all configured directories.
    pub async fn start(&mut self) -> Result<()> {
        if *self.running.read().await {
            return Ok(());
        }

        let event_tx = self.event_tx.clone();
        let directories = self.directories.clone();

        let watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    for file_event in FileEvent::from_notify(event) {
                        let accepted = {
                            let guard = directories.blocking_read();
                            guard
                                .values()
                                .filter(|d| file_event.path.starts_with(&d.config.path))
                                .any(|d| d.accepts(&file_event))
                        };

                        if !accepted {
                            debug!(
                                "Dropping {} for ignored path {}",
                                file_event.kind,
                                file_event.path.display()
                            );
                            continue;
                        }

                        if let Err(e) = event_tx.blocking_send(file_event) {
                            error!("Failed to send file event: {e}");
                        }
                    }
                }
                Err(e) => {
                    error!("Watch error: {e}");
                }
            },
        )?;

        self.watcher = Some(watcher);

        let directories = self.directories.read().await;
        for (path, directory) in directories.iter() {
            if let Some(ref mut w) = self.watcher {
                match w.watch(path, recursive_mode(&directory.config)) {
                    Ok(()) => debug!("Started watching: {}", path.display()),
                    Err(e) => warn!("Failed to watch {}: {e}", path.display()),
                }
            }
        }

        *self.running.write().await = true;
        info!("Directory watcher started");

        Ok(())
    }

    /// Stop watching all directories.
    pub async fn stop(&mut self) {
        if let Some(ref mut watcher) = self.watcher {
            let directories = self.directories.read().await;
            for path in directories.keys() {
                let _ = watcher.unwatch(path);
            }
        }

        self.watcher = None;
        *self.running.write().await = false;
        info!("Directory watcher stopped");
    }

    /// Check if the watcher is running.
    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Take the event receiver. Events are delivered in arrival order.
    pub fn take_events(&mut self) -> Result<mpsc::Receiver<FileEvent>> {
        self.event_rx.take().ok_or(WatcherError::ReceiverTaken)
    }

    /// A sender that injects events into the same queue as the watcher.
    pub fn sender(&self) -> mpsc::Sender<FileEvent> {
        self.event_tx.clone()
    }

    /// Get configured directories.
    pub async fn directories(&self) -> Vec<DirectoryConfig> {
        self.directories
            .read()
            .await
            .values()
            .map(|d| d.config.clone())
            .collect()
    }
}

impl Default for DirectoryWatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn recursive_mode(config: &DirectoryConfig) -> RecursiveMode {
    if config.recursive {
        RecursiveMode::Recursive
    } else {
        RecursiveMode::NonRecursive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn watched(root: &Path) -> WatchedDirectory {
        let config = DirectoryConfig::new(root);
        let rules = config.rules().unwrap();
        WatchedDirectory { config, rules }
    }

    #[tokio::test]
    async fn test_watcher_creation() {
        let watcher = DirectoryWatcher::new();
        assert!(!watcher.is_running().await);
    }

    #[tokio::test]
    async fn test_add_directory() {
        let temp_dir = TempDir::new().unwrap();
        let mut watcher = DirectoryWatcher::new();

        watcher
            .add(DirectoryConfig::new(temp_dir.path()))
            .await
            .unwrap();

        let dirs = watcher.directories().await;
        assert_eq!(dirs.len(), 1);

        let again = watcher.add(DirectoryConfig::new(temp_dir.path())).await;
        assert!(matches!(again, Err(WatcherError::AlreadyWatching(_))));
    }

    #[tokio::test]
    async fn test_add_nonexistent_directory() {
        let mut watcher = DirectoryWatcher::new();
        let config = DirectoryConfig::new("/nonexistent/path/12345");

        let result = watcher.add(config).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_receiver_taken_once() {
        let mut watcher = DirectoryWatcher::new();
        assert!(watcher.take_events().is_ok());
        assert!(matches!(
            watcher.take_events(),
            Err(WatcherError::ReceiverTaken)
        ));
    }

    #[tokio::test]
    async fn test_injected_events_share_the_queue() {
        let mut watcher = DirectoryWatcher::new();
        let mut rx = watcher.take_events().unwrap();

        let tx = watcher.sender();
        tx.send(FileEvent::new(FileEventKind::Unlink, "/notes/a.md"))
            .await
            .unwrap();
        tx.send(FileEvent::new(FileEventKind::Add, "/notes/a.md"))
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().kind, FileEventKind::Unlink);
        assert_eq!(rx.recv().await.unwrap().kind, FileEventKind::Add);
    }

    #[test]
    fn test_event_filtering() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::write(root.join("note.md"), "x").unwrap();
        std::fs::write(root.join("image.png"), "x").unwrap();
        let directory = watched(root);

        assert!(directory.accepts(&FileEvent::new(FileEventKind::Add, root.join("note.md"))));
        assert!(!directory.accepts(&FileEvent::new(FileEventKind::Add, root.join("image.png"))));
        assert!(!directory.accepts(&FileEvent::new(
            FileEventKind::Change,
            root.join(".git/index.md")
        )));
        assert!(!directory.accepts(&FileEvent::new(FileEventKind::AddDir, root.join(".trash"))));
        // Removals cannot be checked against disk; the tree decides.
        assert!(directory.accepts(&FileEvent::new(FileEventKind::Unlink, root.join("gone.png"))));
    }
}
