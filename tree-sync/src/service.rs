//! The sync service.

use std::sync::Arc;

use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use notes_directory_watcher::{DirectoryWatcher, FileEvent};
use notes_document_tree::{
    FileMatches, NodeId, SearchTerm, SortKey, Transfer, TreeChange, Workspace, parse_query,
};

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};

/// Keeps one workspace in sync with its directory.
///
/// Watcher events and user operations are applied one at a time through the
/// same lock, so a remote change can never interleave with a local save.
/// Every resulting [`TreeChange`] is broadcast to subscribers.
pub struct SyncService {
    /// Configuration.
    config: SyncConfig,

    /// The mirrored tree.
    workspace: Arc<Mutex<Workspace>>,

    /// Directory watcher feeding the event queue.
    watcher: Mutex<DirectoryWatcher>,

    /// Event queue consumed by the pump.
    events_tx: mpsc::Sender<FileEvent>,
    events_rx: Arc<Mutex<mpsc::Receiver<FileEvent>>>,

    /// Change broadcast.
    changes: broadcast::Sender<TreeChange>,

    /// Task applying queued events.
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl SyncService {
    /// Load the workspace and register its directory with a watcher.
    pub async fn open(config: SyncConfig) -> Result<Self> {
        info!("Opening sync service for {}", config.workspace.root().display());

        let workspace = Workspace::open(config.workspace.clone())?;

        let mut watcher = DirectoryWatcher::with_capacity(config.channel_capacity);
        watcher.add(config.workspace.directory.clone()).await?;
        let events_tx = watcher.sender();
        let events_rx = watcher.take_events()?;

        let (changes, _) = broadcast::channel(config.channel_capacity);

        Ok(Self {
            config,
            workspace: Arc::new(Mutex::new(workspace)),
            watcher: Mutex::new(watcher),
            events_tx,
            events_rx: Arc::new(Mutex::new(events_rx)),
            changes,
            pump: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Start applying queued events, and watching the directory when enabled.
    pub async fn start(&self) -> Result<()> {
        let mut pump = self.pump.lock().await;
        if pump.is_some() {
            return Ok(());
        }

        *pump = Some(tokio::spawn(Self::pump_loop(
            self.events_rx.clone(),
            self.workspace.clone(),
            self.changes.clone(),
        )));

        if self.config.realtime_watch {
            self.watcher.lock().await.start().await?;
            info!("Realtime watching started");
        }
        Ok(())
    }

    /// Stop watching and stop applying queued events.
    ///
    /// Events still queued stay queued until the next [`SyncService::start`].
    pub async fn stop(&self) {
        self.watcher.lock().await.stop().await;
        if let Some(handle) = self.pump.lock().await.take() {
            handle.abort();
            let _ = handle.await;
        }
        info!("Sync service stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.pump.lock().await.is_some()
    }

    /// Receive every change applied from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TreeChange> {
        self.changes.subscribe()
    }

    /// Queue an event behind those already delivered by the watcher.
    pub async fn enqueue(&self, event: FileEvent) -> Result<()> {
        self.events_tx
            .send(event)
            .await
            .map_err(|_| SyncError::QueueClosed)
    }

    /// Apply one event right away and broadcast the result.
    pub async fn handle_event(&self, event: &FileEvent) -> Result<Vec<TreeChange>> {
        let changes = self.workspace.lock().await.apply(event)?;
        publish(&self.changes, &changes);
        Ok(changes)
    }

    async fn pump_loop(
        events: Arc<Mutex<mpsc::Receiver<FileEvent>>>,
        workspace: Arc<Mutex<Workspace>>,
        changes: broadcast::Sender<TreeChange>,
    ) {
        let mut events = events.lock().await;
        while let Some(event) = events.recv().await {
            let result = workspace.lock().await.apply(&event);
            match result {
                Ok(applied) => publish(&changes, &applied),
                Err(e) if e.is_recoverable() => {
                    debug!("Skipped {} for {}: {e}", event.kind, event.path.display());
                }
                Err(e) => warn!(
                    "Failed to apply {} for {}: {e}",
                    event.kind,
                    event.path.display()
                ),
            }
        }
        debug!("Event queue closed");
    }

    /// Run a closure against the current tree state.
    pub async fn with_workspace<R>(&self, f: impl FnOnce(&Workspace) -> R) -> R {
        f(&*self.workspace.lock().await)
    }

    /// Parse and run a query.
    pub async fn search(&self, query: &str) -> Vec<FileMatches> {
        self.search_terms(&parse_query(query)).await
    }

    pub async fn search_terms(&self, terms: &[SearchTerm]) -> Vec<FileMatches> {
        self.workspace.lock().await.search(terms)
    }

    /// Look a node up by hash, disambiguating collisions with `path`.
    pub async fn find_by_hash(
        &self,
        hash: i32,
        path: Option<&std::path::Path>,
    ) -> Result<Option<NodeId>> {
        Ok(self.workspace.lock().await.tree().find_by_hash(hash, path)?)
    }

    /// Read a file for display.
    pub async fn read(&self, id: NodeId) -> Result<Transfer> {
        let mut workspace = self.workspace.lock().await;
        let result = workspace.read(id);
        publish(&self.changes, &workspace.take_pending());
        Ok(result?)
    }

    pub async fn save(&self, id: NodeId, content: &str) -> Result<()> {
        let changes = self.workspace.lock().await.save(id, content)?;
        publish(&self.changes, &changes);
        Ok(())
    }

    pub async fn create_file(&self, parent: NodeId, name: &str) -> Result<NodeId> {
        let (id, changes) = self.workspace.lock().await.create_file(parent, name)?;
        publish(&self.changes, &changes);
        Ok(id)
    }

    pub async fn create_directory(&self, parent: NodeId, name: &str) -> Result<NodeId> {
        let (id, changes) = self
            .workspace
            .lock()
            .await
            .create_directory(parent, name)?;
        publish(&self.changes, &changes);
        Ok(id)
    }

    pub async fn create_virtual_directory(
        &self,
        parent: NodeId,
        name: &str,
        tag_rule: Option<&str>,
    ) -> Result<NodeId> {
        let (id, changes) = self
            .workspace
            .lock()
            .await
            .create_virtual_directory(parent, name, tag_rule)?;
        publish(&self.changes, &changes);
        Ok(id)
    }

    pub async fn rename(&self, id: NodeId, new_name: &str) -> Result<()> {
        let changes = self.workspace.lock().await.rename(id, new_name)?;
        publish(&self.changes, &changes);
        Ok(())
    }

    pub async fn move_to(&self, id: NodeId, target: NodeId) -> Result<()> {
        let changes = self.workspace.lock().await.move_to(id, target)?;
        publish(&self.changes, &changes);
        Ok(())
    }

    pub async fn delete(&self, id: NodeId) -> Result<()> {
        let changes = self.workspace.lock().await.delete(id)?;
        publish(&self.changes, &changes);
        Ok(())
    }

    pub async fn link(&self, virtual_dir: NodeId, file: NodeId) -> Result<()> {
        let changes = self.workspace.lock().await.link(virtual_dir, file)?;
        publish(&self.changes, &changes);
        Ok(())
    }

    pub async fn unlink(&self, virtual_dir: NodeId, file: NodeId) -> Result<()> {
        let changes = self.workspace.lock().await.unlink(virtual_dir, file)?;
        publish(&self.changes, &changes);
        Ok(())
    }

    pub async fn set_sort(&self, sort: SortKey) {
        let changes = self.workspace.lock().await.set_sort(sort);
        publish(&self.changes, &changes);
    }
}

fn publish(sender: &broadcast::Sender<TreeChange>, changes: &[TreeChange]) {
    for change in changes {
        // No subscribers is not an error.
        let _ = sender.send(change.clone());
    }
}
