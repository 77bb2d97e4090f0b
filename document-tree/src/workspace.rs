//! An open document workspace: the tree plus the collaborators it talks to.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use notes_directory_watcher::{ExpectationTable, FileEventKind, IgnoreRules};

use crate::change::{TreeChange, push_unique};
use crate::config::{SortKey, WorkspaceConfig};
use crate::error::{Result, TreeError};
use crate::fs::{EntryKind, FileSystem, StdFileSystem};
use crate::node::{Node, NodeId};
use crate::scanner::{ScanResult, scan};
use crate::search::{FileMatches, SearchTerm, search};
use crate::transfer::Transfer;
use crate::trash::{Trash, TrashDir};
use crate::tree::DocumentTree;

/// A mirrored directory and everything needed to keep it in sync.
///
/// All mutation goes through `&mut self`, so callers that share a workspace
/// serialize watcher events and user operations through one lock.
pub struct Workspace {
    pub(crate) config: WorkspaceConfig,
    pub(crate) tree: DocumentTree,
    pub(crate) rules: IgnoreRules,
    pub(crate) expectations: ExpectationTable,
    pub(crate) fs: Arc<dyn FileSystem>,
    pub(crate) trash: Arc<dyn Trash>,
    /// Changes produced as a side effect of reads.
    pending: Vec<TreeChange>,
}

impl Workspace {
    /// Open a workspace on disk and load its tree.
    pub fn open(config: WorkspaceConfig) -> Result<Self> {
        let fs = Arc::new(StdFileSystem::new(config.directory.follow_symlinks));
        let trash = Arc::new(TrashDir::new(config.trash_dir()));
        Self::with_collaborators(config, fs, trash)
    }

    /// Open a workspace with explicit filesystem and trash collaborators.
    pub fn with_collaborators(
        config: WorkspaceConfig,
        fs: Arc<dyn FileSystem>,
        trash: Arc<dyn Trash>,
    ) -> Result<Self> {
        let root = config.root().to_path_buf();
        match fs.stat(&root).map_err(|e| TreeError::from_io(e, &root))? {
            Some(stat) if stat.kind == EntryKind::Directory => {}
            Some(_) => return Err(TreeError::NotADirectory(root)),
            None => return Err(TreeError::NotFound(root)),
        }

        let rules = config.directory.rules()?;
        let mut workspace = Self {
            tree: DocumentTree::new(&root, config.sort),
            expectations: ExpectationTable::new(config.expectation_ttl()),
            rules,
            config,
            fs,
            trash,
            pending: Vec::new(),
        };

        let root_id = workspace.tree.root_id();
        workspace.load_directory(root_id)?;

        info!(
            "Loaded workspace {} ({} nodes)",
            root.display(),
            workspace.tree.len()
        );
        Ok(workspace)
    }

    pub fn tree(&self) -> &DocumentTree {
        &self.tree
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn rules(&self) -> &IgnoreRules {
        &self.rules
    }

    /// Register an event our own disk access is about to cause.
    pub fn expect(&mut self, kind: FileEventKind, path: &Path) {
        self.expectations.expect(kind, path);
    }

    /// Number of live expectations.
    pub fn pending_expectations(&self) -> usize {
        self.expectations.len()
    }

    /// Changes queued by reads since the last call.
    pub fn take_pending(&mut self) -> Vec<TreeChange> {
        std::mem::take(&mut self.pending)
    }

    /// Load the entries of a directory from disk, descending when recursive.
    ///
    /// Returns the virtual directories whose membership changed.
    pub(crate) fn load_directory(&mut self, dir: NodeId) -> Result<Vec<NodeId>> {
        let dir_path = self.tree.directory(dir)?.header.path.clone();
        let entries = self
            .fs
            .read_dir(&dir_path)
            .map_err(|e| TreeError::from_io(e, &dir_path))?;

        let mut touched = Vec::new();
        for entry in entries {
            if self.tree.find_by_path(&entry.path).is_some() {
                continue;
            }
            match entry.kind {
                EntryKind::Directory => {
                    if self.rules.should_ignore_directory(&entry.path) {
                        debug!("Skipping ignored directory {}", entry.path.display());
                        continue;
                    }
                    let id = self.tree.insert_directory(dir, entry.path.clone())?;
                    if !self.config.directory.recursive {
                        continue;
                    }
                    match self.load_directory(id) {
                        Ok(ids) => extend_unique(&mut touched, ids),
                        Err(e) if e.is_recoverable() => {
                            warn!("Skipping {}: {e}", entry.path.display());
                            self.tree.remove(id)?;
                        }
                        Err(e) => warn!("Could not list {}: {e}", entry.path.display()),
                    }
                }
                EntryKind::File => {
                    if self.rules.should_ignore_file(&entry.path) {
                        continue;
                    }
                    let id = self.tree.insert_file(dir, entry.path.clone())?;
                    match self.rescan(id) {
                        Ok(ids) => extend_unique(&mut touched, ids),
                        Err(TreeError::NotFound(_)) => {
                            debug!("{} vanished while loading", entry.path.display());
                            self.tree.remove(id)?;
                        }
                        Err(e) => warn!("Could not scan {}: {e}", entry.path.display()),
                    }
                }
            }
        }
        Ok(touched)
    }

    /// Re-read a file from disk and store a fresh scan.
    fn rescan(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        let (text, modified) = self.read_text(id)?;
        self.tree.update_scan(id, text.scan(), modified)
    }

    /// Content and mtime of a file.
    fn read_text(&self, id: NodeId) -> Result<(Decoded, DateTime<Utc>)> {
        let path = self.tree.file(id)?.header.path.clone();
        let stat = self
            .fs
            .stat(&path)
            .map_err(|e| TreeError::from_io(e, &path))?
            .ok_or_else(|| TreeError::NotFound(path.clone()))?;
        if stat.kind != EntryKind::File {
            return Err(TreeError::NotFound(path));
        }

        let bytes = self
            .fs
            .read(&path)
            .map_err(|e| TreeError::from_io(e, &path))?;
        let text = match String::from_utf8(bytes) {
            Ok(text) => Decoded::Text(text),
            Err(e) => {
                warn!("Invalid UTF-8 in {}, scanning without tags", path.display());
                Decoded::Lossy(String::from_utf8_lossy(e.as_bytes()).into_owned())
            }
        };
        Ok((text, stat.modified))
    }

    /// Rescan a file and describe what changed. A vanished file is removed.
    pub(crate) fn refresh(&mut self, id: NodeId) -> Result<Vec<TreeChange>> {
        match self.rescan(id) {
            Ok(touched) => Ok(self.updated_changes(id, &touched)),
            Err(TreeError::NotFound(path)) => {
                debug!("{} vanished, removing", path.display());
                self.tree.remove(id)
            }
            Err(e) => Err(e),
        }
    }

    fn updated_changes(&self, id: NodeId, touched: &[NodeId]) -> Vec<TreeChange> {
        let mut changes = Vec::new();
        let Some(node) = self.tree.get(id) else {
            return changes;
        };
        changes.push(TreeChange::updated(node));
        if let Some(parent) = node.parent().and_then(|p| self.tree.get(p)) {
            push_unique(&mut changes, TreeChange::container(parent));
        }
        self.virtual_changes(touched, &mut changes);
        changes
    }

    pub(crate) fn virtual_changes(&self, ids: &[NodeId], changes: &mut Vec<TreeChange>) {
        for id in ids {
            if let Some(node) = self.tree.get(*id) {
                push_unique(changes, TreeChange::container(node));
            }
        }
    }

    /// Read a file for display. The scan is refreshed from the same content.
    pub fn read(&mut self, id: NodeId) -> Result<Transfer> {
        let (text, modified) = match self.read_text(id) {
            Ok(read) => read,
            Err(TreeError::NotFound(path)) => {
                let removed = self.tree.remove(id)?;
                self.pending.extend(removed);
                return Err(TreeError::NotFound(path));
            }
            Err(e) => return Err(e),
        };

        let touched = self.tree.update_scan(id, text.scan(), modified)?;
        let changes = self.updated_changes(id, &touched);
        self.pending.extend(changes);

        Ok(Transfer::from_file(self.tree.file(id)?).with_content(text.into_string()))
    }

    /// Flat record for any node, without content.
    pub fn describe(&self, id: NodeId) -> Result<Transfer> {
        self.tree.node(id).map(Transfer::from_node)
    }

    /// Switch the sort key and re-sort every directory.
    pub fn set_sort(&mut self, sort: SortKey) -> Vec<TreeChange> {
        if self.tree.sort() == sort {
            return Vec::new();
        }
        self.config.sort = sort;
        self.tree.set_sort(sort);

        let mut changes = Vec::new();
        let mut stack = vec![self.tree.root_id()];
        while let Some(id) = stack.pop() {
            let Some(node) = self.tree.get(id) else {
                continue;
            };
            if let Node::Directory(dir) = node {
                changes.push(TreeChange::container(node));
                stack.extend(dir.children.iter().copied());
            }
        }
        changes
    }

    /// Search every file in the tree.
    pub fn search(&self, terms: &[SearchTerm]) -> Vec<FileMatches> {
        search(&self.tree, self.fs.as_ref(), terms)
    }
}

/// File content as read from disk.
enum Decoded {
    Text(String),
    /// Invalid UTF-8, replaced lossily.
    Lossy(String),
}

impl Decoded {
    fn scan(&self) -> ScanResult {
        match self {
            Decoded::Text(text) => scan(text),
            Decoded::Lossy(text) => ScanResult::fallback(text),
        }
    }

    fn into_string(self) -> String {
        match self {
            Decoded::Text(text) | Decoded::Lossy(text) => text,
        }
    }
}

fn extend_unique(into: &mut Vec<NodeId>, ids: Vec<NodeId>) {
    for id in ids {
        if !into.contains(&id) {
            into.push(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notes_directory_watcher::DirectoryConfig;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, Workspace) {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("sub")).unwrap();
        std::fs::create_dir_all(root.join(".hidden")).unwrap();
        std::fs::create_dir_all(root.join("node_modules")).unwrap();
        std::fs::write(root.join("a.md"), "# Title\n#alpha").unwrap();
        std::fs::write(root.join("image.png"), [0u8, 1, 2]).unwrap();
        std::fs::write(root.join("sub/b.txt"), "@ID:b-1").unwrap();
        std::fs::write(root.join(".hidden/c.md"), "hidden").unwrap();

        let workspace = Workspace::open(WorkspaceConfig::new(root)).unwrap();
        (temp_dir, workspace)
    }

    #[test]
    fn test_open_loads_allowed_entries() {
        let (temp_dir, workspace) = fixture();
        let root = temp_dir.path();
        let tree = workspace.tree();

        let names: Vec<&str> = tree
            .children(tree.root_id())
            .iter()
            .map(|c| tree.node(*c).unwrap().name())
            .collect();
        assert_eq!(names, vec!["a.md", "sub"]);

        let a = tree.find_by_path(&root.join("a.md")).unwrap();
        let a = tree.file(a).unwrap();
        assert_eq!(a.snippet, "# Title\n#alpha");
        assert!(a.tags.contains("alpha"));

        let b = tree.find_by_path(&root.join("sub/b.txt")).unwrap();
        assert_eq!(tree.file(b).unwrap().document_id.as_deref(), Some("b-1"));
    }

    #[test]
    fn test_open_non_recursive() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("sub")).unwrap();
        std::fs::write(root.join("sub/b.md"), "x").unwrap();

        let config = WorkspaceConfig::new(root)
            .with_directory(DirectoryConfig::new(root).non_recursive());
        let workspace = Workspace::open(config).unwrap();

        let sub = workspace.tree().find_by_path(&root.join("sub")).unwrap();
        assert!(workspace.tree().children(sub).is_empty());
    }

    #[test]
    fn test_open_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let result = Workspace::open(WorkspaceConfig::new(temp_dir.path().join("nope")));
        assert!(matches!(result, Err(TreeError::NotFound(_))));
    }

    #[test]
    fn test_read_returns_content_and_refreshes() {
        let (temp_dir, mut workspace) = fixture();
        let path = temp_dir.path().join("a.md");
        let id = workspace.tree().find_by_path(&path).unwrap();

        std::fs::write(&path, "#beta changed").unwrap();
        let transfer = workspace.read(id).unwrap();

        assert_eq!(transfer.content.as_deref(), Some("#beta changed"));
        assert_eq!(transfer.snippet, "#beta changed");
        assert!(workspace.tree().file(id).unwrap().tags.contains("beta"));
        assert!(!workspace.take_pending().is_empty());
    }

    #[test]
    fn test_read_vanished_file_removes_it() {
        let (temp_dir, mut workspace) = fixture();
        let path = temp_dir.path().join("a.md");
        let id = workspace.tree().find_by_path(&path).unwrap();

        std::fs::remove_file(&path).unwrap();
        assert!(matches!(workspace.read(id), Err(TreeError::NotFound(_))));
        assert!(workspace.tree().get(id).is_none());
        assert!(
            workspace
                .take_pending()
                .iter()
                .any(|c| matches!(c, TreeChange::Removed { .. }))
        );
    }

    #[test]
    fn test_invalid_utf8_falls_back() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::write(root.join("bad.md"), [b'#', b't', 0xff, 0xfe]).unwrap();

        let workspace = Workspace::open(WorkspaceConfig::new(root)).unwrap();
        let id = workspace.tree().find_by_path(&root.join("bad.md")).unwrap();
        let file = workspace.tree().file(id).unwrap();
        assert!(file.tags.is_empty());
        assert_eq!(file.document_id, None);
        assert!(file.snippet.starts_with("#t"));
    }

    #[test]
    fn test_set_sort_reorders() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::write(root.join("a.md"), "").unwrap();
        std::fs::write(root.join("b.md"), "").unwrap();

        let mut workspace = Workspace::open(WorkspaceConfig::new(root)).unwrap();
        let changes = workspace.set_sort(SortKey::NameDown);
        assert_eq!(changes.len(), 1);

        let tree = workspace.tree();
        let names: Vec<&str> = tree
            .children(tree.root_id())
            .iter()
            .map(|c| tree.node(*c).unwrap().name())
            .collect();
        assert_eq!(names, vec!["b.md", "a.md"]);
        assert!(workspace.set_sort(SortKey::NameDown).is_empty());
    }
}
