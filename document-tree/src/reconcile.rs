//! Applying watcher events to the tree.
//!
//! The event kind only decides whether an expectation is consumed. What
//! happens to the tree is derived from the node in scope and what is on disk
//! right now, so events that arrive out of order still converge.

use std::path::{Path, PathBuf};

use tracing::debug;

use notes_directory_watcher::FileEvent;

use crate::change::{TreeChange, push_unique};
use crate::error::{Result, TreeError};
use crate::fs::EntryKind;
use crate::node::NodeId;
use crate::tree::Scope;
use crate::workspace::Workspace;

impl Workspace {
    /// Reconcile the tree with one watcher event.
    pub fn apply(&mut self, event: &FileEvent) -> Result<Vec<TreeChange>> {
        if self.expectations.consume(event) {
            debug!("Ignoring expected {} for {}", event.kind, event.path.display());
            return Ok(Vec::new());
        }

        let path = event.path.as_path();
        if self
            .rules
            .has_ignored_ancestor(self.tree.root_path(), path)
        {
            debug!("Ignoring {} under an ignored directory", path.display());
            return Ok(Vec::new());
        }

        let Some(scope) = self.tree.scope_of(path) else {
            debug!("No node in scope for {}", path.display());
            return Ok(Vec::new());
        };

        let on_disk = self
            .fs
            .stat(path)
            .map_err(|e| TreeError::from_io(e, path))?
            .map(|stat| stat.kind);
        debug!("Applying {} to {} ({on_disk:?})", event.kind, path.display());

        match scope {
            Scope::File(id) => match on_disk {
                Some(EntryKind::File) => self.refresh(id),
                None => self.tree.remove(id),
                Some(EntryKind::Directory) => {
                    let mut changes = self.tree.remove(id)?;
                    changes.extend(self.adopt(path, EntryKind::Directory)?);
                    Ok(changes)
                }
            },
            Scope::Directory(id) if self.tree.get(id).is_some_and(|n| n.path() == path) => {
                match on_disk {
                    Some(EntryKind::Directory) => Ok(Vec::new()),
                    None if id == self.tree.root_id() => {
                        debug!("Workspace root {} is gone", path.display());
                        Ok(Vec::new())
                    }
                    None => self.tree.remove(id),
                    Some(EntryKind::File) => {
                        let mut changes = self.tree.remove(id)?;
                        changes.extend(self.adopt(path, EntryKind::File)?);
                        Ok(changes)
                    }
                }
            }
            Scope::Directory(_) => match on_disk {
                Some(kind) => self.adopt(path, kind),
                None => Ok(Vec::new()),
            },
        }
    }

    /// Bring a path that exists on disk but not in the tree into the tree.
    ///
    /// When intermediate directories are missing too, the topmost one is
    /// loaded as a whole subtree.
    fn adopt(&mut self, path: &Path, kind: EntryKind) -> Result<Vec<TreeChange>> {
        let Some(Scope::Directory(anchor)) = self.tree.scope_of(path) else {
            return Ok(Vec::new());
        };
        if !self.config.directory.recursive && anchor != self.tree.root_id() {
            return Ok(Vec::new());
        }

        let anchor_path = self.tree.node(anchor)?.path().to_path_buf();
        let Some(top) = path
            .strip_prefix(&anchor_path)
            .ok()
            .and_then(|relative| relative.components().next())
            .map(|first| anchor_path.join(first))
        else {
            return Ok(Vec::new());
        };

        if top == path {
            return self.adopt_entry(anchor, path.to_path_buf(), kind);
        }
        match self
            .fs
            .stat(&top)
            .map_err(|e| TreeError::from_io(e, &top))?
        {
            Some(stat) if stat.kind == EntryKind::Directory => {
                self.adopt_entry(anchor, top, EntryKind::Directory)
            }
            _ => Ok(Vec::new()),
        }
    }

    fn adopt_entry(
        &mut self,
        parent: NodeId,
        path: PathBuf,
        kind: EntryKind,
    ) -> Result<Vec<TreeChange>> {
        let (id, touched) = match kind {
            EntryKind::Directory => {
                if self.rules.should_ignore_directory(&path) {
                    debug!("Not adopting ignored directory {}", path.display());
                    return Ok(Vec::new());
                }
                let id = self.tree.insert_directory(parent, path)?;
                let touched = if self.config.directory.recursive {
                    self.load_directory(id)?
                } else {
                    Vec::new()
                };
                (id, touched)
            }
            EntryKind::File => {
                if self.rules.should_ignore_file(&path) {
                    debug!("Not adopting {}: extension not allowed", path.display());
                    return Ok(Vec::new());
                }
                let id = self.tree.insert_file(parent, path)?;
                match self.refresh(id) {
                    Ok(_) if self.tree.get(id).is_none() => return Ok(Vec::new()),
                    Ok(changes) => {
                        let touched = changes
                            .iter()
                            .filter(|c| matches!(c, TreeChange::VirtualDirectoryChanged { .. }))
                            .map(TreeChange::id)
                            .collect();
                        (id, touched)
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        let mut changes = Vec::new();
        if let Some(node) = self.tree.get(id) {
            debug!("Adopted {}", node.path().display());
            changes.push(TreeChange::added(node));
        }
        if let Some(node) = self.tree.get(parent) {
            push_unique(&mut changes, TreeChange::container(node));
        }
        self.virtual_changes(&touched, &mut changes);
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkspaceConfig;
    use crate::node::NodeType;
    use notes_directory_watcher::FileEventKind;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn open(root: &Path) -> Workspace {
        Workspace::open(WorkspaceConfig::new(root)).unwrap()
    }

    #[test]
    fn test_change_rescans_file() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let path = root.join("a.md");
        std::fs::write(&path, "#old").unwrap();
        let mut workspace = open(root);
        let id = workspace.tree().find_by_path(&path).unwrap();

        std::fs::write(&path, "#new @ID:x1").unwrap();
        let changes = workspace
            .apply(&FileEvent::new(FileEventKind::Change, &path))
            .unwrap();

        let file = workspace.tree().file(id).unwrap();
        assert!(file.tags.contains("new"));
        assert!(!file.tags.contains("old"));
        assert_eq!(file.document_id.as_deref(), Some("x1"));
        assert!(matches!(changes[0], TreeChange::Updated { .. }));
        assert!(
            changes
                .iter()
                .any(|c| matches!(c, TreeChange::DirectoryChanged { .. }))
        );
    }

    #[test]
    fn test_add_inserts_in_sorted_position() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::write(root.join("a.md"), "").unwrap();
        std::fs::write(root.join("c.md"), "").unwrap();
        let mut workspace = open(root);

        std::fs::write(root.join("b.md"), "hello").unwrap();
        let changes = workspace
            .apply(&FileEvent::new(FileEventKind::Add, root.join("b.md")))
            .unwrap();
        assert!(matches!(
            changes[0],
            TreeChange::Added {
                node_type: NodeType::File,
                ..
            }
        ));

        let tree = workspace.tree();
        let names: Vec<&str> = tree
            .children(tree.root_id())
            .iter()
            .map(|c| tree.node(*c).unwrap().name())
            .collect();
        assert_eq!(names, vec!["a.md", "b.md", "c.md"]);
    }

    #[test]
    fn test_unknown_and_ignored_paths_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir(root.join(".git")).unwrap();
        let mut workspace = open(root);

        std::fs::write(root.join(".git/x.md"), "").unwrap();
        std::fs::write(root.join("image.png"), "").unwrap();
        for path in [
            root.join(".git/x.md"),
            root.join("image.png"),
            PathBuf::from("/somewhere/else.md"),
        ] {
            let changes = workspace
                .apply(&FileEvent::new(FileEventKind::Add, path))
                .unwrap();
            assert!(changes.is_empty());
        }
        assert!(workspace.tree().is_empty());
    }

    #[test]
    fn test_add_dir_loads_subtree() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let mut workspace = open(root);

        std::fs::create_dir_all(root.join("new/deep")).unwrap();
        std::fs::write(root.join("new/deep/a.md"), "x").unwrap();

        // Only the innermost file is reported; the missing parents come with it.
        workspace
            .apply(&FileEvent::new(FileEventKind::Add, root.join("new/deep/a.md")))
            .unwrap();

        let tree = workspace.tree();
        assert!(tree.find_by_path(&root.join("new")).is_some());
        assert!(tree.find_by_path(&root.join("new/deep")).is_some());
        assert!(tree.find_by_path(&root.join("new/deep/a.md")).is_some());
    }

    #[test]
    fn test_unlink_dir_removes_descendants() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("sub")).unwrap();
        std::fs::write(root.join("sub/a.md"), "x").unwrap();
        let mut workspace = open(root);
        let file = workspace.tree().find_by_path(&root.join("sub/a.md")).unwrap();

        std::fs::remove_dir_all(root.join("sub")).unwrap();
        let changes = workspace
            .apply(&FileEvent::new(FileEventKind::UnlinkDir, root.join("sub")))
            .unwrap();

        assert!(workspace.tree().get(file).is_none());
        assert_eq!(
            changes
                .iter()
                .filter(|c| matches!(c, TreeChange::Removed { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn test_rename_pair_out_of_order() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::write(root.join("old.md"), "#keep").unwrap();
        let mut workspace = open(root);

        std::fs::rename(root.join("old.md"), root.join("new.md")).unwrap();
        workspace
            .apply(&FileEvent::new(FileEventKind::RenameTo, root.join("new.md")))
            .unwrap();
        workspace
            .apply(&FileEvent::new(FileEventKind::RenameFrom, root.join("old.md")))
            .unwrap();

        let tree = workspace.tree();
        assert!(tree.find_by_path(&root.join("old.md")).is_none());
        let id = tree.find_by_path(&root.join("new.md")).unwrap();
        assert!(tree.file(id).unwrap().tags.contains("keep"));
        assert_eq!(tree.children(tree.root_id()).len(), 1);
    }

    #[test]
    fn test_expected_event_is_consumed_once() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let path = root.join("a.md");
        std::fs::write(&path, "#one").unwrap();
        let mut workspace = open(root);
        let id = workspace.tree().find_by_path(&path).unwrap();

        workspace.expect(FileEventKind::Change, &path);
        std::fs::write(&path, "#two").unwrap();

        let event = FileEvent::new(FileEventKind::Change, &path);
        assert!(workspace.apply(&event).unwrap().is_empty());
        assert!(workspace.tree().file(id).unwrap().tags.contains("one"));

        assert!(!workspace.apply(&event).unwrap().is_empty());
        assert!(workspace.tree().file(id).unwrap().tags.contains("two"));
    }
}
