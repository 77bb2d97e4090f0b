//! User-initiated operations.
//!
//! Every operation that touches disk registers the watcher events it will
//! cause before making the call, so the echo is not reconciled a second time.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use notes_directory_watcher::FileEventKind;

use crate::change::{TreeChange, push_unique};
use crate::error::{Result, TreeError};
use crate::node::{Node, NodeId};
use crate::workspace::Workspace;

/// Characters that never survive into a file or directory name.
const RESERVED: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Clean a user-supplied name.
///
/// Drops separators, reserved and control characters, then trims surrounding
/// whitespace and dots. Nothing left is an [`TreeError::InvalidName`].
pub fn sanitize_name(raw: &str) -> Result<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_control() && !RESERVED.contains(c))
        .collect();
    let trimmed = cleaned.trim_matches(|c: char| c.is_whitespace() || c == '.');
    if trimmed.is_empty() {
        return Err(TreeError::InvalidName(raw.to_string()));
    }
    Ok(trimmed.to_string())
}

impl Workspace {
    /// Sanitized file name, given an allowed extension when it lacks one.
    fn file_name(&self, raw: &str, current: Option<&str>) -> Result<String> {
        let name = sanitize_name(raw)?;
        let has_allowed = Path::new(&name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.rules.allows_extension(e));
        if has_allowed {
            return Ok(name);
        }

        let extension = current
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .or_else(|| self.rules.default_extension());
        Ok(match extension {
            Some(ext) => format!("{name}.{ext}"),
            None => name,
        })
    }

    fn ensure_free(&self, path: &Path) -> Result<()> {
        if self.tree.find_by_path(path).is_some()
            || self
                .fs
                .stat(path)
                .map_err(|e| TreeError::from_io(e, path))?
                .is_some()
        {
            return Err(TreeError::AlreadyExists(path.to_path_buf()));
        }
        Ok(())
    }

    /// Write new content to a file and rescan it.
    pub fn save(&mut self, id: NodeId, content: &str) -> Result<Vec<TreeChange>> {
        let path = self.tree.file(id)?.header.path.clone();
        self.expectations.expect(FileEventKind::Change, &path);
        self.fs
            .write(&path, content.as_bytes())
            .map_err(|e| TreeError::from_io(e, &path))?;
        debug!("Saved {}", path.display());
        self.refresh(id)
    }

    /// Create an empty file in a directory.
    pub fn create_file(&mut self, parent: NodeId, name: &str) -> Result<(NodeId, Vec<TreeChange>)> {
        let dir = self.tree.directory(parent)?.header.path.clone();
        let path = dir.join(self.file_name(name, None)?);
        self.ensure_free(&path)?;

        self.expectations.expect(FileEventKind::Add, &path);
        self.fs
            .write(&path, b"")
            .map_err(|e| TreeError::from_io(e, &path))?;

        let id = self.tree.insert_file(parent, path)?;
        let mut changes = self.refresh(id)?;
        if let Some(node) = self.tree.get(id) {
            changes.insert(0, TreeChange::added(node));
        }
        changes.retain(|c| !matches!(c, TreeChange::Updated { .. }));
        Ok((id, changes))
    }

    /// Create an empty directory.
    pub fn create_directory(
        &mut self,
        parent: NodeId,
        name: &str,
    ) -> Result<(NodeId, Vec<TreeChange>)> {
        let dir = self.tree.directory(parent)?.header.path.clone();
        let path = dir.join(sanitize_name(name)?);
        self.ensure_free(&path)?;

        self.expectations.expect(FileEventKind::AddDir, &path);
        self.fs
            .create_dir(&path)
            .map_err(|e| TreeError::from_io(e, &path))?;

        let id = self.tree.insert_directory(parent, path)?;
        let mut changes = Vec::new();
        if let Some(node) = self.tree.get(id) {
            changes.push(TreeChange::added(node));
        }
        if let Some(node) = self.tree.get(parent) {
            changes.push(TreeChange::container(node));
        }
        Ok((id, changes))
    }

    /// Add a virtual directory, optionally collecting files by tag.
    pub fn create_virtual_directory(
        &mut self,
        parent: NodeId,
        name: &str,
        tag_rule: Option<&str>,
    ) -> Result<(NodeId, Vec<TreeChange>)> {
        let name = sanitize_name(name)?;
        let rule = tag_rule
            .map(|t| t.trim().trim_start_matches('#').to_string())
            .filter(|t| !t.is_empty());
        let id = self.tree.insert_virtual(parent, &name, rule)?;

        let mut changes = Vec::new();
        if let Some(node) = self.tree.get(id) {
            changes.push(TreeChange::added(node));
        }
        if let Some(node) = self.tree.get(parent) {
            changes.push(TreeChange::container(node));
        }
        Ok((id, changes))
    }

    /// Put a file into a virtual directory.
    pub fn link(&mut self, virtual_dir: NodeId, file: NodeId) -> Result<Vec<TreeChange>> {
        if !self.tree.link(virtual_dir, file)? {
            return Ok(Vec::new());
        }
        Ok(self.container_change(virtual_dir))
    }

    /// Take a file out of a virtual directory.
    pub fn unlink(&mut self, virtual_dir: NodeId, file: NodeId) -> Result<Vec<TreeChange>> {
        if !self.tree.unlink(virtual_dir, file)? {
            return Ok(Vec::new());
        }
        Ok(self.container_change(virtual_dir))
    }

    fn container_change(&self, id: NodeId) -> Vec<TreeChange> {
        self.tree
            .get(id)
            .map(|node| vec![TreeChange::container(node)])
            .unwrap_or_default()
    }

    /// Rename a node in place.
    ///
    /// File names keep their extension when the new name has no allowed one.
    /// Descendants of a renamed directory are re-pathed and re-hashed.
    pub fn rename(&mut self, id: NodeId, new_name: &str) -> Result<Vec<TreeChange>> {
        let node = self.tree.node(id)?;
        let Some(parent) = node.parent() else {
            return Err(TreeError::InvalidMove(node.path().to_path_buf()));
        };
        let name = match node {
            Node::File(file) => self.file_name(new_name, Some(&file.extension))?,
            Node::Directory(_) | Node::Virtual(_) => sanitize_name(new_name)?,
        };
        let parent_path = self.tree.directory(parent)?.header.path.clone();
        let new_path = parent_path.join(&name);
        if new_path == node.path() {
            return Ok(Vec::new());
        }

        if let Node::Virtual(_) = node {
            let taken = self.tree.children(parent).iter().any(|c| {
                self.tree
                    .get(*c)
                    .is_some_and(|n| matches!(n, Node::Virtual(_)) && n.name() == name)
            });
            if taken {
                return Err(TreeError::AlreadyExists(new_path));
            }
            return self.relocate_with_changes(id, parent, new_path);
        }

        // Only the case differs: the filesystem may report the target as taken.
        let case_only = node.path().to_string_lossy().to_lowercase()
            == new_path.to_string_lossy().to_lowercase();
        if !case_only {
            self.ensure_free(&new_path)?;
        }
        self.move_on_disk(id, parent, new_path)
    }

    /// Move a node into another directory, keeping its name.
    pub fn move_to(&mut self, id: NodeId, target: NodeId) -> Result<Vec<TreeChange>> {
        let node = self.tree.node(id)?;
        let target_path = self.tree.directory(target)?.header.path.clone();
        let new_path = target_path.join(node.name());
        if node.parent() == Some(target) {
            return Ok(Vec::new());
        }
        if node.parent().is_none() || self.tree.is_ancestor_or_self(id, target) {
            return Err(TreeError::InvalidMove(new_path));
        }

        if let Node::Virtual(_) = node {
            let name = node.name().to_string();
            let taken = self.tree.children(target).iter().any(|c| {
                self.tree
                    .get(*c)
                    .is_some_and(|n| matches!(n, Node::Virtual(_)) && n.name() == name)
            });
            if taken {
                return Err(TreeError::AlreadyExists(new_path));
            }
            return self.relocate_with_changes(id, target, new_path);
        }

        self.ensure_free(&new_path)?;
        self.move_on_disk(id, target, new_path)
    }

    fn move_on_disk(
        &mut self,
        id: NodeId,
        new_parent: NodeId,
        new_path: PathBuf,
    ) -> Result<Vec<TreeChange>> {
        let old_path = self.tree.node(id)?.path().to_path_buf();

        self.expectations
            .expect(FileEventKind::RenameFrom, &old_path);
        self.expectations.expect(FileEventKind::RenameTo, &new_path);
        self.fs
            .rename(&old_path, &new_path)
            .map_err(|e| TreeError::from_io(e, &old_path))?;
        info!("Moved {} -> {}", old_path.display(), new_path.display());

        self.relocate_with_changes(id, new_parent, new_path)
    }

    fn relocate_with_changes(
        &mut self,
        id: NodeId,
        new_parent: NodeId,
        new_path: PathBuf,
    ) -> Result<Vec<TreeChange>> {
        let before = self.snapshot(id);
        let old_parent = self.tree.node(id)?.parent();
        self.tree.relocate(id, new_parent, new_path)?;

        let mut changes = Vec::new();
        let mut touched = Vec::new();
        for (node_id, old_path, old_hash) in before {
            let Some(node) = self.tree.get(node_id) else {
                continue;
            };
            changes.push(TreeChange::Renamed {
                id: node_id,
                old_hash,
                old_path,
                hash: node.hash(),
                path: node.path().to_path_buf(),
            });
            if let Node::File(file) = node {
                touched.extend(file.virtual_dirs.iter().copied());
            }
        }
        for parent in old_parent.into_iter().chain([new_parent]) {
            if let Some(node) = self.tree.get(parent) {
                push_unique(&mut changes, TreeChange::container(node));
            }
        }
        self.virtual_changes(&touched, &mut changes);
        Ok(changes)
    }

    /// Ids, paths and hashes of a node and everything below it.
    fn snapshot(&self, id: NodeId) -> Vec<(NodeId, PathBuf, i32)> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.tree.get(id) {
                out.push((id, node.path().to_path_buf(), node.hash()));
                stack.extend(self.tree.children(id).iter().copied());
            }
        }
        out
    }

    /// Move a file or directory to the trash and detach it.
    ///
    /// Virtual directories only exist in memory and are simply removed.
    pub fn delete(&mut self, id: NodeId) -> Result<Vec<TreeChange>> {
        let node = self.tree.node(id)?;
        let path = node.path().to_path_buf();
        let removal = match node {
            Node::Virtual(_) => return self.tree.remove(id),
            Node::File(_) => FileEventKind::Unlink,
            Node::Directory(_) if node.parent().is_none() => {
                return Err(TreeError::InvalidMove(path));
            }
            Node::Directory(_) => FileEventKind::UnlinkDir,
        };

        // Trashing is usually a move, which the watcher reports as a rename.
        self.expectations.expect(removal, &path);
        self.expectations.expect(FileEventKind::RenameFrom, &path);
        let destination = self
            .trash
            .trash(&path)
            .map_err(|e| TreeError::Trash(format!("{}: {e}", path.display())))?;
        info!("Trashed {} -> {}", path.display(), destination.display());

        self.tree.remove(id)
    }
}
