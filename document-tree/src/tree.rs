//! The in-memory document tree.
//!
//! Nodes live in one map keyed by [`NodeId`]. Directories own their children
//! through id lists; files and virtual directories reference each other through
//! id sets, so removing a node is a matter of walking those sets.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::change::{TreeChange, push_unique};
use crate::config::SortKey;
use crate::error::{Result, TreeError};
use crate::node::{DirectoryNode, FileNode, Node, NodeId, VirtualDirectory};
use crate::scanner::ScanResult;
use crate::utils::sort_children;

/// The node responsible for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// A file whose path equals the queried path.
    File(NodeId),
    /// The deepest known directory that is, or contains, the queried path.
    Directory(NodeId),
}

/// Mirror of a directory on disk.
#[derive(Debug, Clone)]
pub struct DocumentTree {
    nodes: HashMap<NodeId, Node>,
    root: NodeId,
    next_id: u64,
    /// Disk-backed nodes by path.
    path_index: HashMap<PathBuf, NodeId>,
    /// Every node by identity hash; buckets hold colliding ids.
    hash_index: HashMap<i32, Vec<NodeId>>,
    virtuals: BTreeSet<NodeId>,
    sort: SortKey,
}

impl DocumentTree {
    /// Create a tree holding only its root directory.
    pub fn new(root: impl Into<PathBuf>, sort: SortKey) -> Self {
        let root_id = NodeId(0);
        let mut tree = Self {
            nodes: HashMap::new(),
            root: root_id,
            next_id: 1,
            path_index: HashMap::new(),
            hash_index: HashMap::new(),
            virtuals: BTreeSet::new(),
            sort,
        };
        tree.nodes.insert(
            root_id,
            Node::Directory(DirectoryNode::new(root_id, root.into(), None)),
        );
        tree.index(root_id);
        tree
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn root_path(&self) -> &Path {
        self.nodes
            .get(&self.root)
            .map(Node::path)
            .unwrap_or_else(|| Path::new(""))
    }

    pub fn sort(&self) -> SortKey {
        self.sort
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(&id).ok_or(TreeError::UnknownNode(id))
    }

    pub fn file(&self, id: NodeId) -> Result<&FileNode> {
        match self.node(id)? {
            Node::File(f) => Ok(f),
            other => Err(TreeError::NotAFile(other.path().to_path_buf())),
        }
    }

    pub fn directory(&self, id: NodeId) -> Result<&DirectoryNode> {
        match self.node(id)? {
            Node::Directory(d) => Ok(d),
            other => Err(TreeError::NotADirectory(other.path().to_path_buf())),
        }
    }

    pub fn virtual_dir(&self, id: NodeId) -> Result<&VirtualDirectory> {
        match self.node(id)? {
            Node::Virtual(v) => Ok(v),
            other => Err(TreeError::NotADirectory(other.path().to_path_buf())),
        }
    }

    /// Children of a directory in display order; empty for other variants.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.nodes.get(&id) {
            Some(Node::Directory(d)) => &d.children,
            _ => &[],
        }
    }

    /// Member files of a virtual directory.
    pub fn members(&self, id: NodeId) -> Result<Vec<&FileNode>> {
        let vd = self.virtual_dir(id)?;
        Ok(vd
            .members
            .iter()
            .filter_map(|m| self.nodes.get(m).and_then(Node::as_file))
            .collect())
    }

    /// All virtual directories.
    pub fn virtual_dirs(&self) -> impl Iterator<Item = &VirtualDirectory> {
        self.virtuals
            .iter()
            .filter_map(|id| self.nodes.get(id).and_then(Node::as_virtual))
    }

    /// Files below `from` in display order (depth first, files before subdirectories).
    pub fn files_under(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            match self.nodes.get(&id) {
                Some(Node::File(_)) => out.push(id),
                Some(Node::Directory(d)) => stack.extend(d.children.iter().rev()),
                Some(Node::Virtual(_)) | None => {}
            }
        }
        out
    }

    /// Disk-backed node at exactly `path`.
    pub fn find_by_path(&self, path: &Path) -> Option<NodeId> {
        self.path_index.get(path).copied()
    }

    /// Look a node up by identity hash.
    ///
    /// With `path`, only a node at that exact path matches. Without it, a hash
    /// shared by several nodes is reported as a collision instead of guessing.
    pub fn find_by_hash(&self, hash: i32, path: Option<&Path>) -> Result<Option<NodeId>> {
        let Some(bucket) = self.hash_index.get(&hash) else {
            return Ok(None);
        };

        if let Some(path) = path {
            return Ok(bucket
                .iter()
                .copied()
                .find(|id| self.nodes.get(id).is_some_and(|n| n.path() == path)));
        }

        match bucket.as_slice() {
            [] => Ok(None),
            [id] => Ok(Some(*id)),
            [first, second, ..] => {
                let existing = self.node(*first)?.path().to_path_buf();
                let incoming = self.node(*second)?.path().to_path_buf();
                warn!(
                    "Hash {hash} is shared by {} and {}",
                    existing.display(),
                    incoming.display()
                );
                Err(TreeError::IdentityCollision {
                    hash,
                    existing,
                    incoming,
                })
            }
        }
    }

    /// Find the node whose scope contains `path`.
    pub fn scope_of(&self, path: &Path) -> Option<Scope> {
        if let Some(id) = self.path_index.get(path) {
            match self.nodes.get(id) {
                Some(Node::File(_)) => return Some(Scope::File(*id)),
                Some(Node::Directory(_)) => return Some(Scope::Directory(*id)),
                _ => {}
            }
        }

        if !path.starts_with(self.root_path()) {
            return None;
        }

        let mut current = path.parent();
        while let Some(dir) = current {
            if let Some(id) = self.path_index.get(dir) {
                if let Some(Node::Directory(_)) = self.nodes.get(id) {
                    return Some(Scope::Directory(*id));
                }
            }
            current = dir.parent();
        }
        None
    }

    /// Add a file under `parent`. The file starts unscanned.
    pub fn insert_file(&mut self, parent: NodeId, path: PathBuf) -> Result<NodeId> {
        self.check_insert(parent, &path)?;
        let id = self.allocate();
        self.attach(parent, Node::File(FileNode::new(id, path, parent)));
        Ok(id)
    }

    /// Add an empty directory under `parent`.
    pub fn insert_directory(&mut self, parent: NodeId, path: PathBuf) -> Result<NodeId> {
        self.check_insert(parent, &path)?;
        let id = self.allocate();
        self.attach(
            parent,
            Node::Directory(DirectoryNode::new(id, path, Some(parent))),
        );
        Ok(id)
    }

    /// Add a virtual directory under `parent`, filling it from its tag rule.
    pub fn insert_virtual(
        &mut self,
        parent: NodeId,
        name: &str,
        tag_rule: Option<String>,
    ) -> Result<NodeId> {
        let path = self.directory(parent)?.header.path.join(name);
        let duplicate = self.children(parent).iter().any(|c| {
            self.nodes
                .get(c)
                .is_some_and(|n| matches!(n, Node::Virtual(_)) && n.name() == name)
        });
        if duplicate {
            return Err(TreeError::AlreadyExists(path));
        }

        let id = self.allocate();
        self.attach(
            parent,
            Node::Virtual(VirtualDirectory::new(id, path, parent, tag_rule)),
        );
        self.virtuals.insert(id);

        for file in self.files_under(self.root) {
            self.sync_tag_rules(file);
        }
        Ok(id)
    }

    fn check_insert(&self, parent: NodeId, path: &Path) -> Result<()> {
        let dir = self.directory(parent)?;
        if path.parent() != Some(dir.header.path.as_path()) {
            return Err(TreeError::OutsideWorkspace(path.to_path_buf()));
        }
        if self.path_index.contains_key(path) {
            return Err(TreeError::AlreadyExists(path.to_path_buf()));
        }
        Ok(())
    }

    fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn attach(&mut self, parent: NodeId, node: Node) {
        let id = node.id();
        self.nodes.insert(id, node);
        self.index(id);
        if let Some(Node::Directory(d)) = self.nodes.get_mut(&parent) {
            d.children.push(id);
        }
        self.resort(parent);
    }

    fn index(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let path = node.path().to_path_buf();
        let hash = node.hash();

        if !matches!(node, Node::Virtual(_)) {
            self.path_index.insert(path.clone(), id);
        }

        let bucket = self.hash_index.entry(hash).or_default();
        for other in bucket.iter() {
            if let Some(other_node) = self.nodes.get(other) {
                if other_node.path() != path {
                    warn!(
                        "Identity collision on {hash}: {} and {}",
                        other_node.path().display(),
                        path.display()
                    );
                }
            }
        }
        bucket.push(id);
    }

    fn unindex(&mut self, id: NodeId, path: &Path, hash: i32) {
        if self.path_index.get(path) == Some(&id) {
            self.path_index.remove(path);
        }
        if let Some(bucket) = self.hash_index.get_mut(&hash) {
            bucket.retain(|other| *other != id);
            if bucket.is_empty() {
                self.hash_index.remove(&hash);
            }
        }
    }

    /// Store a fresh scan for a file.
    ///
    /// Returns the virtual directories that must be notified: those the file
    /// already belonged to plus any it joined or left through a tag rule.
    pub fn update_scan(
        &mut self,
        id: NodeId,
        scan: ScanResult,
        modified: DateTime<Utc>,
    ) -> Result<Vec<NodeId>> {
        let (parent, mut touched) = match self.nodes.get_mut(&id) {
            Some(Node::File(file)) => {
                file.apply_scan(scan, modified);
                (file.parent, file.virtual_dirs.clone())
            }
            Some(other) => return Err(TreeError::NotAFile(other.path().to_path_buf())),
            None => return Err(TreeError::UnknownNode(id)),
        };

        touched.extend(self.sync_tag_rules(id));
        self.resort(parent);
        Ok(touched.into_iter().collect())
    }

    /// Reconcile a file against every tag-rule virtual directory.
    fn sync_tag_rules(&mut self, file_id: NodeId) -> Vec<NodeId> {
        let tags = match self.nodes.get(&file_id) {
            Some(Node::File(f)) => f.tags.clone(),
            _ => return Vec::new(),
        };

        let mut changed = Vec::new();
        for vd_id in self.virtuals.iter().copied() {
            let Some(Node::Virtual(vd)) = self.nodes.get_mut(&vd_id) else {
                continue;
            };
            let Some(rule) = vd.tag_rule.as_ref() else {
                continue;
            };
            let wanted = tags.contains(rule);
            let flipped = if wanted {
                vd.insert(file_id)
            } else {
                vd.release(file_id)
            };
            if !flipped {
                continue;
            }

            if let Some(Node::File(f)) = self.nodes.get_mut(&file_id) {
                if wanted {
                    f.virtual_dirs.insert(vd_id);
                } else {
                    f.virtual_dirs.remove(&vd_id);
                }
            }
            changed.push(vd_id);
        }
        changed
    }

    /// Add a file to a virtual directory.
    pub fn link(&mut self, vd: NodeId, file: NodeId) -> Result<bool> {
        self.file(file)?;
        let added = match self.nodes.get_mut(&vd) {
            Some(Node::Virtual(v)) => v.link(file),
            Some(other) => return Err(TreeError::NotADirectory(other.path().to_path_buf())),
            None => return Err(TreeError::UnknownNode(vd)),
        };
        if let Some(Node::File(f)) = self.nodes.get_mut(&file) {
            f.virtual_dirs.insert(vd);
        }
        Ok(added)
    }

    /// Drop a file from a virtual directory.
    pub fn unlink(&mut self, vd: NodeId, file: NodeId) -> Result<bool> {
        let removed = match self.nodes.get_mut(&vd) {
            Some(Node::Virtual(v)) => v.remove(file),
            Some(other) => return Err(TreeError::NotADirectory(other.path().to_path_buf())),
            None => return Err(TreeError::UnknownNode(vd)),
        };
        if let Some(Node::File(f)) = self.nodes.get_mut(&file) {
            f.virtual_dirs.remove(&vd);
        }
        Ok(removed)
    }

    /// Detach a node and everything below it.
    ///
    /// Files are cleared from every virtual directory that listed them, and a
    /// removed virtual directory is cleared from its members.
    pub fn remove(&mut self, id: NodeId) -> Result<Vec<TreeChange>> {
        if id == self.root {
            return Err(TreeError::InvalidMove(self.root_path().to_path_buf()));
        }
        let parent = self.node(id)?.parent();

        let mut changes = Vec::new();
        self.remove_subtree(id, &mut changes);

        if let Some(parent) = parent {
            if let Some(Node::Directory(d)) = self.nodes.get_mut(&parent) {
                d.children.retain(|c| *c != id);
            }
            if let Some(node) = self.nodes.get(&parent) {
                push_unique(&mut changes, TreeChange::container(node));
            }
        }
        Ok(changes)
    }

    fn remove_subtree(&mut self, id: NodeId, changes: &mut Vec<TreeChange>) {
        let Some(node) = self.nodes.remove(&id) else {
            return;
        };
        self.unindex(id, node.path(), node.hash());

        match &node {
            Node::File(file) => {
                for vd_id in &file.virtual_dirs {
                    if let Some(vd_node) = self.nodes.get_mut(vd_id) {
                        if let Node::Virtual(vd) = vd_node {
                            vd.remove(id);
                        }
                        push_unique(changes, TreeChange::container(vd_node));
                    }
                }
            }
            Node::Directory(dir) => {
                for child in &dir.children {
                    self.remove_subtree(*child, changes);
                }
            }
            Node::Virtual(vd) => {
                self.virtuals.remove(&id);
                for member in &vd.members {
                    if let Some(Node::File(f)) = self.nodes.get_mut(member) {
                        f.virtual_dirs.remove(&id);
                    }
                }
            }
        }

        debug!("Removed {} from tree", node.path().display());
        changes.push(TreeChange::removed(&node));
    }

    /// Move a node under `new_parent` at `new_path`, re-pathing its subtree.
    pub fn relocate(&mut self, id: NodeId, new_parent: NodeId, new_path: PathBuf) -> Result<()> {
        if id == self.root {
            return Err(TreeError::InvalidMove(new_path));
        }
        self.directory(new_parent)?;
        if self.is_ancestor_or_self(id, new_parent) {
            return Err(TreeError::InvalidMove(new_path));
        }
        let old_parent = self.node(id)?.parent();

        if let Some(old) = old_parent {
            if let Some(Node::Directory(d)) = self.nodes.get_mut(&old) {
                d.children.retain(|c| *c != id);
            }
        }
        match self.nodes.get_mut(&id) {
            Some(Node::File(f)) => f.parent = new_parent,
            Some(Node::Directory(d)) => d.parent = Some(new_parent),
            Some(Node::Virtual(v)) => v.parent = new_parent,
            None => return Err(TreeError::UnknownNode(id)),
        }
        if let Some(Node::Directory(d)) = self.nodes.get_mut(&new_parent) {
            d.children.push(id);
        }

        self.repath(id, new_path);

        if let Some(old) = old_parent {
            self.resort(old);
        }
        self.resort(new_parent);
        Ok(())
    }

    /// Whether `ancestor` is `id` or one of its owning directories.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, mut id: NodeId) -> bool {
        loop {
            if id == ancestor {
                return true;
            }
            match self.nodes.get(&id).and_then(Node::parent) {
                Some(parent) => id = parent,
                None => return false,
            }
        }
    }

    fn repath(&mut self, id: NodeId, new_path: PathBuf) {
        let (old_path, old_hash, children) = match self.nodes.get(&id) {
            Some(node) => (
                node.path().to_path_buf(),
                node.hash(),
                self.children(id).to_vec(),
            ),
            None => return,
        };

        self.unindex(id, &old_path, old_hash);
        match self.nodes.get_mut(&id) {
            Some(Node::File(f)) => f.set_path(new_path.clone()),
            Some(Node::Directory(d)) => d.header.set_path(new_path.clone()),
            Some(Node::Virtual(v)) => v.header.set_path(new_path.clone()),
            None => return,
        }
        self.index(id);

        for child in children {
            let Some(name) = self.nodes.get(&child).map(|n| n.name().to_string()) else {
                continue;
            };
            self.repath(child, new_path.join(name));
        }
    }

    /// Change the sort key and re-sort every directory.
    pub fn set_sort(&mut self, sort: SortKey) {
        self.sort = sort;
        let directories: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| matches!(n, Node::Directory(_)))
            .map(Node::id)
            .collect();
        for dir in directories {
            self.resort(dir);
        }
    }

    /// Re-sort a directory's children.
    pub fn resort(&mut self, dir: NodeId) {
        let Some(Node::Directory(d)) = self.nodes.get(&dir) else {
            return;
        };
        let order: Vec<NodeId> = sort_children(
            d.children.iter().filter_map(|c| self.nodes.get(c)),
            self.sort,
        )
        .into_iter()
        .map(Node::id)
        .collect();

        if let Some(Node::Directory(d)) = self.nodes.get_mut(&dir) {
            d.children = order;
        }
    }
}
