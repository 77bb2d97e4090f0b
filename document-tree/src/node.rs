//! Tree node types.
//!
//! A [`Node`] is one of three variants. Files are owned by exactly one
//! directory. Virtual directories group files from anywhere in the tree without
//! owning them; both sides of that relation store [`NodeId`]s, never references.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hash::hash_path;
use crate::scanner::ScanResult;

/// Arena index of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which variant a node is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    File,
    Directory,
    VirtualDirectory,
}

/// Fields every node carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeHeader {
    pub id: NodeId,
    pub path: PathBuf,
    pub name: String,
    pub hash: i32,
}

impl NodeHeader {
    fn new(id: NodeId, path: PathBuf) -> Self {
        let name = basename(&path);
        let hash = hash_path(&path);
        Self {
            id,
            path,
            name,
            hash,
        }
    }

    /// Point the header at a new path; name and hash follow.
    pub fn set_path(&mut self, path: PathBuf) {
        self.name = basename(&path);
        self.hash = hash_path(&path);
        self.path = path;
    }
}

/// A document on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
    pub header: NodeHeader,
    pub extension: String,
    pub modified: DateTime<Utc>,
    pub snippet: String,
    pub tags: BTreeSet<String>,
    pub document_id: Option<String>,
    /// Owning directory.
    pub parent: NodeId,
    /// Virtual directories that list this file.
    pub virtual_dirs: BTreeSet<NodeId>,
}

impl FileNode {
    pub fn new(id: NodeId, path: PathBuf, parent: NodeId) -> Self {
        let extension = extension_of(&path);
        Self {
            header: NodeHeader::new(id, path),
            extension,
            modified: DateTime::<Utc>::UNIX_EPOCH,
            snippet: String::new(),
            tags: BTreeSet::new(),
            document_id: None,
            parent,
            virtual_dirs: BTreeSet::new(),
        }
    }

    /// Store a scan result.
    pub fn apply_scan(&mut self, scan: ScanResult, modified: DateTime<Utc>) {
        self.snippet = scan.snippet;
        self.tags = scan.tags;
        self.document_id = scan.document_id;
        self.modified = modified;
    }

    /// Move to a new path, keeping scan state and memberships.
    pub fn set_path(&mut self, path: PathBuf) {
        self.extension = extension_of(&path);
        self.header.set_path(path);
    }
}

/// A directory on disk; owns its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryNode {
    pub header: NodeHeader,
    /// `None` only for the workspace root.
    pub parent: Option<NodeId>,
    /// Children in display order.
    pub children: Vec<NodeId>,
}

impl DirectoryNode {
    pub fn new(id: NodeId, path: PathBuf, parent: Option<NodeId>) -> Self {
        Self {
            header: NodeHeader::new(id, path),
            parent,
            children: Vec::new(),
        }
    }
}

/// A named grouping of files from anywhere in the tree.
///
/// Lives among its parent directory's children under a path that does not
/// exist on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualDirectory {
    pub header: NodeHeader,
    pub parent: NodeId,
    /// Files collected automatically when they carry this tag.
    pub tag_rule: Option<String>,
    /// Member files in the order they joined.
    pub members: Vec<NodeId>,
    /// Members added through an explicit link. The tag rule never drops these.
    pub linked: BTreeSet<NodeId>,
}

impl VirtualDirectory {
    pub fn new(id: NodeId, path: PathBuf, parent: NodeId, tag_rule: Option<String>) -> Self {
        Self {
            header: NodeHeader::new(id, path),
            parent,
            tag_rule: tag_rule.map(|t| t.to_lowercase()),
            members: Vec::new(),
            linked: BTreeSet::new(),
        }
    }

    pub fn contains(&self, file: NodeId) -> bool {
        self.members.contains(&file)
    }

    /// Add a member; returns `false` if it was already present.
    pub fn insert(&mut self, file: NodeId) -> bool {
        if self.contains(file) {
            return false;
        }
        self.members.push(file);
        true
    }

    /// Add a member by hand; returns `false` if it was already present.
    pub fn link(&mut self, file: NodeId) -> bool {
        self.linked.insert(file);
        self.insert(file)
    }

    /// Drop a member the tag rule no longer matches, unless it was linked by hand.
    pub fn release(&mut self, file: NodeId) -> bool {
        if self.linked.contains(&file) {
            return false;
        }
        self.remove(file)
    }

    /// Drop a member however it joined; returns `false` if it was absent.
    pub fn remove(&mut self, file: NodeId) -> bool {
        self.linked.remove(&file);
        let before = self.members.len();
        self.members.retain(|m| *m != file);
        self.members.len() != before
    }
}

/// Any member of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    File(FileNode),
    Directory(DirectoryNode),
    Virtual(VirtualDirectory),
}

impl Node {
    pub fn header(&self) -> &NodeHeader {
        match self {
            Node::File(f) => &f.header,
            Node::Directory(d) => &d.header,
            Node::Virtual(v) => &v.header,
        }
    }

    pub fn id(&self) -> NodeId {
        self.header().id
    }

    pub fn path(&self) -> &Path {
        &self.header().path
    }

    pub fn name(&self) -> &str {
        &self.header().name
    }

    pub fn hash(&self) -> i32 {
        self.header().hash
    }

    pub fn node_type(&self) -> NodeType {
        match self {
            Node::File(_) => NodeType::File,
            Node::Directory(_) => NodeType::Directory,
            Node::Virtual(_) => NodeType::VirtualDirectory,
        }
    }

    /// Owning directory, if any.
    pub fn parent(&self) -> Option<NodeId> {
        match self {
            Node::File(f) => Some(f.parent),
            Node::Directory(d) => d.parent,
            Node::Virtual(v) => Some(v.parent),
        }
    }

    pub fn as_file(&self) -> Option<&FileNode> {
        match self {
            Node::File(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_directory(&self) -> Option<&DirectoryNode> {
        match self {
            Node::Directory(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_virtual(&self) -> Option<&VirtualDirectory> {
        match self {
            Node::Virtual(v) => Some(v),
            _ => None,
        }
    }
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_str;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_header_follows_path() {
        let mut file = FileNode::new(NodeId(1), PathBuf::from("/notes/a.md"), NodeId(0));
        assert_eq!(file.header.name, "a.md");
        assert_eq!(file.extension, "md");
        assert_eq!(file.header.hash, hash_str("/notes/a.md"));

        file.set_path(PathBuf::from("/notes/sub/b.txt"));
        assert_eq!(file.header.name, "b.txt");
        assert_eq!(file.extension, "txt");
        assert_eq!(file.header.hash, hash_str("/notes/sub/b.txt"));
    }

    #[test]
    fn test_virtual_membership() {
        let mut vd = VirtualDirectory::new(
            NodeId(2),
            PathBuf::from("/notes/Work"),
            NodeId(0),
            Some("Work".to_string()),
        );
        assert_eq!(vd.tag_rule.as_deref(), Some("work"));

        assert!(vd.insert(NodeId(5)));
        assert!(!vd.insert(NodeId(5)));
        assert!(vd.contains(NodeId(5)));
        assert!(vd.remove(NodeId(5)));
        assert!(!vd.remove(NodeId(5)));
    }

    #[test]
    fn test_node_accessors() {
        let node = Node::Directory(DirectoryNode::new(NodeId(0), PathBuf::from("/notes"), None));
        assert_eq!(node.node_type(), NodeType::Directory);
        assert_eq!(node.name(), "notes");
        assert_eq!(node.parent(), None);
        assert!(node.as_file().is_none());
        assert!(node.as_directory().is_some());
    }
}
