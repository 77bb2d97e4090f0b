//! Notifications the tree emits for the display layer.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::node::{Node, NodeId, NodeType};

/// A change to the in-memory tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeChange {
    /// A node joined the tree.
    Added {
        id: NodeId,
        hash: i32,
        path: PathBuf,
        node_type: NodeType,
    },

    /// A file's scanned state was refreshed.
    Updated { id: NodeId, hash: i32, path: PathBuf },

    /// A node left the tree.
    Removed {
        id: NodeId,
        hash: i32,
        path: PathBuf,
        node_type: NodeType,
    },

    /// A node moved; its hash was recomputed from the new path.
    Renamed {
        id: NodeId,
        old_hash: i32,
        old_path: PathBuf,
        hash: i32,
        path: PathBuf,
    },

    /// A directory's children changed.
    DirectoryChanged { id: NodeId, hash: i32, path: PathBuf },

    /// A virtual directory's members changed or one of them was updated.
    VirtualDirectoryChanged { id: NodeId, hash: i32, path: PathBuf },
}

impl TreeChange {
    pub fn added(node: &Node) -> Self {
        Self::Added {
            id: node.id(),
            hash: node.hash(),
            path: node.path().to_path_buf(),
            node_type: node.node_type(),
        }
    }

    pub fn updated(node: &Node) -> Self {
        Self::Updated {
            id: node.id(),
            hash: node.hash(),
            path: node.path().to_path_buf(),
        }
    }

    pub fn removed(node: &Node) -> Self {
        Self::Removed {
            id: node.id(),
            hash: node.hash(),
            path: node.path().to_path_buf(),
            node_type: node.node_type(),
        }
    }

    /// Container notification for a directory or virtual directory.
    pub fn container(node: &Node) -> Self {
        let (id, hash, path) = (node.id(), node.hash(), node.path().to_path_buf());
        match node {
            Node::Virtual(_) => Self::VirtualDirectoryChanged { id, hash, path },
            _ => Self::DirectoryChanged { id, hash, path },
        }
    }

    /// The node this change is about.
    pub fn id(&self) -> NodeId {
        match self {
            Self::Added { id, .. }
            | Self::Updated { id, .. }
            | Self::Removed { id, .. }
            | Self::Renamed { id, .. }
            | Self::DirectoryChanged { id, .. }
            | Self::VirtualDirectoryChanged { id, .. } => *id,
        }
    }
}

/// Append `change` unless an identical one is already queued.
pub(crate) fn push_unique(changes: &mut Vec<TreeChange>, change: TreeChange) {
    if !changes.contains(&change) {
        changes.push(change);
    }
}
