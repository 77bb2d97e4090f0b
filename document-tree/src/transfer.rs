//! Flat records handed to the display layer.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::node::{FileNode, Node, NodeType};

/// One node flattened for transfer.
///
/// `content` is only filled for a one-shot read and is never kept by the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    /// Containing directory.
    pub dir: PathBuf,

    pub name: String,

    pub path: PathBuf,

    pub hash: i32,

    /// Document identifier found in the content.
    pub id: Option<String>,

    #[serde(rename = "type")]
    pub node_type: NodeType,

    pub extension: String,

    /// Milliseconds since the Unix epoch.
    pub modified_time: i64,

    pub snippet: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Transfer {
    /// Flatten a file without its content.
    pub fn from_file(file: &FileNode) -> Self {
        let header = &file.header;
        Self {
            dir: header
                .path
                .parent()
                .map(PathBuf::from)
                .unwrap_or_default(),
            name: header.name.clone(),
            path: header.path.clone(),
            hash: header.hash,
            id: file.document_id.clone(),
            node_type: NodeType::File,
            extension: file.extension.clone(),
            modified_time: file.modified.timestamp_millis(),
            snippet: file.snippet.clone(),
            content: None,
        }
    }

    /// Flatten any node. Containers have no extension, time or snippet.
    pub fn from_node(node: &Node) -> Self {
        if let Node::File(file) = node {
            return Self::from_file(file);
        }
        let header = node.header();
        Self {
            dir: header
                .path
                .parent()
                .map(PathBuf::from)
                .unwrap_or_default(),
            name: header.name.clone(),
            path: header.path.clone(),
            hash: header.hash,
            id: None,
            node_type: node.node_type(),
            extension: String::new(),
            modified_time: 0,
            snippet: String::new(),
            content: None,
        }
    }

    /// Attach content for a one-shot read.
    pub fn with_content(mut self, content: String) -> Self {
        self.content = Some(content);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeId;
    use crate::scanner::scan;
    use chrono::DateTime;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_transfer_field_names() {
        let mut file = FileNode::new(NodeId(3), PathBuf::from("/notes/a.md"), NodeId(0));
        let modified = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        file.apply_scan(scan("@ID:doc-1 #tag"), modified);

        let value =
            serde_json::to_value(Transfer::from_file(&file).with_content("body".to_string()))
                .unwrap();

        assert_eq!(value["dir"], "/notes");
        assert_eq!(value["name"], "a.md");
        assert_eq!(value["id"], "doc-1");
        assert_eq!(value["type"], "file");
        assert_eq!(value["extension"], "md");
        assert_eq!(value["modifiedTime"], 1_700_000_000_123_i64);
        assert_eq!(value["content"], "body");
    }

    #[test]
    fn test_content_omitted_when_absent() {
        let file = FileNode::new(NodeId(3), PathBuf::from("/notes/a.md"), NodeId(0));
        let value = serde_json::to_value(Transfer::from_file(&file)).unwrap();
        assert!(value.get("content").is_none());
    }
}
