//! Tree utilities: child ordering and ignore predicates.

use std::cmp::Ordering;

use crate::config::SortKey;
use crate::node::{FileNode, Node};

pub use notes_directory_watcher::IgnoreRules;

/// Order a directory's children.
///
/// The result is always files, then virtual directories, then directories.
/// Directories and virtual directories sort by case-insensitive name; files sort
/// by `key`. Equal keys fall back to the case-insensitive name and then the
/// exact name, so the order never depends on the input order.
pub fn sort_children<'a, I>(nodes: I, key: SortKey) -> Vec<&'a Node>
where
    I: IntoIterator<Item = &'a Node>,
{
    let mut files: Vec<&'a Node> = Vec::new();
    let mut virtuals: Vec<&'a Node> = Vec::new();
    let mut directories: Vec<&'a Node> = Vec::new();

    for node in nodes {
        match node {
            Node::File(_) => files.push(node),
            Node::Virtual(_) => virtuals.push(node),
            Node::Directory(_) => directories.push(node),
        }
    }

    files.sort_by(|a, b| match (a, b) {
        (Node::File(a), Node::File(b)) => compare_files(a, b, key),
        _ => Ordering::Equal,
    });
    virtuals.sort_by(|a, b| compare_names(a.name(), b.name()));
    directories.sort_by(|a, b| compare_names(a.name(), b.name()));

    files
        .into_iter()
        .chain(virtuals)
        .chain(directories)
        .collect()
}

fn compare_files(a: &FileNode, b: &FileNode, key: SortKey) -> Ordering {
    let by_name = || compare_names(&a.header.name, &b.header.name);
    match key {
        SortKey::NameUp => by_name(),
        SortKey::NameDown => compare_names(&b.header.name, &a.header.name),
        SortKey::TimeUp => a.modified.cmp(&b.modified).then_with(by_name),
        SortKey::TimeDown => b.modified.cmp(&a.modified).then_with(by_name),
    }
}

/// Case-insensitive comparison with an exact tie-break.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}
