//! File events from directory watching.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use serde::{Deserialize, Serialize};

/// A file system event, normalized from whatever the platform backend reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEvent {
    /// The kind of event.
    pub kind: FileEventKind,

    /// Path to the affected file or directory.
    pub path: PathBuf,

    /// When the event was observed.
    pub timestamp: DateTime<Utc>,
}

impl FileEvent {
    /// Create a new file event.
    pub fn new(kind: FileEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            timestamp: Utc::now(),
        }
    }

    /// Normalize a raw notify event into zero or more file events.
    ///
    /// A rename reported as a single `Both` event becomes a `RenameFrom`/`RenameTo`
    /// pair. Renames whose direction the backend could not tell are resolved by
    /// checking whether the path still exists.
    pub fn from_notify(event: notify::Event) -> Vec<Self> {
        let notify::Event { kind, paths, .. } = event;

        match kind {
            notify::EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                let mut events = Vec::with_capacity(2);
                let mut paths = paths.into_iter();
                if let Some(from) = paths.next() {
                    events.push(Self::new(FileEventKind::RenameFrom, from));
                }
                if let Some(to) = paths.next() {
                    events.push(Self::new(FileEventKind::RenameTo, to));
                }
                events
            }
            kind => paths
                .into_iter()
                .filter_map(|path| FileEventKind::classify(kind, &path).map(|k| Self::new(k, path)))
                .collect(),
        }
    }

    /// Whether this event reports the path disappearing.
    pub fn is_removal(&self) -> bool {
        matches!(
            self.kind,
            FileEventKind::Unlink | FileEventKind::UnlinkDir | FileEventKind::RenameFrom
        )
    }
}

/// Kind of file event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileEventKind {
    /// File content or metadata changed.
    Change,

    /// File was deleted.
    Unlink,

    /// File was created.
    Add,

    /// Directory was created.
    AddDir,

    /// Directory was deleted.
    UnlinkDir,

    /// Path was renamed away (old path).
    RenameFrom,

    /// Path was renamed into place (new path).
    RenameTo,
}

impl FileEventKind {
    /// Classify a notify event kind for one of its paths.
    ///
    /// Returns `None` for access-only and unclassifiable events.
    pub fn classify(kind: notify::EventKind, path: &Path) -> Option<Self> {
        match kind {
            notify::EventKind::Create(CreateKind::Folder) => Some(Self::AddDir),
            notify::EventKind::Create(CreateKind::File) => Some(Self::Add),
            notify::EventKind::Create(_) => {
                if path.is_dir() {
                    Some(Self::AddDir)
                } else {
                    Some(Self::Add)
                }
            }
            notify::EventKind::Remove(RemoveKind::Folder) => Some(Self::UnlinkDir),
            notify::EventKind::Remove(_) => Some(Self::Unlink),
            notify::EventKind::Modify(ModifyKind::Name(rename)) => match rename {
                RenameMode::From => Some(Self::RenameFrom),
                RenameMode::To => Some(Self::RenameTo),
                _ => {
                    if path.exists() {
                        Some(Self::RenameTo)
                    } else {
                        Some(Self::RenameFrom)
                    }
                }
            },
            notify::EventKind::Modify(_) => Some(Self::Change),
            notify::EventKind::Access(_) | notify::EventKind::Any | notify::EventKind::Other => {
                None
            }
        }
    }
}

impl fmt::Display for FileEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Change => "change",
            Self::Unlink => "unlink",
            Self::Add => "add",
            Self::AddDir => "add-dir",
            Self::UnlinkDir => "unlink-dir",
            Self::RenameFrom => "rename-from",
            Self::RenameTo => "rename-to",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, DataChange};
    use pretty_assertions::assert_eq;

    fn kinds(events: &[FileEvent]) -> Vec<FileEventKind> {
        events.iter().map(|e| e.kind).collect()
    }

    #[test]
    fn test_file_event_creation() {
        let event = FileEvent::new(FileEventKind::Add, "/notes/file.md");
        assert_eq!(event.kind, FileEventKind::Add);
        assert_eq!(event.path, Path::new("/notes/file.md"));
        assert!(!event.is_removal());
    }

    #[test]
    fn test_rename_both_splits_into_pair() {
        let raw = notify::Event::new(notify::EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/notes/old.md"))
            .add_path(PathBuf::from("/notes/new.md"));

        let events = FileEvent::from_notify(raw);
        assert_eq!(
            kinds(&events),
            vec![FileEventKind::RenameFrom, FileEventKind::RenameTo]
        );
        assert_eq!(events[0].path, Path::new("/notes/old.md"));
        assert_eq!(events[1].path, Path::new("/notes/new.md"));
        assert!(events[0].is_removal());
    }

    #[test]
    fn test_classification() {
        let path = Path::new("/nonexistent/notes/a.md");
        let cases = [
            (notify::EventKind::Create(CreateKind::File), Some(FileEventKind::Add)),
            (notify::EventKind::Create(CreateKind::Folder), Some(FileEventKind::AddDir)),
            (notify::EventKind::Remove(RemoveKind::File), Some(FileEventKind::Unlink)),
            (notify::EventKind::Remove(RemoveKind::Folder), Some(FileEventKind::UnlinkDir)),
            (
                notify::EventKind::Modify(ModifyKind::Data(DataChange::Content)),
                Some(FileEventKind::Change),
            ),
            (
                notify::EventKind::Modify(ModifyKind::Name(RenameMode::Any)),
                Some(FileEventKind::RenameFrom),
            ),
            (notify::EventKind::Access(AccessKind::Any), None),
        ];

        for (raw, expected) in cases {
            assert_eq!(FileEventKind::classify(raw, path), expected, "{raw:?}");
        }
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(FileEventKind::RenameTo.to_string(), "rename-to");
        assert_eq!(FileEventKind::AddDir.to_string(), "add-dir");
    }
}
