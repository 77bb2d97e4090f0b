//! Filesystem access used by the tree.
//!
//! Everything the tree reads or writes goes through [`FileSystem`] so tests and
//! embedders can observe or replace disk access.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

/// Whether a path is a file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// Metadata the tree cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub kind: EntryKind,
    pub modified: DateTime<Utc>,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
}

/// Disk operations the tree depends on.
pub trait FileSystem: Send + Sync {
    /// Read a whole file.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Replace a file's content, creating it if needed.
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Stat a path; `Ok(None)` when nothing exists there.
    fn stat(&self, path: &Path) -> io::Result<Option<Stat>>;

    /// Rename or move a file or directory.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// List the immediate children of a directory.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;

    /// Create a directory (and missing parents).
    fn create_dir(&self, path: &Path) -> io::Result<()>;
}

/// [`FileSystem`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileSystem {
    follow_symlinks: bool,
}

impl StdFileSystem {
    pub fn new(follow_symlinks: bool) -> Self {
        Self { follow_symlinks }
    }
}

impl FileSystem for StdFileSystem {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        std::fs::write(path, contents)
    }

    fn stat(&self, path: &Path) -> io::Result<Option<Stat>> {
        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        let kind = if metadata.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        let modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        Ok(Some(Stat { kind, modified }))
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let walker = WalkDir::new(path)
            .min_depth(1)
            .max_depth(1)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name();

        let mut entries = Vec::new();
        for entry in walker {
            let entry = entry.map_err(io::Error::from)?;
            let file_type = entry.file_type();
            let kind = if file_type.is_dir() {
                EntryKind::Directory
            } else if file_type.is_file() {
                EntryKind::File
            } else {
                // Dangling or unfollowed symlinks.
                continue;
            };
            entries.push(DirEntry {
                path: entry.into_path(),
                kind,
            });
        }
        Ok(entries)
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }
}
