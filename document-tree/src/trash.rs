//! Reversible deletion.

use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::debug;

/// Moves entries somewhere they can be restored from.
pub trait Trash: Send + Sync {
    /// Move `path` to the trash, returning where it went.
    fn trash(&self, path: &Path) -> io::Result<PathBuf>;
}

/// Trash that moves entries into a staging directory.
///
/// Entries keep their basename; a timestamp suffix is added when the name is
/// already taken.
#[derive(Debug, Clone)]
pub struct TrashDir {
    dir: PathBuf,
}

impl TrashDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn destination(&self, path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "untitled".to_string());

        let candidate = self.dir.join(&name);
        if !candidate.exists() {
            return candidate;
        }

        let stamp = Utc::now().format("%Y%m%d%H%M%S%3f");
        let mut n = 0u32;
        loop {
            let suffixed = if n == 0 {
                self.dir.join(format!("{name}.{stamp}"))
            } else {
                self.dir.join(format!("{name}.{stamp}-{n}"))
            };
            if !suffixed.exists() {
                return suffixed;
            }
            n += 1;
        }
    }
}

impl Trash for TrashDir {
    fn trash(&self, path: &Path) -> io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let destination = self.destination(path);
        std::fs::rename(path, &destination)?;
        debug!("Trashed {} -> {}", path.display(), destination.display());
        Ok(destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_trash_moves_and_avoids_collisions() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let trash = TrashDir::new(root.join(".trash"));

        std::fs::write(root.join("a.md"), "one").unwrap();
        let first = trash.trash(&root.join("a.md")).unwrap();
        assert_eq!(first, root.join(".trash/a.md"));
        assert!(!root.join("a.md").exists());

        std::fs::write(root.join("a.md"), "two").unwrap();
        let second = trash.trash(&root.join("a.md")).unwrap();
        assert_ne!(first, second);
        assert_eq!(std::fs::read_to_string(second).unwrap(), "two");
    }

    #[test]
    fn test_trash_missing_path_fails() {
        let temp_dir = TempDir::new().unwrap();
        let trash = TrashDir::new(temp_dir.path().join(".trash"));
        assert!(trash.trash(&temp_dir.path().join("nope.md")).is_err());
    }
}
