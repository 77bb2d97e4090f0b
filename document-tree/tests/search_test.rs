//! Search over the fixture notes, with disk reads observed.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use notes_document_tree::search::{FILENAME_LINE, WEIGHT_EXACT, WEIGHT_FILENAME};
use notes_document_tree::{
    DirEntry, FileSystem, Stat, StdFileSystem, TrashDir, Workspace, WorkspaceConfig, parse_query,
};
use pretty_assertions::assert_eq;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/notes")
}

/// Records every path whose content is read.
#[derive(Default)]
struct CountingFs {
    inner: StdFileSystem,
    reads: Mutex<Vec<PathBuf>>,
}

impl CountingFs {
    fn reads(&self) -> Vec<PathBuf> {
        self.reads.lock().unwrap().clone()
    }

    fn reset(&self) {
        self.reads.lock().unwrap().clear();
    }
}

impl FileSystem for CountingFs {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.reads.lock().unwrap().push(path.to_path_buf());
        self.inner.read(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        self.inner.write(path, contents)
    }

    fn stat(&self, path: &Path) -> io::Result<Option<Stat>> {
        self.inner.stat(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.inner.rename(from, to)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        self.inner.read_dir(path)
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        self.inner.create_dir(path)
    }
}

fn open_counting() -> (Workspace, Arc<CountingFs>) {
    let root = fixtures_dir();
    let fs = Arc::new(CountingFs::default());
    let trash = Arc::new(TrashDir::new(root.join(".trash")));
    let workspace =
        Workspace::with_collaborators(WorkspaceConfig::new(&root), fs.clone(), trash).unwrap();
    fs.reset();
    (workspace, fs)
}

#[test]
fn test_filename_match_skips_content_read() {
    let (workspace, fs) = open_counting();
    let ownership = fixtures_dir().join("rust-ownership.md");

    let results = workspace.search(&parse_query("rust OWNERSHIP"));

    let hit = results.iter().find(|r| r.path == ownership).unwrap();
    assert_eq!(hit.matches.len(), 1);
    assert_eq!(hit.matches[0].from.line, FILENAME_LINE);
    assert_eq!(hit.matches[0].weight, WEIGHT_FILENAME);
    assert_eq!(hit.matches[0].restext, "rust-ownership.md");
    assert!(!fs.reads().contains(&ownership));
}

#[test]
fn test_content_search_across_directories() {
    let (workspace, fs) = open_counting();

    let results = workspace.search(&parse_query("basil|oregano Pasta"));

    let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["pasta.md"]);

    let matches = &results[0].matches;
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].term, Some(0));
    assert_eq!(matches[0].word, "basil");
    assert_eq!(matches[0].from.line, 2);
    assert_eq!(matches[1].term, Some(1));
    assert_eq!(matches[1].from.line, 1);
    assert_eq!(matches[1].weight, WEIGHT_EXACT);
    assert_eq!(results[0].score(), 2.0);

    // Every loaded file was read once; nothing outside the tree was touched.
    assert_eq!(fs.reads().len(), 4);
}

#[test]
fn test_case_insensitive_hits_are_weighted_lower() {
    let (workspace, _) = open_counting();

    let results = workspace.search(&parse_query("rust"));
    let journal = results
        .iter()
        .find(|r| r.name == "journal.markdown")
        .unwrap();

    // "Rust traits" and "#Rust" only match case-insensitively.
    assert_eq!(journal.matches.len(), 2);
    assert!(journal.matches.iter().all(|m| m.weight == 0.5));
}

#[test]
fn test_empty_query_finds_nothing() {
    let (workspace, fs) = open_counting();
    assert!(workspace.search(&parse_query("   ")).is_empty());
    assert!(fs.reads().is_empty());
}
