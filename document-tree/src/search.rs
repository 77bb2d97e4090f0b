//! Weighted AND/OR search over file names and content.
//!
//! A file whose name satisfies every term gets one synthetic match and its
//! content is never read. Otherwise each line is checked against each term:
//! an exact (case-sensitive) hit weighs [`WEIGHT_EXACT`], a hit that only shows
//! up case-insensitively weighs [`WEIGHT_APPROXIMATE`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fs::FileSystem;
use crate::node::{FileNode, NodeId};
use crate::tree::DocumentTree;

/// Weight of a file name that satisfies the whole query.
pub const WEIGHT_FILENAME: f32 = 2.0;

/// Weight of a case-sensitive content hit.
pub const WEIGHT_EXACT: f32 = 1.0;

/// Weight of a content hit found only case-insensitively.
pub const WEIGHT_APPROXIMATE: f32 = 0.5;

/// Line number used for file name matches.
pub const FILENAME_LINE: i64 = -1;

/// One term of a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operator", content = "word", rename_all = "snake_case")]
pub enum SearchTerm {
    /// The word must occur.
    And(String),
    /// One of the words must occur; the first one found wins.
    Or(Vec<String>),
}

impl SearchTerm {
    pub fn and(word: impl Into<String>) -> Self {
        Self::And(word.into())
    }

    pub fn or<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Or(words.into_iter().map(Into::into).collect())
    }

    /// The words this term looks for, in priority order.
    pub fn words(&self) -> &[String] {
        match self {
            Self::And(word) => std::slice::from_ref(word),
            Self::Or(words) => words,
        }
    }

    fn matches_name(&self, lower_name: &str) -> bool {
        self.words()
            .iter()
            .any(|word| lower_name.contains(&word.to_lowercase()))
    }
}

/// Split a query string into terms.
///
/// Bare words become AND terms, `a|b|c` becomes an OR term, and double quotes
/// keep a phrase (spaces and pipes included) together as one word.
pub fn parse_query(query: &str) -> Vec<SearchTerm> {
    let mut terms = Vec::new();
    let mut alternatives: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in query.chars() {
        match c {
            '"' => quoted = !quoted,
            '|' if !quoted => finish_word(&mut current, &mut alternatives),
            c if c.is_whitespace() && !quoted => {
                finish_word(&mut current, &mut alternatives);
                finish_term(&mut alternatives, &mut terms);
            }
            c => current.push(c),
        }
    }
    finish_word(&mut current, &mut alternatives);
    finish_term(&mut alternatives, &mut terms);
    terms
}

fn finish_word(current: &mut String, alternatives: &mut Vec<String>) {
    if !current.is_empty() {
        alternatives.push(std::mem::take(current));
    }
}

fn finish_term(alternatives: &mut Vec<String>, terms: &mut Vec<SearchTerm>) {
    match alternatives.len() {
        0 => {}
        1 => terms.push(SearchTerm::And(alternatives.remove(0))),
        _ => terms.push(SearchTerm::Or(std::mem::take(alternatives))),
    }
}

/// A line and character column. Lines are 0-based; file name matches use -1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: i64,
    pub column: usize,
}

/// One match inside a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    /// Index of the query term; `None` for a file name match, which covers all of them.
    pub term: Option<usize>,

    /// The word that was found.
    pub word: String,

    pub from: Position,

    pub to: Position,

    /// The matched line, or the file name.
    pub restext: String,

    pub weight: f32,
}

/// All matches found in one file, in discovery order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMatches {
    pub id: NodeId,
    pub hash: i32,
    pub path: PathBuf,
    pub name: String,
    pub matches: Vec<Match>,
}

impl FileMatches {
    /// Sum of match weights.
    pub fn score(&self) -> f32 {
        self.matches.iter().map(|m| m.weight).sum()
    }
}

/// Search every file in the tree.
///
/// Files are visited in display order and only included when every term
/// matched. Ranking across files is left to the caller.
pub fn search(tree: &DocumentTree, fs: &dyn FileSystem, terms: &[SearchTerm]) -> Vec<FileMatches> {
    if terms.is_empty() {
        return Vec::new();
    }

    tree.files_under(tree.root_id())
        .into_iter()
        .filter_map(|id| tree.file(id).ok())
        .filter_map(|file| {
            let matches = match_file(file, fs, terms)?;
            Some(FileMatches {
                id: file.header.id,
                hash: file.header.hash,
                path: file.header.path.clone(),
                name: file.header.name.clone(),
                matches,
            })
        })
        .collect()
}

/// Matches for one file, or `None` when some term is not satisfied.
pub fn match_file(file: &FileNode, fs: &dyn FileSystem, terms: &[SearchTerm]) -> Option<Vec<Match>> {
    let name = &file.header.name;
    let lower_name = name.to_lowercase();
    if terms.iter().all(|term| term.matches_name(&lower_name)) {
        return Some(vec![Match {
            term: None,
            word: name.clone(),
            from: Position {
                line: FILENAME_LINE,
                column: 0,
            },
            to: Position {
                line: FILENAME_LINE,
                column: name.chars().count(),
            },
            restext: name.clone(),
            weight: WEIGHT_FILENAME,
        }]);
    }

    let bytes = match fs.read(&file.header.path) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("Skipping {} in search: {e}", file.header.path.display());
            return None;
        }
    };
    let text = String::from_utf8_lossy(&bytes);
    let lines: Vec<&str> = text.lines().collect();
    let lower: Vec<String> = lines.iter().map(|line| line.to_lowercase()).collect();

    let mut matches = Vec::new();
    for (index, term) in terms.iter().enumerate() {
        let before = matches.len();
        match term {
            SearchTerm::And(word) => {
                for (n, line) in lines.iter().enumerate() {
                    if let Some(m) = match_line(index, word, n, line, &lower[n]) {
                        matches.push(m);
                    }
                }
            }
            SearchTerm::Or(words) => {
                'alternatives: for word in words {
                    for (n, line) in lines.iter().enumerate() {
                        if let Some(mut m) = match_line(index, word, n, line, &lower[n]) {
                            m.weight = WEIGHT_EXACT;
                            matches.push(m);
                            break 'alternatives;
                        }
                    }
                }
            }
        }
        if matches.len() == before {
            return None;
        }
    }
    Some(matches)
}

fn match_line(term: usize, word: &str, n: usize, line: &str, lower_line: &str) -> Option<Match> {
    if word.is_empty() {
        return None;
    }

    let (from, to, weight) = if let Some(offset) = line.find(word) {
        let from = line[..offset].chars().count();
        (from, from + word.chars().count(), WEIGHT_EXACT)
    } else {
        let lower_word = word.to_lowercase();
        let offset = lower_line.find(&lower_word)?;
        let (from, to) = original_span(line, offset, offset + lower_word.len());
        (from, to, WEIGHT_APPROXIMATE)
    };

    let line_number = n as i64;
    Some(Match {
        term: Some(term),
        word: word.to_string(),
        from: Position {
            line: line_number,
            column: from,
        },
        to: Position {
            line: line_number,
            column: to,
        },
        restext: line.to_string(),
        weight,
    })
}

/// Character columns in `line` covering the byte range `start..end` of its
/// lowercase form. Lowercasing may change the character count, so the range is
/// walked char by char rather than counted in the shadow.
fn original_span(line: &str, start: usize, end: usize) -> (usize, usize) {
    let mut lower_pos = 0;
    let mut from = None;
    for (column, c) in line.chars().enumerate() {
        let next = lower_pos + c.to_lowercase().map(char::len_utf8).sum::<usize>();
        if from.is_none() && next > start {
            from = Some(column);
        }
        if next >= end {
            return (from.unwrap_or(column), column + 1);
        }
        lower_pos = next;
    }
    let count = line.chars().count();
    (from.unwrap_or(count), count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::StdFileSystem;
    use crate::node::NodeId;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn file_with(temp_dir: &TempDir, name: &str, content: &str) -> FileNode {
        let path = temp_dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        FileNode::new(NodeId(1), path, NodeId(0))
    }

    #[test]
    fn test_parse_query() {
        assert_eq!(
            parse_query(r#"alpha beta|gamma "two words" "x|y"|z"#),
            vec![
                SearchTerm::and("alpha"),
                SearchTerm::or(["beta", "gamma"]),
                SearchTerm::and("two words"),
                SearchTerm::or(["x|y", "z"]),
            ]
        );
        assert_eq!(parse_query("  a||  "), vec![SearchTerm::and("a")]);
        assert!(parse_query("   ").is_empty());
    }

    #[test]
    fn test_filename_match_wins() {
        let temp_dir = TempDir::new().unwrap();
        let file = file_with(&temp_dir, "Rust Notes.md", "nothing relevant");
        let fs = StdFileSystem::default();

        let matches = match_file(&file, &fs, &[SearchTerm::and("rust"), SearchTerm::and("notes")])
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].from.line, FILENAME_LINE);
        assert_eq!(matches[0].weight, WEIGHT_FILENAME);
        assert_eq!(matches[0].restext, "Rust Notes.md");
    }

    #[test]
    fn test_exact_and_approximate_weights() {
        let temp_dir = TempDir::new().unwrap();
        let file = file_with(&temp_dir, "a.md", "Needle here\nno match\nthe NEEDLE again");
        let fs = StdFileSystem::default();

        let matches = match_file(&file, &fs, &[SearchTerm::and("Needle")]).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].from, Position { line: 0, column: 0 });
        assert_eq!(matches[0].to, Position { line: 0, column: 6 });
        assert_eq!(matches[0].weight, WEIGHT_EXACT);
        assert_eq!(matches[1].from, Position { line: 2, column: 4 });
        assert_eq!(matches[1].weight, WEIGHT_APPROXIMATE);
        assert_eq!(matches[1].restext, "the NEEDLE again");
    }

    #[test]
    fn test_or_stops_at_first_alternative() {
        let temp_dir = TempDir::new().unwrap();
        let file = file_with(&temp_dir, "a.md", "first CAT\nthen dog\ncat again");
        let fs = StdFileSystem::default();

        let matches = match_file(&file, &fs, &[SearchTerm::or(["cat", "dog"])]).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].word, "cat");
        assert_eq!(matches[0].from.line, 0);
        assert_eq!(matches[0].weight, WEIGHT_EXACT);
    }

    #[test]
    fn test_unsatisfied_term_excludes_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = file_with(&temp_dir, "a.md", "alpha only");
        let fs = StdFileSystem::default();

        assert!(match_file(&file, &fs, &[SearchTerm::and("alpha"), SearchTerm::and("beta")]).is_none());
    }

    #[test]
    fn test_filename_pass_ignores_case() {
        let temp_dir = TempDir::new().unwrap();
        let file = file_with(&temp_dir, "Meeting.md", "");
        let fs = StdFileSystem::default();

        let matches = match_file(&file, &fs, &[SearchTerm::and("MEETING")]).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].term, None);
        assert_eq!(matches[0].weight, WEIGHT_FILENAME);
    }

    #[test]
    fn test_approximate_columns_follow_original_line() {
        let temp_dir = TempDir::new().unwrap();
        // "İ" lowercases to two characters.
        let file = file_with(&temp_dir, "a.md", "İstanbul İzmir");
        let fs = StdFileSystem::default();

        let matches = match_file(&file, &fs, &[SearchTerm::and("ZMIR")]).unwrap();
        assert_eq!(matches[0].weight, WEIGHT_APPROXIMATE);
        assert_eq!(matches[0].from, Position { line: 0, column: 10 });
        assert_eq!(matches[0].to, Position { line: 0, column: 14 });
    }

    #[test]
    fn test_columns_count_characters() {
        let temp_dir = TempDir::new().unwrap();
        let file = file_with(&temp_dir, "a.md", "héllo wörld");
        let fs = StdFileSystem::default();

        let matches = match_file(&file, &fs, &[SearchTerm::and("wörld")]).unwrap();
        assert_eq!(matches[0].from.column, 6);
        assert_eq!(matches[0].to.column, 11);
    }
}
