//! Content scanning: preview snippet, tags and document identifier.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

/// Number of characters kept in a snippet.
pub const SNIPPET_CHARS: usize = 50;

/// Appended to snippets that were cut short.
pub const ELLIPSIS: char = '…';

const ID_MARKER: &str = "@ID:";

static TAG_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"#[\w-]+#*").ok());

/// What a scan extracts from a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    /// First characters of the content.
    pub snippet: String,

    /// Lowercased, deduplicated tags.
    pub tags: BTreeSet<String>,

    /// First qualifying `@ID:` value.
    pub document_id: Option<String>,
}

impl ScanResult {
    /// Result for content that could not be decoded: a snippet and nothing else.
    pub fn fallback(text: &str) -> Self {
        Self {
            snippet: snippet(text),
            ..Self::default()
        }
    }
}

/// Scan document text.
pub fn scan(text: &str) -> ScanResult {
    ScanResult {
        snippet: snippet(text),
        tags: extract_tags(text),
        document_id: extract_document_id(text),
    }
}

/// The first [`SNIPPET_CHARS`] characters, ellipsized when truncated.
pub fn snippet(text: &str) -> String {
    match text.char_indices().nth(SNIPPET_CHARS) {
        Some((cut, _)) => {
            let mut s = text[..cut].to_string();
            s.push(ELLIPSIS);
            s
        }
        None => text.to_string(),
    }
}

/// Collect `#tag` markers.
///
/// Trailing `#` runs are stripped so heading markers never become tags.
pub fn extract_tags(text: &str) -> BTreeSet<String> {
    let Some(pattern) = TAG_PATTERN.as_ref() else {
        return BTreeSet::new();
    };

    pattern
        .find_iter(text)
        .map(|m| m.as_str()[1..].trim_end_matches('#').to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// Find the first `@ID:` value that is not a `[[...]]` link.
///
/// Candidates preceded by `[[` or whose value ends in `]]` are skipped.
pub fn extract_document_id(text: &str) -> Option<String> {
    let mut cursor = 0;

    while let Some(offset) = text[cursor..].find(ID_MARKER) {
        let start = cursor + offset;
        cursor = start + ID_MARKER.len();

        if text[..start].ends_with("[[") {
            continue;
        }

        let value = text[cursor..]
            .split(char::is_whitespace)
            .next()
            .unwrap_or_default();
        if value.is_empty() || value.ends_with("]]") {
            continue;
        }

        return Some(value.to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_tags_skip_headings_and_dedup() {
        let tags = extract_tags("# Heading\n#tag1 #tag2 #tag2");
        assert_eq!(tags, set(&["tag1", "tag2"]));
    }

    #[test]
    fn test_tags_lowercase_and_trailing_hashes() {
        let tags = extract_tags("## Notes ###\n#Rust-Lang #work_item## #ToDo");
        assert_eq!(tags, set(&["rust-lang", "todo", "work_item"]));
    }

    #[test]
    fn test_id_skips_links() {
        let id = extract_document_id("text [[@ID:ignored]] more @ID:real123 end");
        assert_eq!(id, Some("real123".to_string()));
    }

    #[test]
    fn test_id_skips_values_ending_in_brackets() {
        let id = extract_document_id("see @ID:other]] and @ID:mine");
        assert_eq!(id, Some("mine".to_string()));
    }

    #[test]
    fn test_id_first_occurrence_wins() {
        let id = extract_document_id("@ID:first\n@ID:second");
        assert_eq!(id, Some("first".to_string()));
    }

    #[test]
    fn test_id_absent() {
        assert_eq!(extract_document_id("no marker here"), None);
        assert_eq!(extract_document_id("@ID: spaced"), None);
        assert_eq!(extract_document_id("[[@ID:only-link]]"), None);
    }

    #[test]
    fn test_snippet() {
        assert_eq!(snippet("short"), "short");

        let exact = "x".repeat(SNIPPET_CHARS);
        assert_eq!(snippet(&exact), exact);

        let long = "é".repeat(SNIPPET_CHARS + 5);
        let cut = snippet(&long);
        assert_eq!(cut.chars().count(), SNIPPET_CHARS + 1);
        assert!(cut.ends_with(ELLIPSIS));
    }

    #[test]
    fn test_fallback_has_no_tags() {
        let result = ScanResult::fallback("#tag @ID:x");
        assert_eq!(result.snippet, "#tag @ID:x");
        assert!(result.tags.is_empty());
        assert_eq!(result.document_id, None);
    }
}
