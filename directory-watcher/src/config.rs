//! Configuration types for directory watching.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WatcherError};

/// Configuration for a watched document directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Path to the directory.
    pub path: PathBuf,

    /// Regular expressions matched against directory basenames.
    pub ignore_patterns: Vec<String>,

    /// Allowed file extensions, without the leading dot.
    pub extensions: Vec<String>,

    /// Whether to follow symbolic links.
    pub follow_symlinks: bool,

    /// Whether subdirectories are watched too.
    pub recursive: bool,
}

impl DirectoryConfig {
    /// Create a new directory config.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ignore_patterns: Self::default_ignores(),
            extensions: Self::default_extensions(),
            follow_symlinks: false,
            recursive: true,
        }
    }

    /// Add an ignore pattern.
    pub fn ignore(mut self, pattern: impl Into<String>) -> Self {
        self.ignore_patterns.push(pattern.into());
        self
    }

    /// Allow an additional file extension.
    pub fn allow_extension(mut self, extension: impl Into<String>) -> Self {
        self.extensions.push(extension.into());
        self
    }

    /// Replace the extension allow-list.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Enable following symbolic links.
    pub fn follow_symlinks(mut self) -> Self {
        self.follow_symlinks = true;
        self
    }

    /// Only watch the top-level directory.
    pub fn non_recursive(mut self) -> Self {
        self.recursive = false;
        self
    }

    fn default_ignores() -> Vec<String> {
        vec![
            // Hidden directories (.git, .trash, editor state)
            r"^\.".to_string(),
            // Dependencies
            "^node_modules$".to_string(),
        ]
    }

    fn default_extensions() -> Vec<String> {
        vec!["md".to_string(), "markdown".to_string(), "txt".to_string()]
    }

    /// Compile the ignore configuration.
    pub fn rules(&self) -> Result<IgnoreRules> {
        IgnoreRules::new(&self.ignore_patterns, &self.extensions)
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self::new(PathBuf::new())
    }
}

/// Compiled ignore patterns and extension allow-list.
///
/// Both predicates look only at the path string; they never touch the disk.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    directories: Vec<Regex>,
    /// Lowercased, deduplicated, in configured order.
    extensions: Vec<String>,
}

impl IgnoreRules {
    /// Compile rules from raw patterns and extensions.
    pub fn new<P, E>(patterns: &[P], extensions: &[E]) -> Result<Self>
    where
        P: AsRef<str>,
        E: AsRef<str>,
    {
        let directories = patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern.as_ref())
                    .map_err(|e| WatcherError::InvalidPattern(format!("{}: {e}", pattern.as_ref())))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut allowed: Vec<String> = Vec::with_capacity(extensions.len());
        for ext in extensions {
            let ext = ext.as_ref().trim_start_matches('.').to_lowercase();
            if !ext.is_empty() && !allowed.contains(&ext) {
                allowed.push(ext);
            }
        }

        Ok(Self {
            directories,
            extensions: allowed,
        })
    }

    /// Whether a directory should be skipped, judged by its basename.
    pub fn should_ignore_directory(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
            return false;
        };
        self.directories.iter().any(|re| re.is_match(&name))
    }

    /// Whether a file should be skipped because its extension is not allowed.
    pub fn should_ignore_file(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => !self.allows_extension(ext),
            None => true,
        }
    }

    /// Whether any directory between `root` (exclusive) and `path` (exclusive) is ignored.
    pub fn has_ignored_ancestor(&self, root: &Path, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(root) else {
            return false;
        };
        let mut current = root.to_path_buf();
        let mut components = relative.components().peekable();
        while let Some(component) = components.next() {
            if components.peek().is_none() {
                break;
            }
            current.push(component);
            if self.should_ignore_directory(&current) {
                return true;
            }
        }
        false
    }

    /// The first configured extension, used for new files.
    pub fn default_extension(&self) -> Option<String> {
        self.extensions.first().cloned()
    }

    /// Whether an extension is on the allow-list.
    pub fn allows_extension(&self, extension: &str) -> bool {
        self.extensions.contains(&extension.to_lowercase())
    }
}
