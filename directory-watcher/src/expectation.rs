//! Suppression of watcher echoes caused by our own writes.
//!
//! Before the tree renames, saves or deletes something on disk it registers the
//! event it expects the watcher to report. The first matching event consumes the
//! entry; entries nobody claims expire after the configured time-to-live.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::event::{FileEvent, FileEventKind};

/// Default lifetime of an expectation.
pub const DEFAULT_EXPECTATION_TTL: Duration = Duration::from_secs(2);

/// Short-lived table of `(kind, path)` events to ignore once.
#[derive(Debug, Clone)]
pub struct ExpectationTable {
    ttl: Duration,
    entries: HashMap<(FileEventKind, PathBuf), Vec<Instant>>,
}

impl ExpectationTable {
    /// Create a table whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Register an expected event.
    pub fn expect(&mut self, kind: FileEventKind, path: impl Into<PathBuf>) {
        self.expect_at(kind, path, Instant::now());
    }

    /// Register an expected event as of `now`.
    pub fn expect_at(&mut self, kind: FileEventKind, path: impl Into<PathBuf>, now: Instant) {
        let path = path.into();
        debug!("Expecting {kind} for {}", path.display());
        self.entries
            .entry((kind, path))
            .or_default()
            .push(now + self.ttl);
    }

    /// Consume the expectation matching `event`, if one is live.
    pub fn consume(&mut self, event: &FileEvent) -> bool {
        self.consume_at(event.kind, &event.path, Instant::now())
    }

    /// Consume a live expectation for `(kind, path)` as of `now`.
    ///
    /// Returns `true` when the event was expected and should be ignored.
    pub fn consume_at(&mut self, kind: FileEventKind, path: &Path, now: Instant) -> bool {
        self.purge(now);

        let key = (kind, path.to_path_buf());
        let Some(deadlines) = self.entries.get_mut(&key) else {
            return false;
        };

        // Oldest registration is claimed first.
        deadlines.remove(0);
        if deadlines.is_empty() {
            self.entries.remove(&key);
        }
        true
    }

    /// Drop every entry that expired at or before `now`.
    pub fn purge(&mut self, now: Instant) {
        self.entries.retain(|_, deadlines| {
            deadlines.retain(|deadline| *deadline > now);
            !deadlines.is_empty()
        });
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Whether no registrations are pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ExpectationTable {
    fn default() -> Self {
        Self::new(DEFAULT_EXPECTATION_TTL)
    }
}
