//! Recent-query history.
//!
//! Bounded, deduplicated, most-recent-first. Pushing an existing query
//! moves it to the front instead of duplicating it.

use serde::{Deserialize, Serialize};

/// Maximum number of remembered queries.
pub const HISTORY_CAPACITY: usize = 15;

/// The query history log. Serializes as a plain JSON array, the shape the
/// original storage key held.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryLog {
    entries: Vec<String>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a query. Empty and whitespace-only queries are ignored; an
    /// existing entry moves to the front; the log truncates to
    /// [`HISTORY_CAPACITY`].
    pub fn push(&mut self, query: &str) {
        let query = query.trim();
        if query.is_empty() {
            return;
        }
        self.entries.retain(|entry| entry != query);
        self.entries.insert(0, query.to_string());
        self.entries.truncate(HISTORY_CAPACITY);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Past queries, most recent first.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
