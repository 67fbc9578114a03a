//! Core data models for findex.
//!
//! Plain serde types shared by the flattener, the ranking engine, and the
//! store. Persisted representations (field names, timestamp encoding) match
//! the layout the browser extension wrote to its key-value storage, so an
//! existing `findexData`/`findexMeta` blob deserializes unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A node of the externally-owned bookmark tree.
///
/// Covers both shapes the host hands us: leaves carry `url`, folders carry
/// `children`. A node with neither is malformed and the flattener skips it.
/// Unknown fields in host exports (`dateAdded` and friends) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookmarkNode {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<BookmarkNode>>,
}

impl BookmarkNode {
    /// A leaf bookmark.
    pub fn leaf(id: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: Some(url.into()),
            children: None,
        }
    }

    /// A folder with ordered children.
    pub fn folder(
        id: impl Into<String>,
        title: impl Into<String>,
        children: Vec<BookmarkNode>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: None,
            children: Some(children),
        }
    }
}

/// One searchable bookmark produced by flattening: the leaf plus the
/// materialized titles of its ancestor folders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatRecord {
    pub id: String,
    pub title: String,
    pub url: String,
    pub path: String,
}

/// Snapshot metadata, persisted alongside the record list under its own key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMeta {
    pub count: u64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub synced_at: DateTime<Utc>,
}

/// The current flattened view of the bookmark tree.
///
/// Replaced wholesale on every sync; never mutated in place. `meta.count`
/// always equals `records.len()`, enforced at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSnapshot {
    records: Vec<FlatRecord>,
    meta: SnapshotMeta,
}

impl IndexSnapshot {
    /// A fresh snapshot stamped with the current time.
    pub fn new(records: Vec<FlatRecord>) -> Self {
        let meta = SnapshotMeta {
            count: records.len() as u64,
            synced_at: Utc::now(),
        };
        Self { records, meta }
    }

    /// Reassemble a snapshot from persisted parts. A stale `count` is
    /// normalized to the record list length rather than rejected.
    pub fn from_parts(records: Vec<FlatRecord>, mut meta: SnapshotMeta) -> Self {
        meta.count = records.len() as u64;
        Self { records, meta }
    }

    /// Placeholder before the first sync: no records, epoch timestamp.
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            meta: SnapshotMeta {
                count: 0,
                synced_at: DateTime::UNIX_EPOCH,
            },
        }
    }

    pub fn records(&self) -> &[FlatRecord] {
        &self.records
    }

    pub fn meta(&self) -> &SnapshotMeta {
        &self.meta
    }

    pub fn count(&self) -> u64 {
        self.meta.count
    }

    pub fn synced_at(&self) -> DateTime<Utc> {
        self.meta.synced_at
    }
}

/// Default title weight: balanced between title and URL.
pub const DEFAULT_TITLE_WEIGHT: u8 = 3;

/// User configuration persisted under `findexSettings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Whether tree mutations trigger automatic re-syncs.
    pub realtime: bool,
    /// Title weight 1..=5; the URL weight is the complement to 6.
    pub title_weight: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            realtime: false,
            title_weight: DEFAULT_TITLE_WEIGHT,
        }
    }
}
