//! Record ranking.
//!
//! Combines per-field match scores (title vs. URL) under a configurable
//! title weight, filters non-matches, and produces a deterministic total
//! order. Also hosts the raw-pattern (`/pattern/flags`) filter mode, which
//! bypasses the fuzzy engine entirely.

use rayon::prelude::*;
use regex::{Regex, RegexBuilder};

use crate::models::FlatRecord;
use crate::search::{MatchResult, MatchStrategy};

/// Title weight slider range.
pub const MIN_TITLE_WEIGHT: u8 = 1;
pub const MAX_TITLE_WEIGHT: u8 = 5;
/// Title weight and its URL complement always sum to this, keeping the
/// total score scale fixed across slider positions.
pub const WEIGHT_SCALE: u8 = 6;

pub fn clamp_title_weight(weight: u8) -> u8 {
    weight.clamp(MIN_TITLE_WEIGHT, MAX_TITLE_WEIGHT)
}

/// A record scored against a query.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedRecord {
    pub record: FlatRecord,
    pub total_score: f64,
    pub title_match: MatchResult,
    pub url_match: MatchResult,
}

impl RankedRecord {
    /// Wrap a record selected without fuzzy scoring (pattern mode, empty
    /// query pass-through).
    pub fn unscored(record: FlatRecord) -> Self {
        Self {
            record,
            total_score: 0.0,
            title_match: MatchResult::default(),
            url_match: MatchResult::default(),
        }
    }
}

/// Rank `records` against `query`.
///
/// An empty (trimmed) query passes every record through in input order,
/// unscored and unfiltered. Otherwise both fields are scored with
/// `strategy`, combined as `title * w + url * (WEIGHT_SCALE - w)`,
/// non-matches dropped, and the survivors sorted by descending score with
/// input order breaking ties.
pub fn rank(
    records: &[FlatRecord],
    query: &str,
    strategy: MatchStrategy,
    title_weight: u8,
) -> Vec<RankedRecord> {
    if query.trim().is_empty() {
        return records
            .iter()
            .map(|record| RankedRecord::unscored(record.clone()))
            .collect();
    }

    let title_w = clamp_title_weight(title_weight) as f64;
    let url_w = WEIGHT_SCALE as f64 - title_w;

    // Per-record scoring is pure; fan out on the Rayon pool. The indexed
    // collect keeps input order so the tie-break below stays deterministic.
    let mut scored: Vec<(usize, RankedRecord)> = records
        .par_iter()
        .enumerate()
        .filter_map(|(index, record)| {
            let title_match = strategy.score(query, &record.title);
            let url_match = strategy.score(query, &record.url);
            let total_score = title_match.score * title_w + url_match.score * url_w;
            (total_score > 0.0).then(|| {
                (
                    index,
                    RankedRecord {
                        record: record.clone(),
                        total_score,
                        title_match,
                        url_match,
                    },
                )
            })
        })
        .collect();

    scored.sort_unstable_by(|a, b| {
        b.1.total_score
            .total_cmp(&a.1.total_score)
            .then_with(|| a.0.cmp(&b.0))
    });
    scored.into_iter().map(|(_, ranked)| ranked).collect()
}

/// Split a raw-pattern query of the form `/pattern/flags` into its parts.
/// Returns `None` when the query does not have that shape (including
/// unknown flag letters); such queries fall back to fuzzy ranking.
fn split_pattern(query: &str) -> Option<(&str, &str)> {
    let rest = query.strip_prefix('/')?;
    let (pattern, flags) = rest.rsplit_once('/')?;
    if pattern.is_empty() || !flags.chars().all(|f| "gimsuy".contains(f)) {
        return None;
    }
    Some((pattern, flags))
}

/// Whether `query` has the `/pattern/flags` shape of a raw-pattern search.
pub fn is_pattern_query(query: &str) -> bool {
    split_pattern(query).is_some()
}

/// Compile a raw-pattern query. `i`, `m`, `s` map to the regex options of
/// the same meaning; `g`, `u`, `y` describe host-side iteration and are
/// accepted but ignored. A pattern that does not compile yields `None`;
/// callers turn that into zero results, never an error.
pub fn parse_pattern_query(query: &str) -> Option<Regex> {
    let (pattern, flags) = split_pattern(query)?;
    let mut builder = RegexBuilder::new(pattern);
    for flag in flags.chars() {
        match flag {
            'i' => {
                builder.case_insensitive(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            's' => {
                builder.dot_matches_new_line(true);
            }
            _ => {}
        }
    }
    builder.build().ok()
}

/// Filter records whose title or URL matches `pattern`, preserving input
/// order. No scores, no highlight positions.
pub fn filter_pattern(records: &[FlatRecord], pattern: &Regex) -> Vec<FlatRecord> {
    records
        .iter()
        .filter(|r| pattern.is_match(&r.title) || pattern.is_match(&r.url))
        .cloned()
        .collect()
}
