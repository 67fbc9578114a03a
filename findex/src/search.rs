//! Query/candidate match scoring.
//!
//! Two strategies share one contract: score how well a query matches a
//! candidate string and report the character positions that justify the
//! score. Both are case-insensitive and pure; they are recomputed per
//! keystroke per record per field, so nothing here touches I/O.
//!
//! `Subsequence` is the permissive strategy: the query must appear in order,
//! not necessarily contiguously. `TokenAware` splits the query on whitespace
//! and requires every token to match independently, rewarding word-aligned
//! and compact spans, a better fit for "word1 word2" style queries.

use std::collections::BTreeSet;

/// Base score contributed by every matched character.
const HIT_SCORE: f64 = 2.0;
/// Extra for a hit directly following the previous hit.
const RUN_BONUS: f64 = 1.0;
/// Extra for a token's first character landing on a word boundary.
const BOUNDARY_BONUS: f64 = 2.0;
/// Cap for the compact-span bonus in token matching.
const SPAN_BONUS_CAP: usize = 3;

/// How well a query matched one candidate string.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatchResult {
    /// Normalized score; zero means no match.
    pub score: f64,
    /// Character indices of the candidate consumed by the match, ascending
    /// and deduplicated.
    pub positions: Vec<usize>,
}

impl MatchResult {
    /// The all-pass result for an empty query.
    fn pass() -> Self {
        Self {
            score: 1.0,
            positions: Vec::new(),
        }
    }

    fn none() -> Self {
        Self::default()
    }

    /// Whether the candidate matched at all.
    pub fn matched(&self) -> bool {
        self.score > 0.0
    }
}

/// Matching strategy selector, supplied by the caller per search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchStrategy {
    #[default]
    Subsequence,
    TokenAware,
}

impl MatchStrategy {
    pub fn score(self, query: &str, text: &str) -> MatchResult {
        match self {
            MatchStrategy::Subsequence => subsequence_match(query, text),
            MatchStrategy::TokenAware => token_match(query, text),
        }
    }
}

/// Case-fold to one char per input char, preserving index alignment with
/// the original string. Multi-char lowercase expansions keep their first
/// char; position stability matters more than locale fidelity here.
fn fold_chars(s: &str) -> Vec<char> {
    s.chars()
        .map(|c| c.to_lowercase().next().unwrap_or(c))
        .collect()
}

/// Greedy in-order subsequence scan.
///
/// Every query character must be consumed, in order, by some later candidate
/// character. Hits score [`HIT_SCORE`], plus [`RUN_BONUS`] when contiguous
/// with the previous hit. The total is normalized by candidate length plus
/// query length so long candidates cannot win on volume alone.
pub fn subsequence_match(query: &str, text: &str) -> MatchResult {
    if query.is_empty() {
        return MatchResult::pass();
    }
    let q = fold_chars(query);
    let t = fold_chars(text);

    let mut positions = Vec::with_capacity(q.len());
    let mut score = 0.0;
    let mut qi = 0;
    for (i, &tc) in t.iter().enumerate() {
        if qi == q.len() {
            break;
        }
        if tc == q[qi] {
            score += HIT_SCORE;
            if matches!(positions.last(), Some(&prev) if prev + 1 == i) {
                score += RUN_BONUS;
            }
            positions.push(i);
            qi += 1;
        }
    }
    if qi < q.len() {
        return MatchResult::none();
    }
    MatchResult {
        score: score / (t.len() + q.len()) as f64,
        positions,
    }
}

/// Token-aware scoring: the query splits on whitespace and every token must
/// independently find a span in the candidate (AND across tokens), each
/// contributing its best-scoring span. Positions cover every winning span's
/// full character range.
pub fn token_match(query: &str, text: &str) -> MatchResult {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return MatchResult::pass();
    }
    let t = fold_chars(text);

    let mut marked = BTreeSet::new();
    let mut total = 0.0;
    let mut token_chars = 0usize;
    for token in trimmed.split_whitespace() {
        let tok = fold_chars(token);
        token_chars += tok.len();
        match best_span(&t, &tok) {
            Some(span) => {
                total += span.score;
                marked.extend(span.start..span.end);
            }
            // One missing token fails the whole match
            None => return MatchResult::none(),
        }
    }
    MatchResult {
        score: total / (t.len() + token_chars) as f64,
        positions: marked.into_iter().collect(),
    }
}

struct TokenSpan {
    start: usize,
    end: usize,
    score: f64,
}

/// Best-scoring span for one token over every candidate start position
/// where the token's first character occurs. Ties keep the earliest span.
fn best_span(t: &[char], tok: &[char]) -> Option<TokenSpan> {
    debug_assert!(!tok.is_empty());
    let mut best: Option<TokenSpan> = None;

    for start in 0..t.len() {
        if t[start] != tok[0] {
            continue;
        }
        let mut qi = 0usize;
        let mut score = 0.0;
        let mut k = start;
        let mut last_hit: Option<usize> = None;
        while k < t.len() && qi < tok.len() {
            if t[k] == tok[qi] {
                score += HIT_SCORE;
                if matches!(last_hit, Some(prev) if prev + 1 == k) {
                    score += RUN_BONUS;
                }
                if qi == 0 && (k == 0 || !t[k - 1].is_alphanumeric()) {
                    score += BOUNDARY_BONUS;
                }
                last_hit = Some(k);
                qi += 1;
            }
            k += 1;
        }
        if qi == tok.len() {
            let spread = (k - start) - tok.len();
            score += SPAN_BONUS_CAP.saturating_sub(spread.min(SPAN_BONUS_CAP)) as f64;
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(TokenSpan {
                    start,
                    end: k,
                    score,
                });
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Subsequence strategy ─────────────────────────────────────

    #[test]
    fn test_empty_query_matches_everything() {
        let m = subsequence_match("", "anything");
        assert_eq!(m.score, 1.0);
        assert!(m.positions.is_empty());
        assert!(m.matched());
    }

    #[test]
    fn test_subsequence_hit_positions() {
        let m = subsequence_match("gh", "GitHub");
        assert!(m.matched());
        assert_eq!(m.positions, vec![0, 3]);
    }

    #[test]
    fn test_subsequence_order_required() {
        let m = subsequence_match("hg", "GitHub");
        assert!(!m.matched());
        assert_eq!(m.score, 0.0);
        assert!(m.positions.is_empty());
    }

    #[test]
    fn test_subsequence_case_insensitive() {
        assert!(subsequence_match("GITHUB", "github").matched());
        assert!(subsequence_match("github", "GITHUB").matched());
    }

    #[test]
    fn test_subsequence_exact_single_char_score() {
        // One hit (2.0) normalized by len(text) + len(query) = 2
        let m = subsequence_match("a", "a");
        assert_eq!(m.score, 1.0);
        assert_eq!(m.positions, vec![0]);
    }

    #[test]
    fn test_subsequence_contiguous_run_bonus() {
        // "git" lands contiguously in "github"; "gtb" is scattered
        let contiguous = subsequence_match("git", "github");
        let scattered = subsequence_match("gtb", "github");
        assert!(contiguous.matched() && scattered.matched());
        assert!(contiguous.score > scattered.score);
    }

    #[test]
    fn test_subsequence_normalization_favors_shorter_text() {
        let short = subsequence_match("doc", "docs");
        let long = subsequence_match("doc", "documentation archive of everything");
        assert!(short.score > long.score);
    }

    #[test]
    fn test_subsequence_empty_text_fails_nonempty_query() {
        assert!(!subsequence_match("a", "").matched());
    }

    #[test]
    fn test_subsequence_unicode_positions() {
        let m = subsequence_match("café", "CAFÉ");
        assert!(m.matched());
        assert_eq!(m.positions, vec![0, 1, 2, 3]);
    }

    // ── Token-aware strategy ─────────────────────────────────────

    #[test]
    fn test_token_empty_query_matches_everything() {
        let m = token_match("   ", "anything");
        assert_eq!(m.score, 1.0);
        assert!(m.positions.is_empty());
    }

    #[test]
    fn test_token_and_semantics() {
        // Both tokens present: match
        assert!(token_match("foo baz", "foobar baz").matched());
        // "qux" nowhere in the text: the whole match fails even though
        // "foo" matches perfectly
        let m = token_match("foo qux", "foobar baz");
        assert!(!m.matched());
        assert!(m.positions.is_empty());
    }

    #[test]
    fn test_token_word_boundary_beats_embedded() {
        let aligned = token_match("hub", "git hub");
        let embedded = token_match("hub", "github");
        assert!(aligned.matched() && embedded.matched());
        assert!(aligned.score > embedded.score);
    }

    #[test]
    fn test_token_compact_span_beats_scattered() {
        let compact = token_match("ab", "ab");
        let scattered = token_match("ab", "axxb");
        assert!(compact.matched() && scattered.matched());
        assert!(compact.score > scattered.score);
    }

    #[test]
    fn test_token_positions_cover_winning_spans() {
        // "git" wins span 0..3, "hub" wins span 3..6
        let m = token_match("git hub", "github");
        assert_eq!(m.positions, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_token_positions_deduplicated() {
        // "git" spans 0..3 and "it" spans 1..3; the union has no duplicates
        let m = token_match("git it", "github");
        assert_eq!(m.positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_token_best_span_prefers_word_start() {
        // "note" occurs embedded in "keynote" and word-aligned later; the
        // boundary bonus should pick the aligned occurrence
        let m = token_match("note", "keynote note");
        assert!(m.matched());
        assert_eq!(m.positions, vec![8, 9, 10, 11]);
    }

    #[test]
    fn test_token_first_char_missing_fails() {
        assert!(!token_match("zzz", "github").matched());
    }

    #[test]
    fn test_token_case_insensitive() {
        assert!(token_match("GIT HUB", "github").matched());
    }

    // ── Strategy selector ────────────────────────────────────────

    #[test]
    fn test_strategy_dispatch() {
        // Scattered multi-token input: subsequence tolerates it as one
        // stream, token-aware requires each token separately
        let q = "gh doc";
        let t = "github pages documentation";
        let sub = MatchStrategy::Subsequence.score(q, t);
        let tok = MatchStrategy::TokenAware.score(q, t);
        assert!(sub.matched());
        assert!(tok.matched());
        assert_ne!(sub.positions, tok.positions);
    }
}
