//! Fuzzy title search over the catalog.
//!
//! A title matches when it contains the query (case-insensitively) or when
//! the Ratcliff/Obershelp similarity of the two reaches the threshold.
//! Matches are ranked by similarity, best first.

use crate::catalog::SongRecord;

pub const DEFAULT_LIMIT: usize = 5;
pub const DEFAULT_THRESHOLD: f64 = 0.4;

/// A ranked search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub record: SongRecord,
    pub score: f64,
}

/// Search parameters.
#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    pub limit: usize,
    pub threshold: f64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Rank `records` against `query` by title.
pub fn search(records: &[SongRecord], query: &str, options: SearchOptions) -> Vec<SearchHit> {
    let query: Vec<char> = query.trim().to_lowercase().chars().collect();
    if query.is_empty() || options.limit == 0 {
        return Vec::new();
    }

    let mut hits: Vec<SearchHit> = records
        .iter()
        .filter_map(|record| {
            let title: Vec<char> = record.title.to_lowercase().chars().collect();
            let score = similarity(&query, &title);
            let contains = title.windows(query.len()).any(|w| w == query.as_slice());
            (contains || score >= options.threshold).then(|| SearchHit {
                record: record.clone(),
                score,
            })
        })
        .collect();

    // Stable sort keeps catalog order among equal scores.
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(options.limit);
    hits
}

/// Similarity ratio in `0.0..=1.0`: `2 * matched / (len(a) + len(b))`.
pub fn similarity(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(a, b) as f64 / total as f64
}

/// Similarity of two strings, case-insensitive.
pub fn similarity_str(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    similarity(&a, &b)
}

/// Characters covered by recursively matching the longest common blocks.
fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (start_a, start_b, len) = longest_common_block(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_chars(&a[..start_a], &b[..start_b])
        + matching_chars(&a[start_a + len..], &b[start_b + len..])
}

/// Leftmost longest common substring as `(start_a, start_b, len)`.
fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for i in 1..=a.len() {
        for j in 1..=b.len() {
            curr[j] = if a[i - 1] == b[j - 1] { prev[j - 1] + 1 } else { 0 };
            if curr[j] > best.2 {
                best = (i - curr[j], j - curr[j], curr[j]);
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    best
}

/// Human-readable result list, one numbered label per line.
pub fn format_hits(hits: &[SearchHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| format!("{}. {}", i + 1, hit.record.label()))
        .collect::<Vec<_>>()
        .join("\n")
}
