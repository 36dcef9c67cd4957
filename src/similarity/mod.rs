//! Text normalization and fuzzy similarity matching.
//!
//! Node deduplication and explored-response bookkeeping both hinge on fuzzy
//! string comparison, so the matcher is an injectable strategy: production
//! code uses [`SequenceMatcher`] (Ratcliff/Obershelp ratio over normalized
//! text), tests can substitute [`ExactMatcher`] for determinism. Thresholds
//! are always supplied by the caller; node-level merging typically uses a
//! higher bar than response-level deduplication.

/// Normalize text for comparison: strip punctuation, collapse whitespace,
/// lower-case.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strategy for deciding whether two strings are semantically equivalent.
pub trait SimilarityMatcher: Send + Sync {
    /// Similarity ratio between two raw strings, in `[0, 1]`.
    ///
    /// Implementations normalize internally; callers pass raw text.
    fn ratio(&self, a: &str, b: &str) -> f64;

    /// True iff `ratio(a, b) >= threshold`.
    fn is_similar(&self, a: &str, b: &str, threshold: f64) -> bool {
        self.ratio(a, b) >= threshold
    }

    /// Linearly scan `existing` and return the first entry similar to
    /// `candidate` above `threshold`, if any.
    ///
    /// No ordering guarantee is part of the contract: when several entries
    /// exceed the threshold, which one is returned is unspecified.
    fn find_similar<'a>(
        &self,
        candidate: &str,
        existing: &'a [String],
        threshold: f64,
    ) -> Option<&'a str> {
        existing
            .iter()
            .find(|e| self.is_similar(candidate, e, threshold))
            .map(|s| s.as_str())
    }
}

/// Ratcliff/Obershelp sequence matching over normalized text.
///
/// Ratio is `2 * M / T` where `M` is the total length of matching blocks and
/// `T` the combined length of both strings, matching the classic
/// sequence-matcher definition.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceMatcher;

impl SimilarityMatcher for SequenceMatcher {
    fn ratio(&self, a: &str, b: &str) -> f64 {
        let a: Vec<char> = normalize(a).chars().collect();
        let b: Vec<char> = normalize(b).chars().collect();
        let total = a.len() + b.len();
        if total == 0 {
            return 1.0;
        }
        let matches = matching_chars(&a, &b);
        2.0 * matches as f64 / total as f64
    }
}

/// Total length of matching blocks: find the longest common substring, then
/// recurse on the pieces to its left and right.
fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (i, j, len) = longest_common_block(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_chars(&a[..i], &b[..j]) + matching_chars(&a[i + len..], &b[j + len..])
}

fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    if a.is_empty() || b.is_empty() {
        return best;
    }
    // Rolling DP row: lengths[j] = length of common suffix ending at a[i], b[j]
    let mut prev = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        let mut current = vec![0usize; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            if ca == cb {
                let len = prev[j] + 1;
                current[j + 1] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            }
        }
        prev = current;
    }
    best
}

/// Deterministic matcher that only treats normalized-equal strings as
/// similar. Intended for tests that must not depend on fuzzy thresholds.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatcher;

impl SimilarityMatcher for ExactMatcher {
    fn ratio(&self, a: &str, b: &str) -> f64 {
        if normalize(a) == normalize(b) {
            1.0
        } else {
            0.0
        }
    }
}
