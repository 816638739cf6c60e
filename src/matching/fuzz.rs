//! Fuzzy similarity scores on a 0..=100 scale.
//!
//! `ratio` is the normalized indel similarity `2 * LCS / (|a| + |b|)` over
//! chars, with the LCS computed by `rapidfuzz`. `partial_ratio` scores the
//! shorter string against the best-aligned window of the longer one, with
//! windows anchored on common substrings.

use rapidfuzz::distance::lcs_seq;

/// One side of many comparisons, preprocessed once.
pub struct LcsPattern {
    len: usize,
    comparator: lcs_seq::BatchComparator<char>,
}

impl LcsPattern {
    pub fn new(pattern: &str) -> Self {
        Self {
            len: pattern.chars().count(),
            comparator: lcs_seq::BatchComparator::new(pattern.chars()),
        }
    }

    fn from_chars(chars: &[char]) -> Self {
        Self {
            len: chars.len(),
            comparator: lcs_seq::BatchComparator::new(chars.iter().copied()),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Length of the longest common subsequence with `text`.
    pub fn lcs(&self, text: &[char]) -> usize {
        self.comparator.similarity(text.iter().copied())
    }

    /// `ratio` between the pattern and `text`.
    pub fn ratio(&self, text: &[char]) -> u32 {
        score(self.lcs(text), self.len + text.len())
    }
}

fn score(lcs: usize, total: usize) -> u32 {
    if total == 0 {
        return 100;
    }
    ((200 * lcs) as f64 / total as f64).round() as u32
}

/// Similarity of two whole strings.
pub fn ratio(a: &str, b: &str) -> u32 {
    let lcs = lcs_seq::similarity(a.chars(), b.chars());
    score(lcs, a.chars().count() + b.chars().count())
}

/// Similarity of the shorter string to its best window in the longer one.
///
/// Tolerates extra leading and trailing text on the longer side.
pub fn partial_ratio(a: &str, b: &str) -> u32 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (short, long) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };

    if short.is_empty() {
        return if long.is_empty() { 100 } else { 0 };
    }

    let pattern = LcsPattern::from_chars(short);
    let mut best = 0;
    for (i, j, _) in matching_blocks(short, long) {
        let start = j.saturating_sub(i);
        let end = (start + short.len()).min(long.len());
        let lcs = pattern.lcs(&long[start..end]);
        // Exact containment short-circuits
        if lcs == short.len() && end - start == short.len() {
            return 100;
        }
        best = best.max(score(lcs, short.len() + end - start));
    }
    best
}

/// Non-overlapping common substrings `(i, j, len)` in increasing order,
/// found by repeatedly taking the longest match and recursing on both sides.
fn matching_blocks(a: &[char], b: &[char]) -> Vec<(usize, usize, usize)> {
    let mut blocks = Vec::new();
    let mut pending = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, k) = longest_match(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        blocks.push((i, j, k));
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            pending.push((i + k, ahi, j + k, bhi));
        }
    }
    blocks.sort_unstable();
    blocks
}

/// Longest common substring of `a[alo..ahi]` and `b[blo..bhi]`; the
/// earliest one in `a`, then in `b`, on ties.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let width = bhi - blo;
    let mut prev = vec![0usize; width + 1];
    let mut cur = vec![0usize; width + 1];
    let (mut best_i, mut best_j, mut best_k) = (alo, blo, 0);

    for i in alo..ahi {
        for j in blo..bhi {
            let col = j - blo + 1;
            if a[i] == b[j] {
                let k = prev[col - 1] + 1;
                cur[col] = k;
                if k > best_k {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_k = k;
                }
            } else {
                cur[col] = 0;
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    (best_i, best_j, best_k)
}
