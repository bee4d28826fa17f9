//! Bounded Levenshtein distance and the similarity score built on it.
//!
//! The same routine serves FUZZY matching (over characters) and TOKENIZED
//! matching (over token sequences), so it is generic over any `PartialEq`
//! element.

/// Slack for floating-point error when a score is compared to a threshold.
const SCORE_EPSILON: f64 = 1e-9;

/// Whether `score` clears `threshold`, allowing for rounding.
pub fn meets_threshold(score: f64, threshold: f64) -> bool {
    score + SCORE_EPSILON >= threshold
}

/// Edit distance between `a` and `b`, capped at `max_distance + 1`.
///
/// Returns the true distance whenever it is `<= max_distance`; otherwise the
/// result is exactly `max_distance + 1`. Rows are abandoned as soon as every
/// cell exceeds the bound.
pub fn bounded_distance<T: PartialEq>(a: &[T], b: &[T], max_distance: usize) -> usize {
    let over = max_distance.saturating_add(1);

    if a.len().abs_diff(b.len()) > max_distance {
        return over;
    }
    if a.is_empty() || b.is_empty() {
        return a.len().max(b.len()).min(over);
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, item_a) in a.iter().enumerate() {
        curr[0] = i + 1;
        let mut row_min = curr[0];

        for (j, item_b) in b.iter().enumerate() {
            let cost = usize::from(item_a != item_b);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
            row_min = row_min.min(curr[j + 1]);
        }

        if row_min > max_distance {
            return over;
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()].min(over)
}

/// Character-level [`bounded_distance`] for strings.
pub fn bounded_str_distance(a: &str, b: &str, max_distance: usize) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    bounded_distance(&a, &b, max_distance)
}

/// Similarity in `[0, 1]`, pruned by the acceptance threshold.
///
/// Identical inputs score 1.0. Otherwise the distance is computed with a bound
/// of `floor((1 - threshold) * max_len)`; any pair that exceeds the bound
/// scores 0.0, so callers only need to check the result with
/// [`meets_threshold`].
pub fn similarity<T: PartialEq>(a: &[T], b: &[T], threshold: f64) -> f64 {
    if a == b {
        return 1.0;
    }
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }

    let max_distance = ((1.0 - threshold).max(0.0) * max_len as f64 + SCORE_EPSILON).floor() as usize;
    let distance = bounded_distance(a, b, max_distance);
    if distance > max_distance {
        return 0.0;
    }
    1.0 - distance as f64 / max_len as f64
}

/// Character-level [`similarity`] for strings.
pub fn str_similarity(a: &str, b: &str, threshold: f64) -> f64 {
    if a == b {
        return 1.0;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    similarity(&a, &b, threshold)
}
