use super::{line_count, line_windows, normalized, MatchResult};
use crate::patch::MatchOptions;
use crate::text::{line_spans, meets_threshold, normalize_for_matching, str_similarity};
use tracing::trace;

/// Best-scoring line window at or above `fuzzy_threshold`.
///
/// A threshold of 1.0 or more is exact matching after normalization. Ties go
/// to the earliest window.
pub fn find(content: &str, pattern: &str, options: &MatchOptions) -> Option<MatchResult> {
    let threshold = options.fuzzy_threshold;
    if threshold >= 1.0 {
        return normalized::find(content, pattern, options);
    }

    let flags = options.normalize_flags();
    let target = normalize_for_matching(pattern, flags);
    if target.is_empty() {
        return None;
    }

    let spans = line_spans(content);
    let mut best: Option<(f64, usize, usize)> = None;

    for (start, end) in line_windows(&spans, line_count(pattern)) {
        let candidate = normalize_for_matching(&content[start..end], flags);
        let score = str_similarity(&target, &candidate, threshold);
        if meets_threshold(score, threshold) && best.map_or(true, |(top, _, _)| score > top) {
            trace!(offset = start, score, "fuzzy candidate");
            best = Some((score, start, end));
            if score >= 1.0 {
                break;
            }
        }
    }

    best.map(|(_, start, end)| MatchResult::from_span(content, start, end))
}
