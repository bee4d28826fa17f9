use super::{line_count, line_windows, MatchResult};
use crate::patch::MatchOptions;
use crate::text::{line_spans, normalize_for_matching};

/// First line window whose normalized text equals the normalized pattern.
pub fn find(content: &str, pattern: &str, options: &MatchOptions) -> Option<MatchResult> {
    let flags = options.normalize_flags();
    let target = normalize_for_matching(pattern, flags);
    if target.is_empty() {
        return None;
    }

    let spans = line_spans(content);
    let found = line_windows(&spans, line_count(pattern))
        .find(|&(start, end)| normalize_for_matching(&content[start..end], flags) == target);
    found.map(|(start, end)| MatchResult::from_span(content, start, end))
}
