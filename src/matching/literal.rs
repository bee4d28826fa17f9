//! Modes that take the pattern literally: REGEX, CONTAINS and LINE_RANGE.

use super::MatchResult;
use crate::text::line_spans;
use regex::RegexBuilder;
use tracing::warn;

/// First regex match in `content`.
///
/// Patterns are validated when the document is parsed; a pattern that still
/// fails to compile here is logged and treated as no match.
pub fn find_regex(content: &str, pattern: &str, case_sensitive: bool) -> Option<MatchResult> {
    let regex = match RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()
    {
        Ok(regex) => regex,
        Err(error) => {
            warn!(%error, "invalid regex pattern");
            return None;
        }
    };
    regex
        .find(content)
        .map(|m| MatchResult::from_span(content, m.start(), m.end()))
}

/// First substring occurrence of `pattern`.
///
/// Case-insensitive search compares character by character, so the matched
/// span always covers as many characters as the pattern has.
pub fn find_contains(content: &str, pattern: &str, case_sensitive: bool) -> Option<MatchResult> {
    if pattern.is_empty() {
        return None;
    }
    if case_sensitive {
        return content
            .find(pattern)
            .map(|start| MatchResult::from_span(content, start, start + pattern.len()));
    }

    let needle: Vec<char> = pattern.chars().collect();
    for (start, _) in content.char_indices() {
        let mut hay = content[start..].char_indices();
        let mut end = start;
        let mut matched = true;
        for expected in &needle {
            match hay.next() {
                Some((idx, actual)) if chars_eq_ignore_case(actual, *expected) => {
                    end = start + idx + actual.len_utf8();
                }
                _ => {
                    matched = false;
                    break;
                }
            }
        }
        if matched {
            return Some(MatchResult::from_span(content, start, end));
        }
    }
    None
}

fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// Parse `"N"` or `"N-M"` into a 1-based inclusive line range.
///
/// Only the syntax is checked here; bounds against a file are checked by
/// [`find_line_range`].
pub fn parse_line_range(pattern: &str) -> Option<(usize, usize)> {
    let pattern = pattern.trim();
    let (start, end) = match pattern.split_once('-') {
        Some((start, end)) => (start.trim(), end.trim()),
        None => (pattern, pattern),
    };
    let start = start.parse().ok()?;
    let end = end.parse().ok()?;
    Some((start, end))
}

/// Lines `start..=end` (1-based) of `content`, without the final terminator.
pub fn find_line_range(content: &str, pattern: &str) -> Option<MatchResult> {
    let (start, end) = parse_line_range(pattern)?;
    let spans = line_spans(content);
    if start < 1 || end > spans.len() || start > end {
        return None;
    }
    Some(MatchResult::from_span(
        content,
        spans[start - 1].start,
        spans[end - 1].end,
    ))
}
