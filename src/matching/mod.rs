//! Locating a pattern inside file content.
//!
//! Every strategy returns a [`MatchResult`] whose span indexes the original,
//! un-normalized content, so `content[offset..offset + length]` is always the
//! reported `matched_text`. [`find_match`] picks the strategy from
//! [`MatchOptions::mode`] and, when an anchor is configured, narrows the
//! search to the anchor's region first.

pub mod anchor;
pub mod fuzzy;
pub mod literal;
pub mod normalized;
pub mod semantic;
pub mod token;

use crate::patch::{MatchMode, MatchOptions};
use crate::text::{line_spans, LineSpan};
use tracing::debug;

/// A located span in the original content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Byte offset into the content that was searched.
    pub offset: usize,
    /// Byte length of the span.
    pub length: usize,
    pub matched_text: String,
}

impl MatchResult {
    /// Build a result from a byte range of `content`.
    pub fn from_span(content: &str, start: usize, end: usize) -> Self {
        Self {
            offset: start,
            length: end - start,
            matched_text: content[start..end].to_string(),
        }
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    fn shifted(mut self, by: usize) -> Self {
        self.offset += by;
        self
    }
}

/// Find `pattern` in `content` using the strategy configured in `options`.
pub fn find_match(content: &str, pattern: &str, options: &MatchOptions) -> Option<MatchResult> {
    let (region_start, region) = match &options.anchor {
        Some(anchor) => {
            let (start, end) = anchor::resolve_region(content, anchor, options)?;
            (start, &content[start..end])
        }
        None => (0, content),
    };

    let found = match options.mode {
        MatchMode::Normalized => normalized::find(region, pattern, options),
        MatchMode::Fuzzy => fuzzy::find(region, pattern, options),
        MatchMode::Tokenized => token::find(region, pattern, options),
        MatchMode::Semantic => semantic::find(region, pattern, options),
        MatchMode::Regex => literal::find_regex(region, pattern, options.case_sensitive),
        MatchMode::Contains => literal::find_contains(region, pattern, options.case_sensitive),
        MatchMode::LineRange => literal::find_line_range(region, pattern),
    };

    let found = found.map(|m| m.shifted(region_start));
    match &found {
        Some(m) => debug!(mode = %options.mode, offset = m.offset, length = m.length, "match found"),
        None => debug!(mode = %options.mode, "no match"),
    }
    found
}

/// Byte ranges of every run of `size` consecutive lines, in document order.
///
/// Each range starts at the first line's start and ends at the last line's
/// end, excluding that line's terminator.
pub(crate) fn line_windows(spans: &[LineSpan], size: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
    let count = if size == 0 || size > spans.len() {
        0
    } else {
        spans.len() - size + 1
    };
    (0..count).map(move |i| (spans[i].start, spans[i + size - 1].end))
}

/// Index of the `}` that balances the `{` at `open`.
pub(crate) fn closing_brace(content: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, byte) in content.as_bytes()[open..].iter().enumerate() {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// Number of lines in `text` after line-ending normalization.
pub(crate) fn line_count(text: &str) -> usize {
    line_spans(text).len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::{AnchorOptions, AnchorScope};

    #[test]
    fn test_line_windows() {
        let content = "a\nb\nc";
        let spans = line_spans(content);
        let windows: Vec<_> = line_windows(&spans, 2).map(|(s, e)| &content[s..e]).collect();
        assert_eq!(windows, vec!["a\nb", "b\nc"]);
        assert_eq!(line_windows(&spans, 4).count(), 0);
    }

    #[test]
    fn test_closing_brace() {
        let content = "f() { a { b } c } d";
        let open = content.find('{').unwrap();
        assert_eq!(closing_brace(content, open), Some(content.rfind('}').unwrap()));
        assert_eq!(closing_brace("{ {", 0), None);
    }

    #[test]
    fn test_dispatch_normalized() {
        let content = "val x = 10\nval y = 20";
        let found = find_match(content, "val x = 10\nval y = 20", &MatchOptions::default()).unwrap();
        assert_eq!(found.offset, 0);
        assert_eq!(found.matched_text, content);
    }

    #[test]
    fn test_dispatch_with_anchor_maps_offsets() {
        let content = "fn a() {\n    call();\n}\nfn b() {\n    call();\n}\n";
        let options = MatchOptions {
            mode: MatchMode::Contains,
            anchor: Some(AnchorOptions {
                anchor_text: "fn b() {".into(),
                match_mode: MatchMode::Normalized,
                scope: AnchorScope::Function,
                search_depth: 1,
            }),
            ..MatchOptions::default()
        };
        let found = find_match(content, "call();", &options).unwrap();
        let second = content.rfind("call();").unwrap();
        assert_eq!(found.offset, second);
        assert_eq!(&content[found.offset..found.end()], "call();");
    }

    #[test]
    fn test_dispatch_missing_anchor_is_no_match() {
        let options = MatchOptions {
            mode: MatchMode::Contains,
            anchor: Some(AnchorOptions {
                anchor_text: "fn missing()".into(),
                match_mode: MatchMode::Normalized,
                scope: AnchorScope::Block,
                search_depth: 1,
            }),
            ..MatchOptions::default()
        };
        assert!(find_match("fn a() { x }", "x", &options).is_none());
    }
}
