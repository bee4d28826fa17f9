//! Narrowing a search to the region around an anchor.

use super::{fuzzy, literal, normalized, semantic, MatchResult};
use crate::patch::{AnchorOptions, AnchorScope, MatchMode, MatchOptions};
use tracing::debug;

/// Locate the anchor and return the byte range `[start, end)` to search.
///
/// With [`AnchorScope::File`] the whole file is searched once the anchor is
/// found. Every other scope starts at the anchor and ends at the `}` closing
/// the first brace level at or beyond `search_depth`, counting from the first
/// `{` after the anchor. If that level is never opened, the region ends where
/// the first block closes. Unbalanced braces yield `None`.
pub fn resolve_region(
    content: &str,
    anchor: &AnchorOptions,
    options: &MatchOptions,
) -> Option<(usize, usize)> {
    let found = locate(content, anchor, options)?;
    debug!(scope = %anchor.scope, offset = found.offset, "anchor found");

    if anchor.scope == AnchorScope::File {
        return Some((0, content.len()));
    }

    let open = found.offset + content[found.offset..].find('{')?;
    let target_depth = anchor.search_depth.max(1) as usize;
    let end = scope_end(content, open, target_depth)?;
    Some((found.offset, end))
}

fn locate(content: &str, anchor: &AnchorOptions, options: &MatchOptions) -> Option<MatchResult> {
    let mode = match anchor.match_mode {
        mode @ (MatchMode::Normalized
        | MatchMode::Fuzzy
        | MatchMode::Semantic
        | MatchMode::Contains
        | MatchMode::Regex) => mode,
        MatchMode::Tokenized | MatchMode::LineRange => MatchMode::Normalized,
    };
    let anchor_options = MatchOptions {
        mode,
        anchor: None,
        ..options.clone()
    };
    let text = anchor.anchor_text.as_str();

    match mode {
        MatchMode::Fuzzy => fuzzy::find(content, text, &anchor_options),
        MatchMode::Semantic => semantic::find(content, text, &anchor_options),
        MatchMode::Contains => literal::find_contains(content, text, options.case_sensitive),
        MatchMode::Regex => literal::find_regex(content, text, options.case_sensitive),
        _ => normalized::find(content, text, &anchor_options),
    }
}

/// One past the `}` closing nesting level `target_depth` (1 = the block
/// opened at `open`).
fn scope_end(content: &str, open: usize, target_depth: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut reached = false;

    for (idx, byte) in content.as_bytes()[open..].iter().enumerate() {
        match byte {
            b'{' => {
                depth += 1;
                if depth == target_depth {
                    reached = true;
                }
            }
            b'}' => {
                if reached && depth == target_depth {
                    return Some(open + idx + 1);
                }
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + idx + 1);
                }
            }
            _ => {}
        }
    }
    None
}
