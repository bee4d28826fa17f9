use super::MatchResult;
use crate::patch::MatchOptions;
use crate::text::{meets_threshold, normalize::mask_comments, similarity};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use tracing::trace;

static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+").expect("static regex"));

/// A whitespace-delimited token and its byte span in the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Split `text` on whitespace, optionally blanking comments and folding case.
pub fn tokenize(text: &str, options: &MatchOptions) -> Vec<Token> {
    let working: Cow<'_, str> = if options.ignore_comments {
        Cow::Owned(mask_comments(text))
    } else {
        Cow::Borrowed(text)
    };

    TOKEN
        .find_iter(&working)
        .map(|m| Token {
            text: if options.case_sensitive {
                m.as_str().to_string()
            } else {
                m.as_str().to_lowercase()
            },
            start: m.start(),
            end: m.end(),
        })
        .collect()
}

/// Token-window match.
///
/// At a threshold of 1.0 the first window whose tokens equal the pattern's
/// wins. Below that, every start position is tried with window sizes from
/// 80% to 120% of the base size and the highest-scoring window at or above
/// the threshold wins.
pub fn find(content: &str, pattern: &str, options: &MatchOptions) -> Option<MatchResult> {
    let pattern_tokens: Vec<String> = tokenize(pattern, options)
        .into_iter()
        .map(|t| t.text)
        .collect();
    if pattern_tokens.is_empty() {
        return None;
    }

    let base = if options.token_window_size > 0 {
        options.token_window_size
    } else {
        pattern_tokens.len()
    };
    let content_tokens = tokenize(content, options);
    let texts: Vec<&str> = content_tokens.iter().map(|t| t.text.as_str()).collect();
    let pattern_refs: Vec<&str> = pattern_tokens.iter().map(String::as_str).collect();

    let span = |i: usize, size: usize| {
        MatchResult::from_span(content, content_tokens[i].start, content_tokens[i + size - 1].end)
    };

    let threshold = options.fuzzy_threshold;
    if threshold >= 1.0 {
        if texts.len() < base {
            return None;
        }
        return (0..=texts.len() - base)
            .find(|&i| texts[i..i + base] == pattern_refs[..])
            .map(|i| span(i, base));
    }

    let min_window = ((base as f64 * 0.8) as usize).max(1);
    let max_window = (base as f64 * 1.2) as usize;
    trace!(base, min_window, max_window, tokens = texts.len(), "token window range");

    let mut best: Option<(f64, usize, usize)> = None;
    for i in 0..texts.len() {
        let upper = max_window.min(texts.len() - i);
        for size in min_window..=upper {
            let score = similarity(&pattern_refs, &texts[i..i + size], threshold);
            if meets_threshold(score, threshold) && best.map_or(true, |(top, _, _)| score > top) {
                trace!(start = i, size, score, "new best token window");
                best = Some((score, i, size));
            }
        }
    }

    best.map(|(_, i, size)| span(i, size))
}
