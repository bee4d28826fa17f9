//! Line-ending, comment and whitespace normalization shared by the matchers.
//!
//! Matching never compares raw text. Both the pattern and each candidate
//! window are folded through [`normalize_for_matching`] first, and the
//! executor re-encodes inserted text with [`prepare_for_file`] so that edits
//! keep the file's original line-ending style.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static OPERATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"([=+\-*/:<>!])").expect("static regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

const TAB_WIDTH: &str = "    ";

/// Line-ending style of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    /// `\r\n` if it appears anywhere in `content`, otherwise `\n`.
    pub fn detect(content: &str) -> Self {
        if content.contains("\r\n") {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

impl fmt::Display for LineEnding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineEnding::Lf => write!(f, "LF"),
            LineEnding::CrLf => write!(f, "CRLF"),
        }
    }
}

/// Options that affect how text is folded before comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeFlags {
    pub ignore_comments: bool,
    pub ignore_empty_lines: bool,
    pub case_sensitive: bool,
}

/// Convert `\r\n` and lone `\r` to `\n`.
pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Re-encode `\n`-terminated text with the given line ending.
pub fn convert_line_endings(text: &str, ending: LineEnding) -> String {
    match ending {
        LineEnding::Lf => text.to_string(),
        LineEnding::CrLf => text.replace('\n', "\r\n"),
    }
}

/// Normalize any line endings in `text`, then encode them in the file's style.
pub fn prepare_for_file(text: &str, ending: LineEnding) -> String {
    convert_line_endings(&normalize_line_endings(text), ending)
}

/// Blank out comments while keeping every byte offset stable.
///
/// Block comments (`/* ... */`) and line comments (`//` or `#` to end of
/// line) are overwritten with spaces; newlines inside block comments survive.
/// Double-quoted string literals are skipped, so `"http://host"` is kept.
/// Because the result has the same byte length as the input, token positions
/// computed on it index directly into the original text.
pub fn mask_comments(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut ranges: Vec<(usize, usize)> = Vec::new();

    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' && bytes[i] != b'\n' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => match text[i + 2..].find("*/") {
                Some(close) => {
                    let end = i + 2 + close + 2;
                    ranges.push((i, end));
                    i = end;
                }
                None => i += 2,
            },
            b'#' | b'/' if bytes[i] == b'#' || bytes.get(i + 1) == Some(&b'/') => {
                let mut end = text[i..].find('\n').map_or(bytes.len(), |n| i + n);
                if bytes[end - 1] == b'\r' {
                    end -= 1;
                }
                if i < end {
                    ranges.push((i, end));
                }
                i = end;
            }
            _ => i += 1,
        }
    }

    let mut masked = text.to_string();
    for (start, end) in ranges {
        let blanked: String = text[start..end]
            .chars()
            .map(|c| {
                if c == '\n' || c == '\r' {
                    c.to_string()
                } else {
                    " ".repeat(c.len_utf8())
                }
            })
            .collect();
        masked.replace_range(start..end, &blanked);
    }

    masked
}

/// Fold text into the canonical form used by NORMALIZED and FUZZY matching.
///
/// Per line: tabs become four spaces, operators are padded with spaces,
/// whitespace runs collapse to one space, and the line is trimmed. Blank lines
/// are dropped when `ignore_empty_lines` is set; the result is lower-cased
/// when matching is case-insensitive.
pub fn normalize_for_matching(text: &str, flags: NormalizeFlags) -> String {
    let text = normalize_line_endings(text);
    let text = if flags.ignore_comments {
        mask_comments(&text)
    } else {
        text
    };

    let lines = text.split('\n').map(|line| {
        let line = line.replace('\t', TAB_WIDTH);
        let line = OPERATOR.replace_all(&line, " $1 ");
        WHITESPACE.replace_all(&line, " ").trim().to_string()
    });

    let joined = if flags.ignore_empty_lines {
        lines.filter(|l| !l.is_empty()).collect::<Vec<_>>().join("\n")
    } else {
        lines.collect::<Vec<_>>().join("\n")
    };

    if flags.case_sensitive {
        joined
    } else {
        joined.to_lowercase()
    }
}

/// Leading whitespace of `line`.
pub fn extract_indent(line: &str) -> &str {
    let trimmed = line.trim_start();
    &line[..line.len() - trimmed.len()]
}

/// Re-indent `text` to `indent`.
///
/// Every non-blank line has its own leading whitespace stripped and `indent`
/// prefixed instead. Blank lines are kept as-is. Lines are joined with
/// `ending`.
pub fn apply_indent(text: &str, indent: &str, ending: LineEnding) -> String {
    normalize_line_endings(text)
        .split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                line.to_string()
            } else {
                format!("{indent}{}", line.trim_start())
            }
        })
        .collect::<Vec<_>>()
        .join(ending.as_str())
}

/// Byte span of one line, without its terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSpan {
    pub start: usize,
    pub end: usize,
}

/// Split `content` on `\n` and record each line's byte span.
///
/// A trailing `\r` is excluded from the span, so CRLF and LF files produce
/// the same line text. Content ending in a newline yields a final empty line.
pub fn line_spans(content: &str) -> Vec<LineSpan> {
    let mut spans = Vec::new();
    let mut start = 0;
    for line in content.split('\n') {
        let raw_end = start + line.len();
        let end = if line.ends_with('\r') {
            raw_end - 1
        } else {
            raw_end
        };
        spans.push(LineSpan { start, end });
        start = raw_end + 1;
    }
    spans
}

/// 1-based line number containing byte `offset`.
pub fn line_number_at(content: &str, offset: usize) -> usize {
    let offset = offset.min(content.len());
    content.as_bytes()[..offset]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags() -> NormalizeFlags {
        NormalizeFlags {
            ignore_comments: false,
            ignore_empty_lines: true,
            case_sensitive: true,
        }
    }

    #[test]
    fn test_detect_line_ending() {
        assert_eq!(LineEnding::detect("a\nb"), LineEnding::Lf);
        assert_eq!(LineEnding::detect("a\r\nb\nc"), LineEnding::CrLf);
        assert_eq!(LineEnding::detect(""), LineEnding::Lf);
    }

    #[test]
    fn test_prepare_for_file_crlf() {
        assert_eq!(prepare_for_file("a\r\nb\nc", LineEnding::CrLf), "a\r\nb\r\nc");
        assert_eq!(prepare_for_file("a\r\nb\rc", LineEnding::Lf), "a\nb\nc");
    }

    #[test]
    fn test_normalize_collapses_whitespace_and_operators() {
        let a = normalize_for_matching("val   x   =   10", flags());
        let b = normalize_for_matching("val x=10", flags());
        assert_eq!(a, "val x = 10");
        assert_eq!(a, b);
    }

    #[test]
    fn test_normalize_tabs_and_blank_lines() {
        let text = "\tfoo()\n\n   bar()\n";
        assert_eq!(normalize_for_matching(text, flags()), "foo()\nbar()");

        let keep_blank = NormalizeFlags {
            ignore_empty_lines: false,
            ..flags()
        };
        assert_eq!(normalize_for_matching(text, keep_blank), "foo()\n\nbar()\n");
    }

    #[test]
    fn test_normalize_case_folding() {
        let insensitive = NormalizeFlags {
            case_sensitive: false,
            ..flags()
        };
        assert_eq!(normalize_for_matching("VAL X", insensitive), "val x");
    }

    #[test]
    fn test_mask_comments_preserves_length() {
        let text = "a = 1 // note\nb /* c\nd */ = 2 # hash";
        let masked = mask_comments(text);
        assert_eq!(masked.len(), text.len());
        assert!(!masked.contains("note"));
        assert!(!masked.contains("hash"));
        assert!(!masked.contains('c'));
        assert_eq!(masked.matches('\n').count(), 2);
        assert!(masked.starts_with("a = 1 "));
    }

    #[test]
    fn test_mask_comments_skips_string_literals() {
        let text = "val url = \"http://x\" // trailing\nval color = \"#fff\"\nval esc = \"a\\\"//b\" # note";
        let masked = mask_comments(text);
        assert_eq!(masked.len(), text.len());
        assert!(masked.contains("\"http://x\""));
        assert!(masked.contains("\"#fff\""));
        assert!(masked.contains("\"a\\\"//b\""));
        assert!(!masked.contains("trailing"));
        assert!(!masked.contains("note"));
    }

    #[test]
    fn test_normalize_ignores_comments() {
        let ignore = NormalizeFlags {
            ignore_comments: true,
            ..flags()
        };
        assert_eq!(
            normalize_for_matching("val x = 1 // comment here", ignore),
            normalize_for_matching("val x = 1", ignore)
        );
    }

    #[test]
    fn test_extract_and_apply_indent() {
        assert_eq!(extract_indent("    fn main()"), "    ");
        assert_eq!(extract_indent("fn"), "");

        let out = apply_indent("a\n  b\n\nc", "\t", LineEnding::CrLf);
        assert_eq!(out, "\ta\r\n\tb\r\n\r\n\tc");
    }

    #[test]
    fn test_apply_indent_flattens_each_line() {
        let out = apply_indent("if (x) {\n    y()\n}", "    ", LineEnding::Lf);
        assert_eq!(out, "    if (x) {\n    y()\n    }");

        let out = apply_indent("\t\tdeep()\n  shallow()", "", LineEnding::Lf);
        assert_eq!(out, "deep()\nshallow()");
    }

    #[test]
    fn test_line_spans_crlf() {
        let content = "ab\r\ncd\r\n";
        let spans = line_spans(content);
        assert_eq!(spans.len(), 3);
        assert_eq!(&content[spans[0].start..spans[0].end], "ab");
        assert_eq!(&content[spans[1].start..spans[1].end], "cd");
        assert_eq!(spans[2].start, spans[2].end);
    }

    #[test]
    fn test_line_number_at() {
        let content = "one\ntwo\nthree";
        assert_eq!(line_number_at(content, 0), 1);
        assert_eq!(line_number_at(content, 4), 2);
        assert_eq!(line_number_at(content, 8), 3);
    }
}
