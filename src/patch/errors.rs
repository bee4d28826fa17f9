use thiserror::Error;

/// Malformed patch document. Aborts the whole request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Patch header not found (expected a line starting with `### PATCH:` or `=== PATCH START ===`)")]
    MissingHeader,

    #[error("File section at line {line} does not name a target path")]
    MissingPath { line: usize },

    #[error("File section `{file}` has no action")]
    MissingAction { file: String },

    #[error("Unknown action `{action}` for `{file}`{}", suggestion_suffix(.suggestion))]
    UnknownAction {
        file: String,
        action: String,
        suggestion: Option<String>,
    },

    #[error("Missing {block} block for {action} action in `{file}`")]
    MissingBlock {
        file: String,
        action: &'static str,
        block: &'static str,
    },

    #[error("Unterminated {block} block starting at line {line}")]
    UnterminatedBlock { block: String, line: usize },

    #[error("Unknown match mode `{value}` in `{file}`{}", suggestion_suffix(.suggestion))]
    UnknownMatchMode {
        file: String,
        value: String,
        suggestion: Option<String>,
    },

    #[error("Unknown anchor scope `{value}` in `{file}` (expected auto, function, class, block or file)")]
    UnknownScope { file: String, value: String },

    #[error("Invalid value `{value}` for {key} in `{file}`: {reason}")]
    InvalidOption {
        file: String,
        key: String,
        value: String,
        reason: String,
    },

    #[error("Invalid line range `{range}` in `{file}` (expected `N` or `N-M` with 1 <= N <= M)")]
    InvalidLineRange { file: String, range: String },

    #[error("Invalid regex in `{file}`: {message}")]
    InvalidRegex { file: String, message: String },
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean `{s}`?)"),
        None => String::new(),
    }
}

/// Closest candidate to `input` by Jaro-Winkler similarity, if any is close
/// enough to be a plausible typo.
pub(crate) fn suggest<'a>(input: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let input = input.to_ascii_lowercase();
    candidates
        .into_iter()
        .map(|candidate| (strsim::jaro_winkler(&input, candidate), candidate))
        .filter(|(score, _)| *score >= 0.8)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, candidate)| candidate.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggest_close_match() {
        let actions = ["replace", "insert_before", "insert_after", "delete"];
        assert_eq!(suggest("replce", actions), Some("replace".to_string()));
        assert_eq!(suggest("INSERT_AFTR", actions), Some("insert_after".to_string()));
        assert_eq!(suggest("frobnicate", actions), None);
    }

    #[test]
    fn test_display_with_suggestion() {
        let err = ParseError::UnknownAction {
            file: "a.rs".into(),
            action: "replce".into(),
            suggestion: Some("replace".into()),
        };
        assert_eq!(
            err.to_string(),
            "Unknown action `replce` for `a.rs` (did you mean `replace`?)"
        );
    }

    #[test]
    fn test_missing_block_names_action() {
        let err = ParseError::MissingBlock {
            file: "a.rs".into(),
            action: "replace",
            block: "FIND",
        };
        assert_eq!(err.to_string(), "Missing FIND block for replace action in `a.rs`");
    }
}
