use super::{closing_brace, MatchResult};
use crate::patch::MatchOptions;
use crate::signature::{locate_class, locate_function, ClassSignature, FunctionSignature};
use crate::text::line_spans;
use tracing::trace;

/// Lines after the candidate line that a multi-line header may span.
const HEADER_CONTEXT_LINES: usize = 5;

enum Target {
    Function(FunctionSignature),
    Class(ClassSignature),
}

/// First declaration in `content` whose signature matches the one in
/// `pattern`.
///
/// The pattern's earliest function or class header is tried first, then the
/// other kind. The span runs from the start of the declaration's first line
/// through its balanced closing brace, or to the end of the header line for
/// declarations without a body.
pub fn find(content: &str, pattern: &str, options: &MatchOptions) -> Option<MatchResult> {
    let mut targets = Vec::new();
    if let Some(found) = locate_function(pattern) {
        targets.push((found.start, Target::Function(found.signature)));
    }
    if let Some(found) = locate_class(pattern) {
        targets.push((found.start, Target::Class(found.signature)));
    }
    targets.sort_by_key(|(start, _)| *start);

    targets
        .into_iter()
        .find_map(|(_, target)| find_declaration(content, &target, options))
}

fn find_declaration(content: &str, target: &Target, options: &MatchOptions) -> Option<MatchResult> {
    let spans = line_spans(content);

    for (i, line) in spans.iter().enumerate() {
        let last = (i + HEADER_CONTEXT_LINES).min(spans.len() - 1);
        let context = &content[line.start..spans[last].end];
        let first_line_len = line.end - line.start;

        let header_end = match target {
            Target::Function(wanted) => locate_function(context)
                .filter(|found| found.start < first_line_len)
                .filter(|found| found.signature.matches(wanted, options))
                .map(|found| found.header_end),
            Target::Class(wanted) => locate_class(context)
                .filter(|found| found.start < first_line_len)
                .filter(|found| found.signature.matches(wanted, options))
                .map(|found| found.header_end),
        };

        let Some(header_end) = header_end else {
            continue;
        };
        trace!(line = i + 1, "signature matched");

        match declaration_end(content, line.start + header_end) {
            Some(end) => return Some(MatchResult::from_span(content, line.start, end)),
            None => continue,
        }
    }
    None
}

/// End of the declaration whose header ends at `from`.
///
/// A `{` on the header line (or at the start of a following line) opens a
/// body that must balance. `;`, `=` or a line break without a following `{`
/// end the declaration at the end of that line.
fn declaration_end(content: &str, from: usize) -> Option<usize> {
    let bytes = content.as_bytes();
    let mut idx = from;
    while idx < bytes.len() {
        match bytes[idx] {
            b'{' => return closing_brace(content, idx).map(|close| close + 1),
            b';' | b'=' => return Some(line_end(content, idx)),
            b'\n' => {
                let next = content[idx..]
                    .find(|c: char| !c.is_whitespace())
                    .map(|off| idx + off);
                match next {
                    Some(pos) if bytes[pos] == b'{' => idx = pos,
                    _ => return Some(line_end(content, idx)),
                }
            }
            _ => idx += 1,
        }
    }
    Some(content.len())
}

/// Offset of the end of the line containing `idx`, before any `\r\n`.
fn line_end(content: &str, idx: usize) -> usize {
    let end = content[idx..].find('\n').map_or(content.len(), |off| idx + off);
    if end > 0 && content.as_bytes()[end - 1] == b'\r' {
        end - 1
    } else {
        end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::MatchMode;

    fn semantic() -> MatchOptions {
        MatchOptions::with_mode(MatchMode::Semantic)
    }

    const KOTLIN: &str = "class Repo {\n    fun load(id: Long): User {\n        if (id < 0) { error() }\n        return db.find(id)\n    }\n\n    fun save(user: User) {\n        db.put(user)\n    }\n}\n";

    #[test]
    fn test_semantic_finds_function_body() {
        let found = find(KOTLIN, "fun save(user: User)", &semantic()).unwrap();
        assert_eq!(
            found.matched_text,
            "    fun save(user: User) {\n        db.put(user)\n    }"
        );
        assert_eq!(found.offset, KOTLIN.find("    fun save").unwrap());
    }

    #[test]
    fn test_semantic_ignores_parameter_names_by_default() {
        let found = find(KOTLIN, "fun load(key: Long): User", &semantic()).unwrap();
        assert!(found.matched_text.starts_with("    fun load(id: Long): User {"));
        assert!(found.matched_text.ends_with("return db.find(id)\n    }"));
    }

    #[test]
    fn test_semantic_respects_return_type() {
        assert!(find(KOTLIN, "fun load(id: Long): Account", &semantic()).is_none());
    }

    #[test]
    fn test_semantic_class_match() {
        let found = find(KOTLIN, "class Repo", &semantic()).unwrap();
        assert_eq!(found.offset, 0);
        assert_eq!(found.matched_text, KOTLIN.trim_end());
    }

    #[test]
    fn test_semantic_expression_body_ends_at_line() {
        let content = "fun twice(x: Int): Int = x * 2\nfun other() {}\n";
        let found = find(content, "fun twice(y: Int): Int", &semantic()).unwrap();
        assert_eq!(found.matched_text, "fun twice(x: Int): Int = x * 2");
    }

    #[test]
    fn test_semantic_allman_braces() {
        let content = "public int size()\n{\n    return n;\n}\n";
        let found = find(content, "public int size()", &semantic()).unwrap();
        assert_eq!(found.matched_text, content.trim_end());
    }

    #[test]
    fn test_semantic_rust_function() {
        let content = "impl Foo {\n    pub fn len(&self) -> usize {\n        self.items.len()\n    }\n}\n";
        let found = find(content, "fn len(&self) -> usize", &semantic()).unwrap();
        assert_eq!(
            found.matched_text,
            "    pub fn len(&self) -> usize {\n        self.items.len()\n    }"
        );
    }
}
