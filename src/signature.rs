//! Heuristic extraction and comparison of function and class signatures.
//!
//! This is a best-effort recognizer for C-family and JVM-family declarations
//! (Kotlin `fun`, Rust `fn`, Java/C#/C++-style `Type name(`), driven by
//! regular expressions and a balanced-parenthesis scan. It is not a parser:
//! unusual syntax (macros, attributes spanning lines, operator overloads) is
//! simply not recognized.

use crate::patch::MatchOptions;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeSet;

const FUNCTION_MODIFIERS: &str = r"(?:public|private|protected|internal|open|override|suspend|inline|operator|infix|tailrec|external|static|final|synchronized|native|abstract|default|virtual|async|unsafe|const|extern|pub(?:\([^)]*\))?)";

const CLASS_MODIFIERS: &str = r"(?:public|private|protected|internal|open|abstract|sealed|data|inner|value|annotation|static|final|pub(?:\([^)]*\))?)";

static KOTLIN_FN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b((?:{FUNCTION_MODIFIERS}\s+)*)fun\s+(?:<[^>]*>\s*)?(?:[\w<>?,. ]+\.)?(\w+)\s*\("
    ))
    .expect("static regex")
});

static RUST_FN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b((?:{FUNCTION_MODIFIERS}\s+)*)fn\s+(\w+)\s*(?:<[^>]*>)?\s*\("
    ))
    .expect("static regex")
});

static C_STYLE_FN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b((?:{FUNCTION_MODIFIERS}\s+)*)([\w.:]+(?:<[^>()]*>)?(?:\[\])*[*&]?)\s+[*&]?(\w+)\s*\("
    ))
    .expect("static regex")
});

static CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b((?:{CLASS_MODIFIERS}\s+)*)(?:class|interface|struct|object|enum(?:\s+class)?|trait|record)\s+(\w+)(?:\s*<([^>]*)>)?"
    ))
    .expect("static regex")
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Words that look like a return type in `Type name(` but start a statement.
const NOT_A_TYPE: &[&str] = &[
    "return", "new", "else", "class", "if", "while", "for", "switch", "catch", "throw", "case",
    "fun", "fn", "await", "yield", "do", "try", "delete", "goto", "throws", "interface", "struct",
    "enum", "object", "trait", "record", "typeof", "sizeof", "let", "val", "var",
];

/// Names that are control-flow keywords rather than declarations.
const NOT_A_NAME: &[&str] = &["if", "while", "for", "switch", "catch", "return", "when", "sizeof"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub ty: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    pub modifiers: Vec<String>,
    pub return_type: Option<String>,
    pub name: String,
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSignature {
    pub modifiers: Vec<String>,
    pub name: String,
    pub type_parameters: Vec<String>,
    pub extends: Option<String>,
    pub implements: Vec<String>,
}

/// A declaration header found inside a larger text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located<T> {
    pub signature: T,
    /// Byte offset where the header (including modifiers) starts.
    pub start: usize,
    /// Byte offset just past the header: after the closing `)` for
    /// functions, after the name and generics for classes.
    pub header_end: usize,
}

/// Parse the first function declaration in `code`.
pub fn parse_function(code: &str) -> Option<FunctionSignature> {
    locate_function(code).map(|found| found.signature)
}

/// Parse the first class-like declaration in `code`.
pub fn parse_class(code: &str) -> Option<ClassSignature> {
    locate_class(code).map(|found| found.signature)
}

/// Find the earliest function header in `text`.
///
/// Kotlin and Rust forms win over the C-style form when they start at the
/// same offset.
pub fn locate_function(text: &str) -> Option<Located<FunctionSignature>> {
    let candidates = [
        KOTLIN_FN.captures_iter(text).find_map(|c| from_keyword_form(text, &c)),
        RUST_FN.captures_iter(text).find_map(|c| from_keyword_form(text, &c)),
        C_STYLE_FN.captures_iter(text).find_map(|c| from_c_style(text, &c)),
    ];
    candidates
        .into_iter()
        .flatten()
        .min_by_key(|found| found.start)
}

/// Find the earliest class, interface, struct, object, enum, trait or record
/// header in `text`.
pub fn locate_class(text: &str) -> Option<Located<ClassSignature>> {
    let caps = CLASS.captures(text)?;
    let whole = caps.get(0)?;
    let modifiers = split_modifiers(caps.get(1).map_or("", |m| m.as_str()));
    let name = caps.get(2)?.as_str().to_string();
    let type_parameters = caps
        .get(3)
        .map(|m| split_top_level(m.as_str()))
        .unwrap_or_default();

    // Kotlin primary constructor: `class Point(val x: Int) : Shape()`
    let mut rest = &text[whole.end()..];
    if let Some(after_paren) = rest.trim_start().strip_prefix('(') {
        let open = text.len() - after_paren.len();
        if let Some(close) = closing_paren(text, open) {
            rest = &text[close + 1..];
        }
    }
    let header_rest = rest
        .split(|c| c == '{' || c == '\n')
        .next()
        .unwrap_or("")
        .trim();
    let (extends, implements) = parse_supertypes(header_rest);

    Some(Located {
        signature: ClassSignature {
            modifiers,
            name,
            type_parameters,
            extends,
            implements,
        },
        start: whole.start(),
        header_end: whole.end(),
    })
}

fn from_keyword_form(text: &str, caps: &Captures<'_>) -> Option<Located<FunctionSignature>> {
    let whole = caps.get(0)?;
    let name = caps.get(2)?.as_str();
    let close = closing_paren(text, whole.end())?;
    let parameters = parse_parameters(&text[whole.end()..close]);
    let return_type = trailing_return_type(&text[close + 1..]);

    Some(Located {
        signature: FunctionSignature {
            modifiers: split_modifiers(caps.get(1).map_or("", |m| m.as_str())),
            return_type,
            name: name.to_string(),
            parameters,
        },
        start: whole.start(),
        header_end: close + 1,
    })
}

fn from_c_style(text: &str, caps: &Captures<'_>) -> Option<Located<FunctionSignature>> {
    let whole = caps.get(0)?;
    let ty = caps.get(2)?.as_str();
    let name = caps.get(3)?.as_str();
    if NOT_A_TYPE.contains(&ty) || NOT_A_NAME.contains(&name) {
        return None;
    }
    // `x = foo(` or `a.b(` are calls, not declarations
    let before = text[..whole.start()].trim_end();
    if before.ends_with('=') || before.ends_with('.') {
        return None;
    }
    let close = closing_paren(text, whole.end())?;

    Some(Located {
        signature: FunctionSignature {
            modifiers: split_modifiers(caps.get(1).map_or("", |m| m.as_str())),
            return_type: Some(ty.to_string()),
            name: name.to_string(),
            parameters: parse_parameters(&text[whole.end()..close]),
        },
        start: whole.start(),
        header_end: close + 1,
    })
}

/// Index of the `)` closing the parenthesis opened just before `from`.
fn closing_paren(text: &str, from: usize) -> Option<usize> {
    let mut depth = 1usize;
    for (idx, c) in text[from..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(from + idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// `: Type` (Kotlin) or `-> Type` (Rust) right after the parameter list.
fn trailing_return_type(after: &str) -> Option<String> {
    let after = after.trim_start();
    let rest = if let Some(rest) = after.strip_prefix("->") {
        rest
    } else if let Some(rest) = after.strip_prefix(':') {
        rest
    } else {
        return None;
    };
    let end = rest
        .find(|c| matches!(c, '{' | '=' | ';' | '\n'))
        .unwrap_or(rest.len());
    let ty = rest[..end].trim();
    let ty = ty.split(" where ").next().unwrap_or(ty).trim();
    (!ty.is_empty()).then(|| ty.to_string())
}

fn split_modifiers(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

/// Split on commas that are not nested in `()`, `<>`, `[]` or `{}`.
fn split_top_level(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0u32;
    let mut current = String::new();
    let mut prev = ' ';
    for c in text.chars() {
        match c {
            '>' if prev == '-' => {}
            '(' | '<' | '[' | '{' => depth += 1,
            ')' | '>' | ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
                prev = c;
                continue;
            }
            _ => {}
        }
        current.push(c);
        prev = c;
    }
    parts.push(current.trim().to_string());
    parts.retain(|p| !p.is_empty());
    parts
}

fn parse_parameters(list: &str) -> Vec<Parameter> {
    split_top_level(list)
        .iter()
        .filter_map(|raw| parse_parameter(raw))
        .collect()
}

fn parse_parameter(raw: &str) -> Option<Parameter> {
    let without_annotations: Vec<&str> = raw
        .split_whitespace()
        .filter(|word| !word.starts_with('@'))
        .collect();
    let param = without_annotations.join(" ");
    let param = param.split('=').next().unwrap_or("").trim();
    if param.is_empty() {
        return None;
    }

    if let Some(colon) = single_colon(param) {
        let name = param[..colon]
            .split_whitespace()
            .last()
            .unwrap_or("")
            .trim_start_matches(['&', '*'])
            .to_string();
        let ty = param[colon + 1..].trim().to_string();
        return Some(Parameter { name, ty });
    }

    let cleaned = param.replace("...", " ");
    let words: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|w| !matches!(*w, "final" | "const" | "mut" | "in" | "out" | "ref"))
        .collect();
    parameter_from_words(&words)
}

fn parameter_from_words(words: &[&str]) -> Option<Parameter> {
    match words {
        [] => None,
        [.., last] if last.trim_start_matches(['&', '*']) == "self" => Some(Parameter {
            name: "self".to_string(),
            ty: "Self".to_string(),
        }),
        [single] => Some(Parameter {
            name: String::new(),
            ty: single.to_string(),
        }),
        [types @ .., name] => Some(Parameter {
            name: name.trim_start_matches(['&', '*']).to_string(),
            ty: types.join(" "),
        }),
    }
}

/// Position of a `:` that is not part of a `::` path separator.
fn single_colon(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    (0..bytes.len()).find(|&i| {
        bytes[i] == b':'
            && (i == 0 || bytes[i - 1] != b':')
            && bytes.get(i + 1).copied() != Some(b':')
    })
}

fn parse_supertypes(header_rest: &str) -> (Option<String>, Vec<String>) {
    if let Some(list) = header_rest.strip_prefix(':') {
        let mut parts = split_top_level(list)
            .into_iter()
            .map(|p| strip_call(&p).to_string());
        let extends = parts.next();
        return (extends, parts.collect());
    }

    let mut extends = None;
    let mut implements = Vec::new();
    if let Some(idx) = header_rest.find("extends ") {
        let after = &header_rest[idx + "extends ".len()..];
        let end = after.find(" implements ").unwrap_or(after.len());
        extends = split_top_level(&after[..end]).into_iter().next();
    }
    if let Some(idx) = header_rest.find("implements ") {
        implements = split_top_level(&header_rest[idx + "implements ".len()..]);
    }
    (extends, implements)
}

/// `Base(args)` -> `Base`
fn strip_call(text: &str) -> &str {
    text.split('(').next().unwrap_or(text).trim()
}

/// Compare types ignoring whitespace and nullability markers.
pub fn normalize_type(ty: &str) -> String {
    WHITESPACE.replace_all(ty, "").replace('?', "")
}

fn normalize_return_type(ty: Option<&str>) -> String {
    match ty.map(normalize_type).as_deref() {
        None | Some("") | Some("Unit") | Some("void") | Some("()") => "Unit".to_string(),
        Some(other) => other.to_string(),
    }
}

impl FunctionSignature {
    /// Attribute-by-attribute comparison gated by the `match_*` flags.
    pub fn matches(&self, other: &FunctionSignature, options: &MatchOptions) -> bool {
        if options.match_function_name && self.name != other.name {
            return false;
        }
        if options.match_return_type
            && normalize_return_type(self.return_type.as_deref())
                != normalize_return_type(other.return_type.as_deref())
        {
            return false;
        }
        if options.match_parameter_types || options.match_parameter_names {
            if self.parameters.len() != other.parameters.len() {
                return false;
            }
            for (a, b) in self.parameters.iter().zip(&other.parameters) {
                if options.match_parameter_types && normalize_type(&a.ty) != normalize_type(&b.ty) {
                    return false;
                }
                if options.match_parameter_names && a.name != b.name {
                    return false;
                }
            }
        }
        if options.match_modifiers && modifier_set(&self.modifiers) != modifier_set(&other.modifiers)
        {
            return false;
        }
        true
    }
}

impl ClassSignature {
    pub fn matches(&self, other: &ClassSignature, options: &MatchOptions) -> bool {
        if options.match_class_name && self.name != other.name {
            return false;
        }
        if options.match_modifiers && modifier_set(&self.modifiers) != modifier_set(&other.modifiers)
        {
            return false;
        }
        true
    }
}

fn modifier_set(modifiers: &[String]) -> BTreeSet<&str> {
    modifiers.iter().map(String::as_str).collect()
}
