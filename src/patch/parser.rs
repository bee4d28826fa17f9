//! Patch document grammar.
//!
//! A document is scanned once, top to bottom. Three generations of block
//! delimiters are recognized in the same scan:
//!
//! ```text
//! ### PATCH: Rename config key          === PATCH START ===
//! **Author:** ops                       NAME: Rename config key
//! ---                                   --- FILE: src/app.kt ---
//! #### File: `src/app.kt`               ACTION: replace
//! **Action:** replace                   <<< FIND
//! **Options:**                          val port = 80
//! - MATCH_MODE: fuzzy                   FIND >>>
//! **Find:**                             @@ REPLACE
//! ```kotlin                             val port = 8080
//! val port = 80                         @@
//! ```                                   === PATCH END ===
//! ```
//!
//! Labelled blocks (`**Find:**`, `<<< FIND`, `@@ FIND`) go to their named
//! role; unlabelled ` ``` ` fences fill the action's roles in order.

use super::errors::{suggest, ParseError};
use super::model::{
    AnchorOptions, AnchorScope, FilePatch, MatchMode, MatchOptions, PatchAction, PatchDocument,
    PatchMetadata,
};
use crate::config::MatchDefaults;
use crate::matching::literal::parse_line_range;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;
use tracing::debug;

static BOLD_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\*\*([^*]+?)(?::\*\*|\*\*:)\s*(.*)$").expect("static regex")
});
static UPPER_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z][A-Z0-9_]*)\s*:\s*(.*)$").expect("static regex"));
static OPTION_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[-*]\s+`?([A-Za-z][A-Za-z0-9_ ]*?)`?\s*:\s*(.*)$").expect("static regex")
});
static BRACKET_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<<<\s*([A-Za-z_]+)\s*$").expect("static regex"));
static AT_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@@\s*([A-Za-z_]+)\s*$").expect("static regex"));

const ACTION_KEYWORDS: [&str; 9] = [
    "replace",
    "insert_before",
    "insert_after",
    "delete",
    "create_file",
    "replace_file",
    "delete_file",
    "move_file",
    "move",
];

/// Named role a content block plays in a file section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum BlockKind {
    /// Text to find: the replace/delete target or the insert marker.
    Target,
    /// `To`: replacement text, or the destination of a move.
    To,
    Replacement,
    Content,
    Anchor,
    Destination,
}

impl BlockKind {
    fn from_label(label: &str) -> Option<Self> {
        match label {
            "FROM" | "FIND" | "TARGET" | "MARKER" | "REMOVE_THIS" | "BEFORE_THIS" | "AFTER_THIS" => {
                Some(BlockKind::Target)
            }
            "TO" => Some(BlockKind::To),
            "REPLACE" | "REPLACE_WITH" | "REPLACEMENT" => Some(BlockKind::Replacement),
            "INSERT" | "CONTENT" | "INSERT_CONTENT" => Some(BlockKind::Content),
            "ANCHOR" => Some(BlockKind::Anchor),
            "DESTINATION" | "DEST" => Some(BlockKind::Destination),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActionKind {
    Replace,
    InsertBefore,
    InsertAfter,
    Delete,
    CreateFile,
    ReplaceFile,
    DeleteFile,
    MoveFile,
}

impl ActionKind {
    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "replace" => Some(ActionKind::Replace),
            "insert_before" => Some(ActionKind::InsertBefore),
            "insert_after" => Some(ActionKind::InsertAfter),
            "delete" => Some(ActionKind::Delete),
            "create_file" => Some(ActionKind::CreateFile),
            "replace_file" => Some(ActionKind::ReplaceFile),
            "delete_file" => Some(ActionKind::DeleteFile),
            "move_file" | "move" => Some(ActionKind::MoveFile),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            ActionKind::Replace => "replace",
            ActionKind::InsertBefore => "insert_before",
            ActionKind::InsertAfter => "insert_after",
            ActionKind::Delete => "delete",
            ActionKind::CreateFile => "create_file",
            ActionKind::ReplaceFile => "replace_file",
            ActionKind::DeleteFile => "delete_file",
            ActionKind::MoveFile => "move_file",
        }
    }

    /// Roles filled, in order, by unlabelled fences.
    fn positional(self) -> &'static [BlockKind] {
        match self {
            ActionKind::Replace => &[BlockKind::Target, BlockKind::Replacement],
            ActionKind::InsertBefore | ActionKind::InsertAfter => {
                &[BlockKind::Target, BlockKind::Content]
            }
            ActionKind::Delete => &[BlockKind::Target],
            ActionKind::CreateFile | ActionKind::ReplaceFile => &[BlockKind::Content],
            ActionKind::DeleteFile => &[],
            ActionKind::MoveFile => &[BlockKind::Destination],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Fence {
    Backtick { tag: Option<BlockKind> },
    Bracket { tag: String },
    At { tag: String },
}

impl Fence {
    fn tag_name(&self) -> String {
        match self {
            Fence::Backtick { .. } => "code".to_string(),
            Fence::Bracket { tag } | Fence::At { tag } => tag.clone(),
        }
    }

    fn closes(&self, trimmed: &str) -> bool {
        match self {
            Fence::Backtick { .. } => trimmed.starts_with("```"),
            Fence::Bracket { tag } => {
                trimmed == ">>>"
                    || trimmed
                        .strip_suffix(">>>")
                        .is_some_and(|head| head.trim().eq_ignore_ascii_case(tag))
            }
            Fence::At { .. } => trimmed == "@@",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line<'a> {
    PatchStart(&'a str),
    PatchEnd,
    Separator,
    FileHeader(&'a str),
    Fence(Fence),
    Field { key: String, value: &'a str },
    OptionItem { key: String, value: &'a str },
    Other,
}

fn normalize_key(key: &str) -> String {
    key.trim().to_ascii_uppercase().replace([' ', '-'], "_")
}

fn strip_ticks(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_prefix('`')
        .and_then(|v| v.strip_suffix('`'))
        .map(str::trim)
        .unwrap_or(value)
}

fn classify(raw: &str) -> Line<'_> {
    let line = raw.trim();

    if let Some(tag) = line.strip_prefix("```") {
        let tag = tag.trim();
        return Line::Fence(Fence::Backtick {
            tag: BlockKind::from_label(&normalize_key(tag)),
        });
    }
    if let Some(caps) = BRACKET_OPEN.captures(line) {
        return Line::Fence(Fence::Bracket {
            tag: caps[1].to_ascii_uppercase(),
        });
    }
    if let Some(caps) = AT_OPEN.captures(line) {
        return Line::Fence(Fence::At {
            tag: caps[1].to_ascii_uppercase(),
        });
    }
    if let Some(name) = line.strip_prefix("### PATCH:") {
        return Line::PatchStart(name.trim());
    }
    if line == "=== PATCH START ===" {
        return Line::PatchStart("");
    }
    if line == "=== PATCH END ===" {
        return Line::PatchEnd;
    }
    if let Some(path) = line.strip_prefix("#### File:") {
        return Line::FileHeader(path.trim());
    }
    if let Some(path) = line
        .strip_prefix("--- FILE:")
        .and_then(|rest| rest.strip_suffix("---"))
    {
        return Line::FileHeader(path.trim());
    }
    if line == "---" {
        return Line::Separator;
    }
    if let Some(caps) = BOLD_FIELD.captures(line) {
        let value = caps.get(2).map_or("", |m| m.as_str());
        return Line::Field {
            key: normalize_key(&caps[1]),
            value: value.trim(),
        };
    }
    if let Some(caps) = OPTION_ITEM.captures(line) {
        let value = caps.get(2).map_or("", |m| m.as_str());
        return Line::OptionItem {
            key: normalize_key(&caps[1]),
            value: strip_ticks(value),
        };
    }
    if let Some(caps) = UPPER_FIELD.captures(line) {
        let value = caps.get(2).map_or("", |m| m.as_str());
        return Line::Field {
            key: caps[1].to_string(),
            value: value.trim(),
        };
    }
    Line::Other
}

/// Everything collected for one file section before it is validated.
#[derive(Debug, Default)]
struct Section {
    path: String,
    destination: Option<String>,
    action: Option<String>,
    description: String,
    options: HashMap<String, String>,
    labelled: HashMap<BlockKind, String>,
    unlabelled: Vec<String>,
    pending: Option<BlockKind>,
}

impl Section {
    fn from_header(header: &str, line: usize) -> Result<Self, ParseError> {
        let (path, destination) = match header.split_once("->") {
            Some((src, dest)) => (strip_ticks(src), Some(strip_ticks(dest).to_string())),
            None => (strip_ticks(header), None),
        };
        if path.is_empty() {
            return Err(ParseError::MissingPath { line });
        }
        Ok(Self {
            path: path.to_string(),
            destination: destination.filter(|d| !d.is_empty()),
            ..Self::default()
        })
    }

    fn add_field(&mut self, key: String, value: &str) {
        match key.as_str() {
            "ACTION" => self.action = Some(strip_ticks(value).to_string()),
            "DESCRIPTION" => self.description = value.to_string(),
            "OPTIONS" => {}
            _ => match BlockKind::from_label(&key) {
                Some(kind) if value.is_empty() => self.pending = Some(kind),
                Some(kind) => {
                    self.labelled.insert(kind, strip_ticks(value).to_string());
                }
                None => {
                    self.options.insert(key, strip_ticks(value).to_string());
                }
            },
        }
    }

    fn add_block(&mut self, fence: &Fence, content: String) {
        let labelled = match fence {
            Fence::Backtick { tag } => self.pending.take().or(*tag),
            Fence::Bracket { tag } | Fence::At { tag } => {
                self.pending = None;
                if tag == "OVERWRITE" {
                    self.options.insert(tag.clone(), content.trim().to_string());
                    return;
                }
                BlockKind::from_label(tag)
            }
        };
        match labelled {
            Some(kind) => {
                self.labelled.insert(kind, content);
            }
            None => self.unlabelled.push(content),
        }
    }
}

/// Turns patch document text into a [`PatchDocument`].
#[derive(Debug, Clone, Default)]
pub struct PatchParser {
    defaults: MatchDefaults,
}

impl PatchParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed every file section's [`MatchOptions`] from `defaults`.
    pub fn with_defaults(defaults: MatchDefaults) -> Self {
        Self { defaults }
    }

    pub fn parse(&self, document: &str) -> Result<PatchDocument, ParseError> {
        let lines: Vec<&str> = document.lines().collect();

        let header = lines
            .iter()
            .position(|line| matches!(classify(line), Line::PatchStart(_)))
            .ok_or(ParseError::MissingHeader)?;

        let mut metadata = PatchMetadata::default();
        if let Line::PatchStart(name) = classify(lines[header]) {
            if !name.is_empty() {
                metadata.name = name.to_string();
            }
        }

        let mut idx = header + 1;
        while idx < lines.len() {
            match classify(lines[idx]) {
                Line::Separator => {
                    idx += 1;
                    break;
                }
                Line::FileHeader(_) | Line::PatchEnd => break,
                Line::Field { key, value } => apply_metadata(&mut metadata, &key, value),
                _ => {}
            }
            idx += 1;
        }

        let mut files = Vec::new();
        let mut current: Option<Section> = None;

        while idx < lines.len() {
            match classify(lines[idx]) {
                Line::PatchEnd => break,
                Line::FileHeader(header) => {
                    if let Some(section) = current.take() {
                        files.push(self.build(section)?);
                    }
                    current = Some(Section::from_header(header, idx + 1)?);
                }
                Line::Separator => {
                    if let Some(section) = current.take() {
                        files.push(self.build(section)?);
                    }
                }
                Line::Fence(fence) => {
                    let (content, next) = read_fence(&lines, idx, &fence)?;
                    if let Some(section) = current.as_mut() {
                        section.add_block(&fence, content);
                    }
                    idx = next;
                    continue;
                }
                Line::Field { key, value } => {
                    if let Some(section) = current.as_mut() {
                        section.add_field(key, value);
                    }
                }
                Line::OptionItem { key, value } => {
                    if let Some(section) = current.as_mut() {
                        section.options.insert(key, value.to_string());
                    }
                }
                Line::PatchStart(_) | Line::Other => {}
            }
            idx += 1;
        }

        if let Some(section) = current.take() {
            files.push(self.build(section)?);
        }

        debug!(name = %metadata.name, files = files.len(), "parsed patch document");
        Ok(PatchDocument { metadata, files })
    }

    fn build(&self, section: Section) -> Result<FilePatch, ParseError> {
        let file = section.path;
        let raw_action = section.action.ok_or_else(|| ParseError::MissingAction {
            file: file.clone(),
        })?;
        let keyword = raw_action.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        let kind = ActionKind::from_keyword(&keyword).ok_or_else(|| ParseError::UnknownAction {
            file: file.clone(),
            action: raw_action.clone(),
            suggestion: suggest(&keyword, ACTION_KEYWORDS),
        })?;

        let mut blocks = section.labelled;
        if let Some(to) = blocks.remove(&BlockKind::To) {
            let role = if kind == ActionKind::MoveFile {
                BlockKind::Destination
            } else {
                BlockKind::Replacement
            };
            blocks.entry(role).or_insert(to);
        }
        if let Some(dest) = section.destination {
            blocks.insert(BlockKind::Destination, dest);
        }
        for block in section.unlabelled {
            if let Some(role) = kind.positional().iter().find(|r| !blocks.contains_key(*r)) {
                blocks.insert(*role, block);
            }
        }

        let mut take = |role: BlockKind, block: &'static str| {
            blocks.remove(&role).ok_or_else(|| ParseError::MissingBlock {
                file: file.clone(),
                action: kind.name(),
                block,
            })
        };

        let action = match kind {
            ActionKind::Replace => {
                let find = take(BlockKind::Target, "FIND")?;
                let replacement = take(BlockKind::Replacement, "REPLACE")?;
                let anchor = take(BlockKind::Anchor, "ANCHOR").ok();
                let options = self.match_options(&file, &section.options, anchor, &find)?;
                PatchAction::Replace {
                    find,
                    replacement,
                    options,
                }
            }
            ActionKind::InsertBefore | ActionKind::InsertAfter => {
                let marker = take(BlockKind::Target, "FIND")?;
                let content = take(BlockKind::Content, "CONTENT")?;
                let anchor = take(BlockKind::Anchor, "ANCHOR").ok();
                let options = self.match_options(&file, &section.options, anchor, &marker)?;
                if kind == ActionKind::InsertBefore {
                    PatchAction::InsertBefore {
                        marker,
                        content,
                        options,
                    }
                } else {
                    PatchAction::InsertAfter {
                        marker,
                        content,
                        options,
                    }
                }
            }
            ActionKind::Delete => {
                let find = take(BlockKind::Target, "FIND")?;
                let anchor = take(BlockKind::Anchor, "ANCHOR").ok();
                let options = self.match_options(&file, &section.options, anchor, &find)?;
                PatchAction::Delete { find, options }
            }
            ActionKind::CreateFile => PatchAction::CreateFile {
                content: take(BlockKind::Content, "CONTENT")?,
            },
            ActionKind::ReplaceFile => PatchAction::ReplaceFile {
                content: take(BlockKind::Content, "CONTENT")?,
            },
            ActionKind::DeleteFile => PatchAction::DeleteFile,
            ActionKind::MoveFile => {
                let destination = take(BlockKind::Destination, "DESTINATION")?.trim().to_string();
                let overwrite = section
                    .options
                    .get("OVERWRITE")
                    .map_or(false, |v| parse_flag(v, false));
                PatchAction::MoveFile {
                    destination,
                    overwrite,
                }
            }
        };

        debug!(file = %file, action = action.name(), "parsed file section");
        Ok(FilePatch {
            path: file,
            description: section.description,
            action,
        })
    }

    fn match_options(
        &self,
        file: &str,
        raw: &HashMap<String, String>,
        anchor_text: Option<String>,
        pattern: &str,
    ) -> Result<MatchOptions, ParseError> {
        let mut options = self.defaults.match_options();

        if let Some(value) = raw.get("MATCH_MODE") {
            options.mode = parse_mode(file, value)?;
        }
        if let Some(value) = raw.get("FUZZY_THRESHOLD") {
            options.fuzzy_threshold = value
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|t| (0.0..=1.0).contains(t))
                .ok_or_else(|| invalid(file, "FUZZY_THRESHOLD", value, "expected a number between 0.0 and 1.0"))?;
        }
        if let Some(value) = raw.get("TOKEN_WINDOW_SIZE") {
            options.token_window_size = value
                .trim()
                .parse::<usize>()
                .map_err(|_| invalid(file, "TOKEN_WINDOW_SIZE", value, "expected a non-negative integer"))?;
        }

        let flags: [(&str, &mut bool); 9] = [
            ("IGNORE_COMMENTS", &mut options.ignore_comments),
            ("IGNORE_EMPTY_LINES", &mut options.ignore_empty_lines),
            ("CASE_SENSITIVE", &mut options.case_sensitive),
            ("MATCH_FUNCTION_NAME", &mut options.match_function_name),
            ("MATCH_CLASS_NAME", &mut options.match_class_name),
            ("MATCH_PARAMETER_TYPES", &mut options.match_parameter_types),
            ("MATCH_PARAMETER_NAMES", &mut options.match_parameter_names),
            ("MATCH_RETURN_TYPE", &mut options.match_return_type),
            ("MATCH_MODIFIERS", &mut options.match_modifiers),
        ];
        for (key, slot) in flags {
            if let Some(value) = raw.get(key) {
                *slot = parse_flag(value, *slot);
            }
        }

        if let Some(anchor_text) = anchor_text {
            let match_mode = match raw.get("ANCHOR_MATCH_MODE") {
                Some(value) => parse_mode(file, value)?,
                None => MatchMode::Normalized,
            };
            let scope = match raw.get("ANCHOR_SCOPE") {
                Some(value) => AnchorScope::from_keyword(value).ok_or_else(|| ParseError::UnknownScope {
                    file: file.to_string(),
                    value: value.clone(),
                })?,
                None => AnchorScope::Auto,
            };
            let search_depth = match raw.get("ANCHOR_SEARCH_DEPTH") {
                Some(value) => value
                    .trim()
                    .parse::<i32>()
                    .ok()
                    .filter(|d| *d >= -1)
                    .ok_or_else(|| invalid(file, "ANCHOR_SEARCH_DEPTH", value, "expected -1 or a non-negative integer"))?,
                None => self.defaults.anchor_search_depth,
            };
            if match_mode == MatchMode::Regex {
                check_regex(file, &anchor_text, options.case_sensitive)?;
            }
            options.anchor = Some(AnchorOptions {
                anchor_text,
                match_mode,
                scope,
                search_depth,
            });
        }

        match options.mode {
            MatchMode::LineRange => {
                let valid = parse_line_range(pattern).is_some_and(|(start, end)| start >= 1 && start <= end);
                if !valid {
                    return Err(ParseError::InvalidLineRange {
                        file: file.to_string(),
                        range: pattern.trim().to_string(),
                    });
                }
            }
            MatchMode::Regex => check_regex(file, pattern, options.case_sensitive)?,
            _ => {}
        }

        Ok(options)
    }
}

/// Parse a document with the built-in defaults.
pub fn parse(document: &str) -> Result<PatchDocument, ParseError> {
    PatchParser::new().parse(document)
}

fn apply_metadata(metadata: &mut PatchMetadata, key: &str, value: &str) {
    match key {
        "NAME" if !value.is_empty() => metadata.name = value.to_string(),
        "DESCRIPTION" => metadata.description = value.to_string(),
        "AUTHOR" if !value.is_empty() => metadata.author = value.to_string(),
        "VERSION" if !value.is_empty() => metadata.version = value.to_string(),
        _ => {}
    }
}

/// Content between the fence opened at `lines[start]` and its closing line,
/// plus the index of the line after the close.
fn read_fence(lines: &[&str], start: usize, fence: &Fence) -> Result<(String, usize), ParseError> {
    let mut body = Vec::new();
    for (offset, line) in lines[start + 1..].iter().enumerate() {
        if fence.closes(line.trim()) {
            let content = body.join("\n").trim_end_matches(['\r', '\n']).to_string();
            return Ok((content, start + offset + 2));
        }
        body.push(*line);
    }
    Err(ParseError::UnterminatedBlock {
        block: fence.tag_name(),
        line: start + 1,
    })
}

fn parse_mode(file: &str, value: &str) -> Result<MatchMode, ParseError> {
    MatchMode::from_keyword(value).ok_or_else(|| ParseError::UnknownMatchMode {
        file: file.to_string(),
        value: value.to_string(),
        suggestion: suggest(value, MatchMode::ALL.iter().map(|m| m.as_str())),
    })
}

/// `true`/`yes` and `false`/`no`, case-insensitive; anything else keeps
/// `fallback`.
fn parse_flag(value: &str, fallback: bool) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" => true,
        "false" | "no" => false,
        _ => fallback,
    }
}

fn check_regex(file: &str, pattern: &str, case_sensitive: bool) -> Result<(), ParseError> {
    RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()
        .map(|_| ())
        .map_err(|e| ParseError::InvalidRegex {
            file: file.to_string(),
            message: e.to_string(),
        })
}

fn invalid(file: &str, key: &str, value: &str, reason: &str) -> ParseError {
    ParseError::InvalidOption {
        file: file.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
