use crate::text::NormalizeFlags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Strategy used to locate a pattern inside file content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    #[default]
    Normalized,
    Fuzzy,
    Tokenized,
    Semantic,
    Regex,
    Contains,
    LineRange,
}

impl MatchMode {
    pub const ALL: [MatchMode; 7] = [
        MatchMode::Normalized,
        MatchMode::Fuzzy,
        MatchMode::Tokenized,
        MatchMode::Semantic,
        MatchMode::Regex,
        MatchMode::Contains,
        MatchMode::LineRange,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MatchMode::Normalized => "normalized",
            MatchMode::Fuzzy => "fuzzy",
            MatchMode::Tokenized => "tokenized",
            MatchMode::Semantic => "semantic",
            MatchMode::Regex => "regex",
            MatchMode::Contains => "contains",
            MatchMode::LineRange => "line_range",
        }
    }

    /// Case-insensitive lookup; `-` and `_` are interchangeable.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let keyword = keyword.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|mode| mode.as_str() == keyword)
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How far an anchor's search region extends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorScope {
    #[default]
    Auto,
    Function,
    Class,
    Block,
    File,
}

impl AnchorScope {
    pub const ALL: [AnchorScope; 5] = [
        AnchorScope::Auto,
        AnchorScope::Function,
        AnchorScope::Class,
        AnchorScope::Block,
        AnchorScope::File,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AnchorScope::Auto => "auto",
            AnchorScope::Function => "function",
            AnchorScope::Class => "class",
            AnchorScope::Block => "block",
            AnchorScope::File => "file",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let keyword = keyword.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|scope| scope.as_str() == keyword)
    }
}

impl fmt::Display for AnchorScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Secondary pattern that narrows the region searched by the primary mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorOptions {
    pub anchor_text: String,
    /// Mode used only to locate the anchor itself.
    pub match_mode: MatchMode,
    pub scope: AnchorScope,
    /// Brace depth at which the region closes; `-1` means the block opened
    /// right after the anchor.
    pub search_depth: i32,
}

/// Tolerances and strategy for locating a find/marker block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOptions {
    pub mode: MatchMode,
    pub fuzzy_threshold: f64,
    pub ignore_comments: bool,
    pub ignore_empty_lines: bool,
    pub case_sensitive: bool,

    pub match_function_name: bool,
    pub match_class_name: bool,
    pub match_parameter_types: bool,
    pub match_parameter_names: bool,
    pub match_return_type: bool,
    pub match_modifiers: bool,

    /// 0 derives the window from the pattern's token count.
    pub token_window_size: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<AnchorOptions>,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            mode: MatchMode::Normalized,
            fuzzy_threshold: 0.85,
            ignore_comments: false,
            ignore_empty_lines: true,
            case_sensitive: true,
            match_function_name: true,
            match_class_name: true,
            match_parameter_types: true,
            match_parameter_names: false,
            match_return_type: true,
            match_modifiers: false,
            token_window_size: 0,
            anchor: None,
        }
    }
}

impl MatchOptions {
    pub fn with_mode(mode: MatchMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn normalize_flags(&self) -> NormalizeFlags {
        NormalizeFlags {
            ignore_comments: self.ignore_comments,
            ignore_empty_lines: self.ignore_empty_lines,
            case_sensitive: self.case_sensitive,
        }
    }
}

/// What to do to one target file.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchAction {
    Replace {
        find: String,
        replacement: String,
        options: MatchOptions,
    },
    InsertBefore {
        marker: String,
        content: String,
        options: MatchOptions,
    },
    InsertAfter {
        marker: String,
        content: String,
        options: MatchOptions,
    },
    Delete {
        find: String,
        options: MatchOptions,
    },
    CreateFile {
        content: String,
    },
    ReplaceFile {
        content: String,
    },
    DeleteFile,
    MoveFile {
        destination: String,
        overwrite: bool,
    },
}

impl PatchAction {
    /// Keyword used in documents and reported in results.
    pub fn name(&self) -> &'static str {
        match self {
            PatchAction::Replace { .. } => "replace",
            PatchAction::InsertBefore { .. } => "insert_before",
            PatchAction::InsertAfter { .. } => "insert_after",
            PatchAction::Delete { .. } => "delete",
            PatchAction::CreateFile { .. } => "create_file",
            PatchAction::ReplaceFile { .. } => "replace_file",
            PatchAction::DeleteFile => "delete_file",
            PatchAction::MoveFile { .. } => "move_file",
        }
    }

    /// Match options of content actions; `None` for file actions.
    pub fn match_options(&self) -> Option<&MatchOptions> {
        match self {
            PatchAction::Replace { options, .. }
            | PatchAction::InsertBefore { options, .. }
            | PatchAction::InsertAfter { options, .. }
            | PatchAction::Delete { options, .. } => Some(options),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchMetadata {
    pub name: String,
    pub description: String,
    pub author: String,
    pub version: String,
}

impl Default for PatchMetadata {
    fn default() -> Self {
        Self {
            name: "Unnamed".to_string(),
            description: String::new(),
            author: "Unknown".to_string(),
            version: "1.0".to_string(),
        }
    }
}

/// One target file and the action to perform on it.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePatch {
    /// Relative to the base directory.
    pub path: String,
    pub description: String,
    pub action: PatchAction,
}

/// A parsed patch document. Immutable once produced by the parser.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchDocument {
    pub metadata: PatchMetadata,
    pub files: Vec<FilePatch>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchStatus {
    Success,
    Skipped,
    Failed,
    FileNotFound,
}

impl fmt::Display for PatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchStatus::Success => write!(f, "success"),
            PatchStatus::Skipped => write!(f, "skipped"),
            PatchStatus::Failed => write!(f, "failed"),
            PatchStatus::FileNotFound => write!(f, "file_not_found"),
        }
    }
}

/// Outcome of executing one [`FilePatch`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilePatchResult {
    pub file: String,
    pub description: String,
    pub action: String,
    pub status: PatchStatus,
    pub message: String,
    /// Content the file holds (or would hold, in a dry run) after a
    /// successful write.
    #[serde(skip)]
    pub new_content: Option<String>,
}

impl FilePatchResult {
    pub(crate) fn new(patch: &FilePatch, status: PatchStatus, message: impl Into<String>) -> Self {
        Self {
            file: patch.path.clone(),
            description: patch.description.clone(),
            action: patch.action.name().to_string(),
            status,
            message: message.into(),
            new_content: None,
        }
    }

    pub(crate) fn with_content(mut self, content: String) -> Self {
        self.new_content = Some(content);
        self
    }
}
