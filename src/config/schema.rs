use crate::patch::{MatchMode, MatchOptions};
use serde::Deserialize;
use std::fmt;

/// Contents of a `robust-patcher.toml` file.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PatcherConfig {
    #[serde(default)]
    pub defaults: MatchDefaults,
}

impl PatcherConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();
        let defaults = &self.defaults;

        if !(0.0..=1.0).contains(&defaults.fuzzy_threshold) {
            issues.push(ValidationIssue::OutOfRange {
                field: "defaults.fuzzy_threshold",
                value: defaults.fuzzy_threshold.to_string(),
                expected: "a number between 0.0 and 1.0",
            });
        }
        if defaults.anchor_search_depth < -1 {
            issues.push(ValidationIssue::OutOfRange {
                field: "defaults.anchor_search_depth",
                value: defaults.anchor_search_depth.to_string(),
                expected: "-1 (unbounded) or a non-negative depth",
            });
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

/// Values that seed [`MatchOptions`] before a file section's own options
/// are applied.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MatchDefaults {
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
    pub token_window_size: usize,
    pub anchor_search_depth: i32,
}

impl Default for MatchDefaults {
    fn default() -> Self {
        let options = MatchOptions::default();
        Self {
            mode: options.mode,
            fuzzy_threshold: options.fuzzy_threshold,
            ignore_comments: options.ignore_comments,
            ignore_empty_lines: options.ignore_empty_lines,
            case_sensitive: options.case_sensitive,
            match_function_name: options.match_function_name,
            match_class_name: options.match_class_name,
            match_parameter_types: options.match_parameter_types,
            match_parameter_names: options.match_parameter_names,
            match_return_type: options.match_return_type,
            match_modifiers: options.match_modifiers,
            token_window_size: options.token_window_size,
            anchor_search_depth: 1,
        }
    }
}

impl MatchDefaults {
    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            mode: self.mode,
            fuzzy_threshold: self.fuzzy_threshold,
            ignore_comments: self.ignore_comments,
            ignore_empty_lines: self.ignore_empty_lines,
            case_sensitive: self.case_sensitive,
            match_function_name: self.match_function_name,
            match_class_name: self.match_class_name,
            match_parameter_types: self.match_parameter_types,
            match_parameter_names: self.match_parameter_names,
            match_return_type: self.match_return_type,
            match_modifiers: self.match_modifiers,
            token_window_size: self.token_window_size,
            anchor: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    OutOfRange {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::OutOfRange {
                field,
                value,
                expected,
            } => write!(f, "'{field}' is {value}, expected {expected}"),
        }
    }
}
