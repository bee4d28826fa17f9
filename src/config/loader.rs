use crate::config::schema::{PatcherConfig, ValidationError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// File looked up in the base directory when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = "robust-patcher.toml";

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read config from {}: {}", path.display(), source)
            }
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(f, "failed to parse config TOML ({}): {}", path.display(), source),
                None => write!(f, "failed to parse config TOML: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid config ({}): {}", path.display(), source),
                None => write!(f, "invalid config: {}", source),
            },
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
        }
    }
}

pub fn load_from_str(input: &str) -> Result<PatcherConfig, ConfigError> {
    let config: PatcherConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<PatcherConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}

/// Load `explicit` if given, else `robust-patcher.toml` in `base_dir` if it
/// exists, else the built-in defaults.
pub fn discover(explicit: Option<&Path>, base_dir: &Path) -> Result<PatcherConfig, ConfigError> {
    if let Some(path) = explicit {
        return load_from_path(path);
    }
    let candidate = base_dir.join(CONFIG_FILE_NAME);
    if candidate.is_file() {
        tracing::debug!(path = %candidate.display(), "using config file");
        return load_from_path(candidate);
    }
    Ok(PatcherConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::MatchMode;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = load_from_str("").unwrap();
        assert_eq!(config, PatcherConfig::default());
        assert_eq!(config.defaults.fuzzy_threshold, 0.85);
        assert_eq!(config.defaults.anchor_search_depth, 1);
    }

    #[test]
    fn test_partial_defaults() {
        let config = load_from_str("[defaults]\nmode = \"line_range\"\ncase_sensitive = false\n").unwrap();
        assert_eq!(config.defaults.mode, MatchMode::LineRange);
        assert!(!config.defaults.case_sensitive);
        assert!(config.defaults.ignore_empty_lines);
        let options = config.defaults.match_options();
        assert_eq!(options.mode, MatchMode::LineRange);
        assert!(options.anchor.is_none());
    }

    #[test]
    fn test_threshold_out_of_range() {
        let err = load_from_str("[defaults]\nfuzzy_threshold = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
        assert!(err.to_string().contains("defaults.fuzzy_threshold"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = load_from_str("[defaults]\nfuzziness = 0.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml { .. }));
    }

    #[test]
    fn test_error_carries_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[defaults]\nanchor_search_depth = -4\n").unwrap();
        let err = discover(None, dir.path()).unwrap_err();
        assert!(err.to_string().contains(CONFIG_FILE_NAME));
    }

    #[test]
    fn test_discover_without_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(discover(None, dir.path()).unwrap(), PatcherConfig::default());
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            discover(Some(&missing), dir.path()),
            Err(ConfigError::Io { .. })
        ));
    }
}
