use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Keeps every target and destination path under the base directory.
#[derive(Debug, Clone)]
pub struct WorkspaceGuard {
    /// Canonical base directory
    workspace_root: PathBuf,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("Absolute paths are not allowed: {0}")]
    AbsolutePath(PathBuf),

    #[error("Path is outside base directory: {path} (base: {workspace})")]
    OutsideWorkspace { path: PathBuf, workspace: PathBuf },

    #[error("Failed to canonicalize path: {0}")]
    Canonicalize(#[from] std::io::Error),
}

impl WorkspaceGuard {
    /// The root is canonicalized once, here.
    pub fn new(workspace_root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let workspace_root = workspace_root.as_ref().canonicalize()?;
        Ok(Self { workspace_root })
    }

    /// Resolve a document path against the base directory.
    ///
    /// The target need not exist. `..` is folded lexically; the nearest
    /// existing ancestor is then canonicalized so a symlinked directory
    /// cannot lead outside the base.
    ///
    /// Note: the check runs at resolution time. A directory swapped for a
    /// symlink between this call and the write is not caught.
    pub fn resolve(&self, relative: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let relative = relative.as_ref();
        if relative.is_absolute() || relative.has_root() {
            return Err(SafetyError::AbsolutePath(relative.to_path_buf()));
        }

        let mut resolved = self.workspace_root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if resolved == self.workspace_root {
                        return Err(self.outside(self.workspace_root.join(relative)));
                    }
                    resolved.pop();
                }
                Component::Prefix(_) | Component::RootDir => {
                    return Err(SafetyError::AbsolutePath(relative.to_path_buf()));
                }
            }
        }

        self.check_existing_ancestor(&resolved)?;
        Ok(resolved)
    }

    fn check_existing_ancestor(&self, path: &Path) -> Result<(), SafetyError> {
        let Some(existing) = path.ancestors().find(|p| p.exists() || p.is_symlink()) else {
            return Err(self.outside(path.to_path_buf()));
        };
        let canonical = match existing.canonicalize() {
            Ok(canonical) => canonical,
            // Dangling symlink: nothing to resolve it against.
            Err(_) if existing.is_symlink() => return Err(self.outside(path.to_path_buf())),
            Err(e) => return Err(e.into()),
        };
        if !canonical.starts_with(&self.workspace_root) {
            return Err(self.outside(canonical));
        }
        Ok(())
    }

    fn outside(&self, path: PathBuf) -> SafetyError {
        SafetyError::OutsideWorkspace {
            path,
            workspace: self.workspace_root.clone(),
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_resolve_inside_workspace() {
        let temp_dir = tempfile::tempdir().unwrap();
        let guard = WorkspaceGuard::new(temp_dir.path()).unwrap();

        fs::create_dir_all(temp_dir.path().join("src")).unwrap();
        fs::write(temp_dir.path().join("src/main.rs"), b"").unwrap();

        let resolved = guard.resolve("src/main.rs").unwrap();
        assert_eq!(resolved, guard.workspace_root().join("src/main.rs"));
    }

    #[test]
    fn test_resolve_missing_target() {
        let temp_dir = tempfile::tempdir().unwrap();
        let guard = WorkspaceGuard::new(temp_dir.path()).unwrap();

        let resolved = guard.resolve("new/dir/file.txt").unwrap();
        assert_eq!(resolved, guard.workspace_root().join("new/dir/file.txt"));
    }

    #[test]
    fn test_resolve_folds_parent_components() {
        let temp_dir = tempfile::tempdir().unwrap();
        let guard = WorkspaceGuard::new(temp_dir.path()).unwrap();

        let resolved = guard.resolve("a/./b/../c.txt").unwrap();
        assert_eq!(resolved, guard.workspace_root().join("a/c.txt"));
    }

    #[test]
    fn test_resolve_rejects_escape() {
        let temp_dir = tempfile::tempdir().unwrap();
        let workspace = temp_dir.path().join("workspace");
        fs::create_dir_all(&workspace).unwrap();
        let guard = WorkspaceGuard::new(&workspace).unwrap();

        let result = guard.resolve("src/../../outside.rs");
        assert!(matches!(result, Err(SafetyError::OutsideWorkspace { .. })));
    }

    #[test]
    fn test_resolve_rejects_absolute() {
        let temp_dir = tempfile::tempdir().unwrap();
        let guard = WorkspaceGuard::new(temp_dir.path()).unwrap();

        let absolute = temp_dir.path().join("file.txt");
        assert!(matches!(
            guard.resolve(&absolute),
            Err(SafetyError::AbsolutePath(_))
        ));
    }

    #[test]
    #[cfg(unix)]
    fn test_resolve_symlink_escape() {
        use std::os::unix::fs::symlink;

        let temp_dir = tempfile::tempdir().unwrap();
        let workspace = temp_dir.path().join("workspace");
        let outside = temp_dir.path().join("outside");
        fs::create_dir_all(&workspace).unwrap();
        fs::create_dir_all(&outside).unwrap();

        symlink(&outside, workspace.join("escape")).unwrap();

        let guard = WorkspaceGuard::new(&workspace).unwrap();
        let result = guard.resolve("escape/new.rs");
        assert!(matches!(result, Err(SafetyError::OutsideWorkspace { .. })));
    }
}
