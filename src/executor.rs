//! Runs one [`FilePatch`] against the base directory.
//!
//! File actions touch the filesystem directly. Content actions read the
//! target, locate the find/marker block with [`find_match`], turn the match
//! into an [`Edit`] and write the spliced result back. Every failure ends up
//! in the returned [`FilePatchResult`]; nothing here returns an error to the
//! caller.

use crate::edit::{atomic_write, Edit, EditError};
use crate::matching::{find_match, MatchResult};
use crate::patch::{FilePatch, FilePatchResult, MatchOptions, PatchAction, PatchStatus};
use crate::safety::{SafetyError, WorkspaceGuard};
use crate::text::{apply_indent, extract_indent, line_number_at, prepare_for_file, LineEnding};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Dry-run view of a path after earlier file patches in the same request.
#[derive(Debug, Clone)]
enum Staged {
    Written(Vec<u8>),
    Removed,
}

/// Executes file patches in document order for one request.
///
/// In a dry run every would-be mutation is staged in memory, so later file
/// patches observe earlier ones exactly as they would on disk.
#[derive(Debug)]
pub struct PatchExecutor {
    guard: WorkspaceGuard,
    dry_run: bool,
    overlay: HashMap<PathBuf, Staged>,
}

impl PatchExecutor {
    /// Fails only if `base_dir` cannot be canonicalized.
    pub fn new(base_dir: impl AsRef<Path>, dry_run: bool) -> Result<Self, SafetyError> {
        Ok(Self {
            guard: WorkspaceGuard::new(base_dir)?,
            dry_run,
            overlay: HashMap::new(),
        })
    }

    pub fn base_dir(&self) -> &Path {
        self.guard.workspace_root()
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn execute(&mut self, patch: &FilePatch) -> FilePatchResult {
        let result = match self.guard.resolve(&patch.path) {
            Ok(target) => self.dispatch(patch, &target),
            Err(e) => FilePatchResult::new(patch, PatchStatus::Failed, e.to_string()),
        };

        match result.status {
            PatchStatus::Failed => warn!(
                file = %result.file,
                action = %result.action,
                status = %result.status,
                message = %result.message,
                "file patch failed"
            ),
            _ => info!(
                file = %result.file,
                action = %result.action,
                status = %result.status,
                dry_run = self.dry_run,
                "file patch executed"
            ),
        }
        result
    }

    fn dispatch(&mut self, patch: &FilePatch, target: &Path) -> FilePatchResult {
        match &patch.action {
            PatchAction::CreateFile { content } => self.create_file(patch, target, content),
            PatchAction::ReplaceFile { content } => self.replace_file(patch, target, content),
            PatchAction::DeleteFile => self.delete_file(patch, target),
            PatchAction::MoveFile {
                destination,
                overwrite,
            } => self.move_file(patch, target, destination, *overwrite),
            PatchAction::Replace { .. }
            | PatchAction::InsertBefore { .. }
            | PatchAction::InsertAfter { .. }
            | PatchAction::Delete { .. } => self.content_action(patch, target),
        }
    }

    fn create_file(&mut self, patch: &FilePatch, target: &Path, content: &str) -> FilePatchResult {
        if self.exists(target) {
            return FilePatchResult::new(patch, PatchStatus::Skipped, "File already exists");
        }
        if let Err(e) = self.write(target, content.as_bytes()) {
            return FilePatchResult::new(
                patch,
                PatchStatus::Failed,
                format!("Failed to create file: {e}"),
            );
        }
        FilePatchResult::new(
            patch,
            PatchStatus::Success,
            format!("Created file ({} characters)", content.chars().count()),
        )
        .with_content(content.to_string())
    }

    fn replace_file(&mut self, patch: &FilePatch, target: &Path, content: &str) -> FilePatchResult {
        if !self.exists(target) {
            return FilePatchResult::new(patch, PatchStatus::FileNotFound, "File does not exist");
        }
        if let Err(e) = self.write(target, content.as_bytes()) {
            return FilePatchResult::new(
                patch,
                PatchStatus::Failed,
                format!("Failed to replace file: {e}"),
            );
        }
        FilePatchResult::new(
            patch,
            PatchStatus::Success,
            format!(
                "Replaced entire file content ({} characters)",
                content.chars().count()
            ),
        )
        .with_content(content.to_string())
    }

    fn delete_file(&mut self, patch: &FilePatch, target: &Path) -> FilePatchResult {
        if !self.exists(target) {
            return FilePatchResult::new(patch, PatchStatus::Skipped, "File does not exist");
        }
        if let Err(e) = self.remove(target) {
            return FilePatchResult::new(
                patch,
                PatchStatus::Failed,
                format!("Failed to delete file: {e}"),
            );
        }
        FilePatchResult::new(patch, PatchStatus::Success, "Deleted file")
    }

    fn move_file(
        &mut self,
        patch: &FilePatch,
        source: &Path,
        destination: &str,
        overwrite: bool,
    ) -> FilePatchResult {
        if !self.exists(source) {
            return FilePatchResult::new(
                patch,
                PatchStatus::FileNotFound,
                "Source file does not exist",
            );
        }
        let dest = match self.guard.resolve(destination) {
            Ok(dest) => dest,
            Err(e) => return FilePatchResult::new(patch, PatchStatus::Failed, e.to_string()),
        };
        if dest == source {
            return FilePatchResult::new(
                patch,
                PatchStatus::Skipped,
                "Source and destination are the same file",
            );
        }
        if self.exists(&dest) && !overwrite {
            return FilePatchResult::new(
                patch,
                PatchStatus::Failed,
                "Destination already exists (set OVERWRITE: true to replace it)",
            );
        }
        if let Err(e) = self.rename(source, &dest) {
            return FilePatchResult::new(
                patch,
                PatchStatus::Failed,
                format!("Failed to move file: {e}"),
            );
        }
        FilePatchResult::new(
            patch,
            PatchStatus::Success,
            format!("Moved file to {destination}"),
        )
    }

    fn content_action(&mut self, patch: &FilePatch, target: &Path) -> FilePatchResult {
        if !self.exists(target) {
            return FilePatchResult::new(patch, PatchStatus::FileNotFound, "File does not exist");
        }
        let content = match self.read(target) {
            Ok(content) => content,
            Err(e) => {
                return FilePatchResult::new(
                    patch,
                    PatchStatus::Failed,
                    format!("Failed to read file: {e}"),
                )
            }
        };

        let (new_content, summary) = match plan_edit(&patch.action, &content) {
            Ok(Planned::Edited { content, summary }) => (content, summary),
            Ok(Planned::NotFound(message)) => {
                return FilePatchResult::new(patch, PatchStatus::Skipped, message)
            }
            Err(e) => {
                return FilePatchResult::new(
                    patch,
                    PatchStatus::Failed,
                    format!("Edit verification failed: {e}"),
                )
            }
        };

        if new_content == content {
            return FilePatchResult::new(patch, PatchStatus::Skipped, "Content unchanged");
        }
        if let Err(e) = self.write(target, new_content.as_bytes()) {
            return FilePatchResult::new(
                patch,
                PatchStatus::Failed,
                format!("Failed to write file: {e}"),
            );
        }
        FilePatchResult::new(patch, PatchStatus::Success, summary).with_content(new_content)
    }

    fn exists(&self, path: &Path) -> bool {
        match self.overlay.get(path) {
            Some(Staged::Written(_)) => true,
            Some(Staged::Removed) => false,
            None => path.is_file(),
        }
    }

    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
        match self.overlay.get(path) {
            Some(Staged::Written(bytes)) => Ok(bytes.clone()),
            Some(Staged::Removed) => Err(io::Error::new(io::ErrorKind::NotFound, "file was removed")),
            None => fs::read(path),
        }
    }

    fn read(&self, path: &Path) -> io::Result<String> {
        String::from_utf8(self.read_bytes(path)?)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn write(&mut self, path: &Path, content: &[u8]) -> Result<(), EditError> {
        if self.dry_run {
            self.overlay
                .insert(path.to_path_buf(), Staged::Written(content.to_vec()));
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        atomic_write(path, content)
    }

    fn remove(&mut self, path: &Path) -> io::Result<()> {
        if self.dry_run {
            self.overlay.insert(path.to_path_buf(), Staged::Removed);
            return Ok(());
        }
        fs::remove_file(path)
    }

    /// Copy then delete, so a move across filesystems behaves like a local one.
    fn rename(&mut self, source: &Path, dest: &Path) -> io::Result<()> {
        if self.dry_run {
            let bytes = self.read_bytes(source)?;
            self.overlay.insert(dest.to_path_buf(), Staged::Written(bytes));
            self.overlay.insert(source.to_path_buf(), Staged::Removed);
            return Ok(());
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source, dest)?;
        fs::remove_file(source)
    }
}

enum Planned {
    Edited { content: String, summary: String },
    NotFound(String),
}

/// What a content action does once its block is found.
enum Splice<'a> {
    Replace(&'a str),
    Before(&'a str),
    After(&'a str),
    Remove,
}

/// Compute the new content for a content action without touching disk.
fn plan_edit(action: &PatchAction, content: &str) -> Result<Planned, EditError> {
    let ending = LineEnding::detect(content);

    let (pattern, options, splice) = match action {
        PatchAction::Replace {
            find,
            replacement,
            options,
        } => (find, options, Splice::Replace(replacement)),
        PatchAction::InsertBefore {
            marker,
            content,
            options,
        } => (marker, options, Splice::Before(content)),
        PatchAction::InsertAfter {
            marker,
            content,
            options,
        } => (marker, options, Splice::After(content)),
        PatchAction::Delete { find, options } => (find, options, Splice::Remove),
        PatchAction::CreateFile { .. }
        | PatchAction::ReplaceFile { .. }
        | PatchAction::DeleteFile
        | PatchAction::MoveFile { .. } => {
            return Ok(Planned::Edited {
                content: content.to_string(),
                summary: String::new(),
            })
        }
    };

    let Some(found) = find_match(content, pattern, options) else {
        debug!(mode = %options.mode, "no match");
        let what = match splice {
            Splice::Before(_) | Splice::After(_) => "Marker",
            Splice::Replace(_) | Splice::Remove => "Block",
        };
        return Ok(Planned::NotFound(format!(
            "{what} not found (mode: {})",
            options.mode
        )));
    };
    debug!(mode = %options.mode, offset = found.offset, length = found.length, "matched");

    let (edit, summary) = match splice {
        Splice::Replace(replacement) => (
            Edit::replace(&found, reindent(content, found.offset, replacement, ending)),
            format!("Replaced {}{}", line_range(content, &found), mode_suffix(options)),
        ),
        Splice::Before(insert) => {
            let text = format!("{}{}", prepare_for_file(insert, ending), ending.as_str());
            (
                Edit::insert(found.offset, text),
                format!(
                    "Inserted {} before line {}{}",
                    plural_lines(insert),
                    line_number_at(content, found.offset),
                    mode_suffix(options)
                ),
            )
        }
        Splice::After(insert) => {
            let text = format!("{}{}", ending.as_str(), prepare_for_file(insert, ending));
            (
                Edit::insert(found.end(), text),
                format!(
                    "Inserted {} after line {}{}",
                    plural_lines(insert),
                    last_line(content, &found),
                    mode_suffix(options)
                ),
            )
        }
        Splice::Remove => (
            Edit::replace(&found, ""),
            format!("Deleted {}{}", line_range(content, &found), mode_suffix(options)),
        ),
    };

    Ok(Planned::Edited {
        content: edit.splice(content)?,
        summary,
    })
}

/// Re-indent `replacement` to the indentation of the line the match starts
/// on. The first line only gets the part of that indentation the match
/// itself covers.
fn reindent(content: &str, offset: usize, replacement: &str, ending: LineEnding) -> String {
    let line_start = content[..offset].rfind('\n').map_or(0, |i| i + 1);
    let line_end = content[line_start..]
        .find('\n')
        .map_or(content.len(), |i| line_start + i);
    let indent = extract_indent(&content[line_start..line_end]);
    let indented = apply_indent(replacement, indent, ending);

    let before = &content[line_start..offset];
    let first_prefix = indent.strip_prefix(before).unwrap_or("");
    match indented.strip_prefix(indent) {
        Some(rest) if !indent.is_empty() => format!("{first_prefix}{rest}"),
        _ => indented,
    }
}

fn last_line(content: &str, found: &MatchResult) -> usize {
    let body = found.matched_text.trim_end_matches(['\r', '\n']);
    line_number_at(content, found.offset + body.len())
}

fn line_range(content: &str, found: &MatchResult) -> String {
    let first = line_number_at(content, found.offset);
    let last = last_line(content, found);
    if first == last {
        format!("line {first}")
    } else {
        format!("lines {first}-{last}")
    }
}

fn plural_lines(text: &str) -> String {
    match text.lines().count().max(1) {
        1 => "1 line".to_string(),
        n => format!("{n} lines"),
    }
}

fn mode_suffix(options: &MatchOptions) -> String {
    format!(" (mode: {})", options.mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::MatchMode;

    fn file_patch(path: &str, action: PatchAction) -> FilePatch {
        FilePatch {
            path: path.to_string(),
            description: String::new(),
            action,
        }
    }

    fn replace(find: &str, replacement: &str, mode: MatchMode) -> PatchAction {
        PatchAction::Replace {
            find: find.to_string(),
            replacement: replacement.to_string(),
            options: MatchOptions::with_mode(mode),
        }
    }

    #[test]
    fn test_replace_normalized() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.kt"), "val x = 10\nval y = 20").unwrap();
        let mut executor = PatchExecutor::new(dir.path(), false).unwrap();

        let result = executor.execute(&file_patch(
            "a.kt",
            replace("val x = 10\nval y = 20", "val z = 30", MatchMode::Normalized),
        ));
        assert_eq!(result.status, PatchStatus::Success);
        assert_eq!(result.message, "Replaced lines 1-2 (mode: normalized)");
        assert_eq!(fs::read_to_string(dir.path().join("a.kt")).unwrap(), "val z = 30");
    }

    #[test]
    fn test_replace_keeps_indent_and_crlf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.kt");
        fs::write(&path, "fun f() {\r\n    old()\r\n}\r\n").unwrap();
        let mut executor = PatchExecutor::new(dir.path(), false).unwrap();

        let result = executor.execute(&file_patch(
            "a.kt",
            replace("old()", "first()\nsecond()", MatchMode::Normalized),
        ));
        assert_eq!(result.status, PatchStatus::Success);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "fun f() {\r\n    first()\r\n    second()\r\n}\r\n"
        );
    }

    #[test]
    fn test_replace_flattens_replacement_to_match_indent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.kt");
        fs::write(&path, "fun f() {\n    old()\n}\n").unwrap();
        let mut executor = PatchExecutor::new(dir.path(), false).unwrap();

        let result = executor.execute(&file_patch(
            "a.kt",
            replace("old()", "if (x) {\n    y()\n}", MatchMode::Normalized),
        ));
        assert_eq!(result.status, PatchStatus::Success);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "fun f() {\n    if (x) {\n    y()\n    }\n}\n"
        );
    }

    #[test]
    fn test_reindent_mid_line_match() {
        let content = "    let a = old;";
        let offset = content.find("old").unwrap();
        assert_eq!(reindent(content, offset, "new", LineEnding::Lf), "new");
        assert_eq!(reindent(content, 0, "let b = 1;", LineEnding::Lf), "    let b = 1;");
        assert_eq!(reindent(content, 4, "let b = 1;", LineEnding::Lf), "let b = 1;");
    }

    #[test]
    fn test_replace_same_text_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "keep me\n").unwrap();
        let mut executor = PatchExecutor::new(dir.path(), false).unwrap();

        let result = executor.execute(&file_patch(
            "a.txt",
            replace("keep me", "keep me", MatchMode::Normalized),
        ));
        assert_eq!(result.status, PatchStatus::Skipped);
        assert_eq!(result.message, "Content unchanged");
    }

    #[test]
    fn test_no_match_names_mode() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "val a = 5").unwrap();
        let mut executor = PatchExecutor::new(dir.path(), false).unwrap();

        let mut options = MatchOptions::with_mode(MatchMode::Fuzzy);
        options.fuzzy_threshold = 0.95;
        let result = executor.execute(&file_patch(
            "a.txt",
            PatchAction::Delete {
                find: "val b = 99".into(),
                options,
            },
        ));
        assert_eq!(result.status, PatchStatus::Skipped);
        assert_eq!(result.message, "Block not found (mode: fuzzy)");
    }

    #[test]
    fn test_insert_before_and_after() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.txt");
        fs::write(&path, "one\ntwo\nthree\n").unwrap();
        let mut executor = PatchExecutor::new(dir.path(), false).unwrap();

        let before = executor.execute(&file_patch(
            "list.txt",
            PatchAction::InsertBefore {
                marker: "two".into(),
                content: "one and a half".into(),
                options: MatchOptions::default(),
            },
        ));
        assert_eq!(before.status, PatchStatus::Success);
        assert_eq!(before.message, "Inserted 1 line before line 2 (mode: normalized)");

        let after = executor.execute(&file_patch(
            "list.txt",
            PatchAction::InsertAfter {
                marker: "three".into(),
                content: "four\nfive".into(),
                options: MatchOptions::default(),
            },
        ));
        assert_eq!(after.status, PatchStatus::Success);
        assert_eq!(after.message, "Inserted 2 lines after line 4 (mode: normalized)");
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "one\none and a half\ntwo\nthree\nfour\nfive\n"
        );
    }

    #[test]
    fn test_content_action_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut executor = PatchExecutor::new(dir.path(), false).unwrap();
        let result = executor.execute(&file_patch("nope.txt", replace("a", "b", MatchMode::Contains)));
        assert_eq!(result.status, PatchStatus::FileNotFound);
    }

    #[test]
    fn test_create_and_delete_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut executor = PatchExecutor::new(dir.path(), false).unwrap();

        let created = executor.execute(&file_patch(
            "nested/dir/new.txt",
            PatchAction::CreateFile {
                content: "héllo".into(),
            },
        ));
        assert_eq!(created.status, PatchStatus::Success);
        assert_eq!(created.message, "Created file (5 characters)");
        assert_eq!(created.new_content.as_deref(), Some("héllo"));

        let again = executor.execute(&file_patch(
            "nested/dir/new.txt",
            PatchAction::CreateFile {
                content: "other".into(),
            },
        ));
        assert_eq!(again.status, PatchStatus::Skipped);

        let deleted = executor.execute(&file_patch("nested/dir/new.txt", PatchAction::DeleteFile));
        assert_eq!(deleted.status, PatchStatus::Success);
        assert!(!dir.path().join("nested/dir/new.txt").exists());

        let missing = executor.execute(&file_patch("nested/dir/new.txt", PatchAction::DeleteFile));
        assert_eq!(missing.status, PatchStatus::Skipped);
    }

    #[test]
    fn test_replace_file_requires_target() {
        let dir = tempfile::tempdir().unwrap();
        let mut executor = PatchExecutor::new(dir.path(), false).unwrap();
        let result = executor.execute(&file_patch(
            "a.txt",
            PatchAction::ReplaceFile {
                content: "x".into(),
            },
        ));
        assert_eq!(result.status, PatchStatus::FileNotFound);
    }

    #[test]
    fn test_move_file_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("src.txt"), "source").unwrap();
        fs::write(dir.path().join("dst.txt"), "dest").unwrap();
        let mut executor = PatchExecutor::new(dir.path(), false).unwrap();

        let result = executor.execute(&file_patch(
            "src.txt",
            PatchAction::MoveFile {
                destination: "dst.txt".into(),
                overwrite: false,
            },
        ));
        assert_eq!(result.status, PatchStatus::Failed);
        assert_eq!(fs::read_to_string(dir.path().join("src.txt")).unwrap(), "source");
        assert_eq!(fs::read_to_string(dir.path().join("dst.txt")).unwrap(), "dest");

        let result = executor.execute(&file_patch(
            "src.txt",
            PatchAction::MoveFile {
                destination: "dst.txt".into(),
                overwrite: true,
            },
        ));
        assert_eq!(result.status, PatchStatus::Success);
        assert!(!dir.path().join("src.txt").exists());
        assert_eq!(fs::read_to_string(dir.path().join("dst.txt")).unwrap(), "source");
    }

    #[test]
    fn test_path_escape_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut executor = PatchExecutor::new(dir.path(), false).unwrap();
        let result = executor.execute(&file_patch(
            "../escape.txt",
            PatchAction::CreateFile {
                content: "x".into(),
            },
        ));
        assert_eq!(result.status, PatchStatus::Failed);
        assert!(result.message.contains("outside base directory"));
    }

    #[test]
    fn test_dry_run_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let mut executor = PatchExecutor::new(dir.path(), true).unwrap();

        let created = executor.execute(&file_patch(
            "a.txt",
            PatchAction::CreateFile {
                content: "alpha\nbeta".into(),
            },
        ));
        assert_eq!(created.status, PatchStatus::Success);

        let edited = executor.execute(&file_patch("a.txt", replace("beta", "gamma", MatchMode::Normalized)));
        assert_eq!(edited.status, PatchStatus::Success);
        assert_eq!(edited.new_content.as_deref(), Some("alpha\ngamma"));

        let moved = executor.execute(&file_patch(
            "a.txt",
            PatchAction::MoveFile {
                destination: "b.txt".into(),
                overwrite: false,
            },
        ));
        assert_eq!(moved.status, PatchStatus::Success);

        let gone = executor.execute(&file_patch("a.txt", replace("alpha", "x", MatchMode::Normalized)));
        assert_eq!(gone.status, PatchStatus::FileNotFound);

        assert!(!dir.path().join("a.txt").exists());
        assert!(!dir.path().join("b.txt").exists());
    }
}
