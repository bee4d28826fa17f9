use crate::matching::MatchResult;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// Byte-span replacement with verification.
///
/// Every content action compiles down to one of these: the matcher supplies
/// the span and the text it saw there, the action supplies `new_text`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Edit does nothing until splice() is called"]
pub struct Edit {
    /// Starting byte offset (inclusive)
    pub byte_start: usize,
    /// Ending byte offset (exclusive)
    pub byte_end: usize,
    /// Text that takes the place of [byte_start, byte_end)
    pub new_text: String,
    /// What the span must still hold when the edit is spliced
    pub expected_before: EditVerification,
}

/// Verification strategy for edit safety.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (used for large spans)
    Hash(u64),
}

impl EditVerification {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    /// Hash for text over 1 KiB, exact comparison otherwise.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            EditVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            EditVerification::ExactMatch(text.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("Before-text verification failed at bytes [{byte_start}, {byte_end}): found {found:?}")]
    BeforeTextMismatch {
        byte_start: usize,
        byte_end: usize,
        found: String,
    },

    #[error("Invalid byte range: [{byte_start}, {byte_end}) in content of length {len}")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        len: usize,
    },

    #[error("Byte offset {0} is not on a character boundary")]
    NotCharBoundary(usize),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Edit {
    pub fn new(
        byte_start: usize,
        byte_end: usize,
        new_text: impl Into<String>,
        expected_before: &str,
    ) -> Self {
        Self {
            byte_start,
            byte_end,
            new_text: new_text.into(),
            expected_before: EditVerification::from_text(expected_before),
        }
    }

    /// Replace the matched span with `new_text`.
    pub fn replace(found: &MatchResult, new_text: impl Into<String>) -> Self {
        Self::new(found.offset, found.end(), new_text, &found.matched_text)
    }

    /// Zero-width insertion at `at`.
    pub fn insert(at: usize, new_text: impl Into<String>) -> Self {
        Self::new(at, at, new_text, "")
    }

    /// Current text at the span, once the range and its boundaries check out.
    fn validate<'a>(&self, content: &'a str) -> Result<&'a str, EditError> {
        if self.byte_start > self.byte_end || self.byte_end > content.len() {
            return Err(EditError::InvalidByteRange {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                len: content.len(),
            });
        }
        for offset in [self.byte_start, self.byte_end] {
            if !content.is_char_boundary(offset) {
                return Err(EditError::NotCharBoundary(offset));
            }
        }

        let current = &content[self.byte_start..self.byte_end];
        if !self.expected_before.matches(current) {
            return Err(EditError::BeforeTextMismatch {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                found: current.to_string(),
            });
        }
        Ok(current)
    }

    /// Produce `content` with this edit applied.
    pub fn splice(&self, content: &str) -> Result<String, EditError> {
        let current = self.validate(content)?;
        let mut out =
            String::with_capacity(content.len() - current.len() + self.new_text.len());
        out.push_str(&content[..self.byte_start]);
        out.push_str(&self.new_text);
        out.push_str(&content[self.byte_end..]);
        Ok(out)
    }
}

/// Atomic file write: tempfile in the target's directory, fsync, rename.
///
/// Either the full write lands or the previous content stays in place.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), EditError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        Some(_) => Path::new("."),
        None => {
            return Err(EditError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Path has no parent directory",
            )))
        }
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}
