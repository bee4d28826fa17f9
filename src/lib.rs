//! Robust Patcher: apply human-written patch documents to a source tree
//!
//! A patch document names target files and, per file, an action plus a
//! description of *where* it applies. The text on disk may have drifted from
//! what the patch author saw (whitespace, comments, line endings,
//! indentation, small renames); the matching strategies tolerate that drift
//! up to a configured threshold.
//!
//! # Architecture
//!
//! - [`patch`] parses a document into typed [`FilePatch`]es.
//! - [`matching`] locates a find/marker block in file content and returns a
//!   span into the *original* text.
//! - Every content action compiles down to a single primitive, [`Edit`]: a
//!   verified byte-span replacement.
//! - [`executor`] runs one file patch; [`service`] runs a whole document and
//!   aggregates the results.
//!
//! # Safety
//!
//! - Edits verify the matched text is still in place before splicing
//! - Atomic file writes (tempfile + fsync + rename)
//! - Target paths cannot leave the base directory
//! - Dry runs stage changes in memory and never touch the filesystem
//!
//! # Example
//!
//! ```no_run
//! use robust_patcher::service::{apply, ApplyOptions};
//! use std::path::Path;
//!
//! let document = std::fs::read_to_string("fix-port.md").unwrap();
//! let report = apply(&document, Path::new("."), &ApplyOptions::default()).unwrap();
//! for result in &report.results {
//!     println!("{} {}: {}", result.status, result.file, result.message);
//! }
//! ```

pub mod config;
pub mod edit;
pub mod executor;
pub mod matching;
pub mod patch;
pub mod safety;
pub mod service;
pub mod signature;
pub mod text;

// Re-exports
pub use config::{ConfigError, MatchDefaults, PatcherConfig};
pub use edit::{Edit, EditError, EditVerification};
pub use executor::PatchExecutor;
pub use matching::{find_match, MatchResult};
pub use patch::{
    parse, AnchorOptions, AnchorScope, FilePatch, FilePatchResult, MatchMode, MatchOptions,
    ParseError, PatchAction, PatchDocument, PatchMetadata, PatchParser, PatchStatus,
};
pub use safety::{SafetyError, WorkspaceGuard};
pub use service::{apply, validate, ApplyError, ApplyOptions, ApplyReport, ApplyStats, ValidateReport};
pub use signature::{ClassSignature, FunctionSignature, Parameter};
