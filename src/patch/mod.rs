//! Patch documents: the data model and the text grammar that produces it.

pub mod errors;
pub mod model;
pub mod parser;

pub use errors::ParseError;
pub use model::{
    AnchorOptions, AnchorScope, FilePatch, FilePatchResult, MatchMode, MatchOptions, PatchAction,
    PatchDocument, PatchMetadata, PatchStatus,
};
pub use parser::{parse, PatchParser};
