pub mod levenshtein;
pub mod normalize;

pub use levenshtein::{bounded_distance, bounded_str_distance, meets_threshold, similarity, str_similarity};
pub use normalize::{
    apply_indent, extract_indent, line_number_at, line_spans, normalize_for_matching,
    normalize_line_endings, prepare_for_file, LineEnding, LineSpan, NormalizeFlags,
};
