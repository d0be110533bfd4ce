//! Locating semantic labels in OCR text and splitting shared lines.

pub mod matcher;
pub mod partition;
pub mod rows;
pub mod text;

pub use matcher::{
    Candidate, ExactLineStrategy, FuzzyStrategy, LabelMatch, LabelMatcher, MatchContext,
    MatchMethod, MatchStrategy, TokenRunStrategy,
};
pub use partition::{
    related_mismatches, FieldAnchor, LinePartition, MismatchReason, RelatedMismatch,
    RowPartitioner, WordCluster,
};
pub use rows::{PageText, TextRow};
pub use text::normalize_label;
