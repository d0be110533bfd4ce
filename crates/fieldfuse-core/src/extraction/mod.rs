//! Page and document extraction.

mod assembler;
mod pipeline;
pub mod slug;

pub use assembler::FieldAssembler;
pub use pipeline::{DocumentExtraction, FormExtractor, FusionEngine, PageExtraction, PageFailure};
pub use slug::{slugify, NameRegistry};
