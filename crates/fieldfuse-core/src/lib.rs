//! Core library for form field fusion.
//!
//! This crate provides:
//! - Coordinate normalization of OCR layout evidence into PDF point space
//! - Label matching of semantic fields against OCR text (exact, token, fuzzy)
//! - Partitioning of lines that carry several fields
//! - Box resolution per visual style (underline, digit boxes, titled boxes,
//!   table cells, selection marks)
//! - Placement of unlabeled fields and final field assembly

pub mod error;
pub mod extraction;
pub mod layout;
pub mod matching;
pub mod models;
pub mod resolve;

#[cfg(test)]
mod fixtures;

pub use error::{ConfigError, FuseError, GeometryError, PageExtractionError, Result};
pub use extraction::{DocumentExtraction, FormExtractor, FusionEngine, PageExtraction, PageFailure};
pub use models::{
    BBox, Diagnostic, DiagnosticKind, Direction, ExtractedField, FieldKind, FieldSource, FuseConfig,
    OcrDocument, OcrPage, SemanticDocument, SemanticPage, Severity,
};
