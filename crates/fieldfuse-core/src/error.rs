//! Error types for the fieldfuse-core library.

use thiserror::Error;

/// Main error type for the fieldfuse library.
#[derive(Error, Debug)]
pub enum FuseError {
    /// Fatal evidence-shape problem for a page.
    #[error("page extraction error: {0}")]
    Page(#[from] PageExtractionError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Fatal per-page errors: the two evidence sources disagree about the page.
///
/// No partial output is produced for a page that fails with one of these.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PageExtractionError {
    /// The OCR and semantic records describe different pages.
    #[error("page number mismatch: OCR page {ocr}, semantic page {semantic}")]
    PageNumberMismatch { ocr: u32, semantic: u32 },

    /// Page dimensions disagree between the two sources.
    #[error(
        "page {page} dimensions disagree: OCR {ocr_width:.1}x{ocr_height:.1} pt, \
         semantic {semantic_width:.1}x{semantic_height:.1} pt"
    )]
    DimensionMismatch {
        page: u32,
        ocr_width: f64,
        ocr_height: f64,
        semantic_width: f64,
        semantic_height: f64,
    },

    /// Page dimensions are non-finite or not positive.
    #[error("page {page} has invalid dimensions {width}x{height}")]
    InvalidDimensions { page: u32, width: f64, height: f64 },

    /// An OCR page has no semantic counterpart.
    #[error("OCR page {0} has no semantic counterpart")]
    MissingSemanticPage(u32),

    /// A semantic page has no OCR counterpart.
    #[error("semantic page {0} has no OCR counterpart")]
    MissingOcrPage(u32),

    /// The same page number appears more than once in one source.
    #[error("page {0} appears more than once")]
    DuplicatePage(u32),
}

impl PageExtractionError {
    /// Page number the error refers to.
    pub fn page_number(&self) -> u32 {
        match self {
            Self::PageNumberMismatch { ocr, .. } => *ocr,
            Self::DimensionMismatch { page, .. } | Self::InvalidDimensions { page, .. } => *page,
            Self::MissingSemanticPage(page)
            | Self::MissingOcrPage(page)
            | Self::DuplicatePage(page) => *page,
        }
    }
}

/// Errors raised when converting a raw polygon into a box.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum GeometryError {
    /// At least one coordinate is NaN or infinite.
    #[error("polygon has a non-finite coordinate")]
    NonFinite,

    /// The polygon collapses to a line or a point.
    #[error("polygon is degenerate ({width:.3}x{height:.3} pt)")]
    Degenerate { width: f64, height: f64 },
}

/// Invalid configuration values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A value is outside its allowed range.
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },

    /// No such configuration key.
    #[error("unknown configuration key: {0}")]
    UnknownKey(String),
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for the fieldfuse library.
pub type Result<T> = std::result::Result<T, FuseError>;
