//! Data models: evidence inputs, engine output and configuration.

pub mod config;
pub mod diagnostic;
pub mod evidence;
pub mod field;
pub mod geometry;

pub use config::{FuseConfig, CONFIG_KEYS};
pub use diagnostic::{Diagnostic, DiagnosticKind, Severity};
pub use evidence::*;
pub use field::{Direction, ExtractedField, FieldKind, FieldSource};
pub use geometry::{BBox, POINTS_PER_INCH};
