//! Turning matched labels into input boxes.
//!
//! [`BoxResolver`] handles labeled fields by visual style, [`UnlabeledPlacer`]
//! places hints and fields the resolver could not position.

pub mod marks;
pub mod placer;
pub mod resolver;

pub use marks::ClaimedMarks;
pub use placer::UnlabeledPlacer;
pub use resolver::{digit_count, BoxResolver, FieldGeometry, Resolution};

use crate::models::{BBox, FieldKind};

/// Confidence floor after penalties.
pub const MIN_CONFIDENCE: f64 = 0.1;

/// Deduction per penalty.
pub const PENALTY: f64 = 0.1;

/// How a field's box was obtained, from most to least certain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfidenceBasis {
    /// Only field on its line, box taken from page geometry.
    LineMatch,
    /// The line was shared and had to be partitioned.
    Partitioned,
    /// The resolver fell back to default geometry.
    Synthesized,
    /// Placed next to an anchor without label geometry.
    Placed,
}

impl ConfidenceBasis {
    /// Confidence before penalties.
    pub fn base(&self) -> f64 {
        match self {
            ConfidenceBasis::LineMatch => 1.0,
            ConfidenceBasis::Partitioned => 0.8,
            ConfidenceBasis::Synthesized => 0.6,
            ConfidenceBasis::Placed => 0.5,
        }
    }
}

/// Which evidence record a resolved field came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Index into the page's semantic fields.
    Semantic(usize),
    /// Index into the page's unlabeled hints.
    Unlabeled(usize),
}

/// A positioned field before naming and ordering.
#[derive(Debug, Clone)]
pub struct ResolvedField {
    pub provenance: Provenance,
    pub label: String,
    /// Suggested machine key, preferred over the label for the slug.
    pub name_hint: Option<String>,
    pub kind: FieldKind,
    pub required: bool,
    pub section: Option<String>,
    pub row_group: Option<String>,
    pub bbox: BBox,
    pub segments: Option<Vec<BBox>>,
    pub basis: ConfidenceBasis,
    /// Number of 0.1 deductions.
    pub penalties: u32,
}

impl ResolvedField {
    /// Base confidence minus penalties, floored and rounded to two decimals.
    pub fn confidence(&self) -> f64 {
        let raw = (self.basis.base() - PENALTY * self.penalties as f64).max(MIN_CONFIDENCE);
        (raw * 100.0).round() / 100.0
    }

    /// Move the field (and its segments) vertically.
    pub fn shift_y(&mut self, dy: f64) {
        self.bbox.y += dy;
        if let Some(segments) = &mut self.segments {
            for segment in segments {
                segment.y += dy;
            }
        }
    }
}
