//! Engine output: positioned fields ready for the form editor.

use serde::{Deserialize, Serialize};

use super::evidence::{FieldStyle, InputType};
use super::geometry::BBox;

/// Text direction of a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Ltr,
    Rtl,
}

impl Direction {
    pub fn is_rtl(&self) -> bool {
        matches!(self, Direction::Rtl)
    }
}

/// Normalized input kind of an extracted field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Checkbox,
    Radio,
    Signature,
    Dropdown,
    Date,
    Number,
}

impl FieldKind {
    /// Combine the visual style and the expected input into one editor kind.
    pub fn from_semantic(style: FieldStyle, input: InputType) -> Self {
        match (style, input) {
            (_, InputType::Signature) => FieldKind::Signature,
            (_, InputType::Radio) => FieldKind::Radio,
            (FieldStyle::SelectionMark, _) | (_, InputType::Checkbox) => FieldKind::Checkbox,
            (_, InputType::Dropdown) => FieldKind::Dropdown,
            (_, InputType::Date) => FieldKind::Date,
            (_, InputType::Number) => FieldKind::Number,
            (_, InputType::Text) => FieldKind::Text,
        }
    }

    /// Get the kind name as used in CSV and text output.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Checkbox => "checkbox",
            FieldKind::Radio => "radio",
            FieldKind::Signature => "signature",
            FieldKind::Dropdown => "dropdown",
            FieldKind::Date => "date",
            FieldKind::Number => "number",
        }
    }
}

/// Which evidence record a field was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldSource {
    /// A labeled semantic field.
    Semantic,
    /// An unlabeled field hint.
    Unlabeled,
}

/// A fillable field positioned on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedField {
    /// 1-based identifier, increasing in output order.
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    /// Slug unique within the page.
    pub name: String,
    pub label: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub page_number: u32,
    pub direction: Direction,
    pub required: bool,
    /// Placement confidence in [0.1, 1.0].
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_group: Option<String>,
    /// Individual boxes of a digit-box field, left to right.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<BBox>>,
    pub source: FieldSource,
}

impl ExtractedField {
    /// Bounding box of the input area.
    pub fn bbox(&self) -> BBox {
        BBox::new(self.x, self.y, self.width, self.height)
    }
}
