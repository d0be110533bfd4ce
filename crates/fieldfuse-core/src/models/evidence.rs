//! Input evidence: geometric layout from the OCR service and field semantics
//! from the analysis service.
//!
//! Both shapes deserialize from the camelCase JSON the upstream services emit.
//! Raw polygons are only ever read by the coordinate normalizer.

use serde::{Deserialize, Serialize};

use super::geometry::POINTS_PER_INCH;

/// Four corner points (x, y pairs) clockwise from top-left, top-left page origin.
pub type Polygon = [f64; 8];

/// Unit used by OCR polygons and page dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageUnit {
    /// Inches (the layout service default).
    #[default]
    Inch,
    /// PDF points.
    Point,
}

impl PageUnit {
    /// Scale factor from this unit to PDF points.
    pub fn points_per_unit(&self) -> f64 {
        match self {
            PageUnit::Inch => POINTS_PER_INCH,
            PageUnit::Point => 1.0,
        }
    }
}

/// OCR evidence for a whole document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrDocument {
    pub pages: Vec<OcrPage>,
}

/// Geometric evidence for one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrPage {
    /// 1-based page number.
    pub page_number: u32,
    /// Page width in `unit`.
    pub width: f64,
    /// Page height in `unit`.
    pub height: f64,
    #[serde(default)]
    pub unit: PageUnit,
    #[serde(default)]
    pub text_lines: Vec<OcrLine>,
    #[serde(default)]
    pub words: Vec<OcrWord>,
    #[serde(default)]
    pub tables: Vec<OcrTable>,
    #[serde(default)]
    pub selection_marks: Vec<OcrSelectionMark>,
    #[serde(default)]
    pub kv_pairs_with_value: Vec<OcrKeyValuePair>,
}

impl OcrPage {
    /// Page width in PDF points.
    pub fn width_pts(&self) -> f64 {
        self.width * self.unit.points_per_unit()
    }

    /// Page height in PDF points.
    pub fn height_pts(&self) -> f64 {
        self.height * self.unit.points_per_unit()
    }
}

/// A text line reported by the layout service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrLine {
    pub content: String,
    pub polygon: Polygon,
}

/// A single word reported by the layout service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrWord {
    pub content: String,
    pub polygon: Polygon,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// A table with its cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrTable {
    pub row_count: usize,
    pub column_count: usize,
    pub cells: Vec<OcrTableCell>,
}

/// A table cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrTableCell {
    pub row_index: usize,
    pub column_index: usize,
    #[serde(default = "default_span")]
    pub row_span: usize,
    #[serde(default = "default_span")]
    pub column_span: usize,
    #[serde(default)]
    pub content: String,
    pub polygon: Polygon,
}

fn default_span() -> usize {
    1
}

/// State of a selection mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkState {
    Selected,
    Unselected,
}

/// A detected checkbox or radio glyph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrSelectionMark {
    pub state: MarkState,
    pub polygon: Polygon,
    pub confidence: f64,
}

/// A key-value pair whose value region was detected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrKeyValuePair {
    pub key: String,
    pub key_polygon: Polygon,
    pub value_polygon: Polygon,
    pub confidence: f64,
}

/// Visual style of a field as classified by the semantic service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStyle {
    Underline,
    BoxWithTitle,
    DigitBoxes,
    TableCell,
    TitleRight,
    SelectionMark,
}

impl FieldStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldStyle::Underline => "underline",
            FieldStyle::BoxWithTitle => "box_with_title",
            FieldStyle::DigitBoxes => "digit_boxes",
            FieldStyle::TableCell => "table_cell",
            FieldStyle::TitleRight => "title_right",
            FieldStyle::SelectionMark => "selection_mark",
        }
    }
}

/// Kind of input the semantic service expects in a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Text,
    Checkbox,
    Radio,
    Signature,
    Dropdown,
    Date,
    Number,
}

/// Where an unlabeled field sits relative to its nearby text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelativePosition {
    Left,
    Right,
    Above,
    Below,
}

/// A field reported by the semantic service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticField {
    pub label_text: String,
    pub field_type: FieldStyle,
    pub input_type: InputType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_group: Option<String>,
    /// Labels of fields expected on the same row.
    #[serde(default)]
    pub related_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_visible_boundary: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_description: Option<String>,
    /// Machine key suggested by the semantic service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Explicit number of digit boxes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digit_count: Option<u32>,
}

/// A field the semantic service detected but could not attach a label to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlabeledFieldHint {
    pub field_type: FieldStyle,
    pub input_type: InputType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub visual_description: String,
    pub nearby_text: String,
    pub relative_position: RelativePosition,
}

/// Semantic evidence for one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticPage {
    pub page_number: u32,
    /// Page width in points, when the analysis service reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_width: Option<f64>,
    /// Page height in points, when the analysis service reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_height: Option<f64>,
    #[serde(default)]
    pub fields: Vec<SemanticField>,
    #[serde(default)]
    pub unlabeled_fields: Vec<UnlabeledFieldHint>,
}

/// Semantic evidence for a whole document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticDocument {
    pub pages: Vec<SemanticPage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_semantic_field() {
        let json = r#"{
            "labelText": "שם הסוכן",
            "fieldType": "underline",
            "inputType": "text",
            "required": true,
            "rowGroup": "row_1",
            "relatedFields": ["מס' הסוכן"],
            "name": "agent_name"
        }"#;

        let field: SemanticField = serde_json::from_str(json).unwrap();
        assert_eq!(field.field_type, FieldStyle::Underline);
        assert_eq!(field.input_type, InputType::Text);
        assert_eq!(field.row_group.as_deref(), Some("row_1"));
        assert_eq!(field.related_fields.len(), 1);
        assert!(field.digit_count.is_none());
    }

    #[test]
    fn test_deserialize_ocr_page_defaults() {
        let json = r#"{
            "pageNumber": 1,
            "width": 8.5,
            "height": 11,
            "textLines": [
                {"content": "עיר:", "polygon": [1, 1, 2, 1, 2, 1.2, 1, 1.2]}
            ],
            "tables": [{
                "rowCount": 1,
                "columnCount": 1,
                "cells": [{"rowIndex": 0, "columnIndex": 0, "polygon": [1, 2, 2, 2, 2, 3, 1, 3]}]
            }]
        }"#;

        let page: OcrPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.unit, PageUnit::Inch);
        assert_eq!(page.height_pts(), 792.0);
        assert!(page.words.is_empty());
        assert_eq!(page.tables[0].cells[0].row_span, 1);
        assert_eq!(page.tables[0].cells[0].content, "");
    }
}
