//! Test page builders.

use crate::layout::{to_polygon, Normalizer, PageDims, PageLayout};
use crate::models::{
    BBox, FieldStyle, InputType, MarkState, OcrKeyValuePair, OcrLine, OcrPage, OcrSelectionMark,
    OcrTable, OcrTableCell, OcrWord, PageUnit, Polygon, RelativePosition, SemanticField,
    SemanticPage, UnlabeledFieldHint,
};

/// Letter-size page in points.
pub const PAGE_WIDTH: f64 = 612.0;
pub const PAGE_HEIGHT: f64 = 792.0;

/// Builds OCR pages from point-space boxes.
pub struct PageBuilder {
    page: OcrPage,
}

impl PageBuilder {
    pub fn new() -> Self {
        Self {
            page: OcrPage {
                page_number: 1,
                width: PAGE_WIDTH,
                height: PAGE_HEIGHT,
                unit: PageUnit::Point,
                text_lines: Vec::new(),
                words: Vec::new(),
                tables: Vec::new(),
                selection_marks: Vec::new(),
                kv_pairs_with_value: Vec::new(),
            },
        }
    }

    /// Emit polygons in inches, the usual OCR unit. Call before adding elements.
    pub fn inches(mut self) -> Self {
        self.page.width = PAGE_WIDTH / 72.0;
        self.page.height = PAGE_HEIGHT / 72.0;
        self.page.unit = PageUnit::Inch;
        self
    }

    pub fn page_number(mut self, page_number: u32) -> Self {
        self.page.page_number = page_number;
        self
    }

    fn polygon(&self, bbox: &BBox) -> Polygon {
        to_polygon(bbox, &PageDims::of_page(&self.page))
    }

    pub fn line(mut self, content: &str, bbox: BBox) -> Self {
        let polygon = self.polygon(&bbox);
        self.page.text_lines.push(OcrLine {
            content: content.to_string(),
            polygon,
        });
        self
    }

    /// A line whose box is the union of its words.
    pub fn line_with_words(mut self, content: &str, words: &[(&str, BBox)]) -> Self {
        let bbox = BBox::union_all(words.iter().map(|(_, b)| b)).expect("line needs words");
        self = self.line(content, bbox);
        for (word, bbox) in words {
            self = self.word(word, *bbox);
        }
        self
    }

    pub fn word(mut self, content: &str, bbox: BBox) -> Self {
        let polygon = self.polygon(&bbox);
        self.page.words.push(OcrWord {
            content: content.to_string(),
            polygon,
            confidence: Some(0.99),
        });
        self
    }

    /// A word with a raw polygon, for broken geometry.
    pub fn raw_word(mut self, content: &str, polygon: Polygon) -> Self {
        self.page.words.push(OcrWord {
            content: content.to_string(),
            polygon,
            confidence: None,
        });
        self
    }

    pub fn mark(mut self, state: MarkState, bbox: BBox) -> Self {
        let polygon = self.polygon(&bbox);
        self.page.selection_marks.push(OcrSelectionMark {
            state,
            polygon,
            confidence: 0.9,
        });
        self
    }

    /// A table from `(row, col, content, box)` cells.
    pub fn table(mut self, rows: usize, cols: usize, cells: &[(usize, usize, &str, BBox)]) -> Self {
        let cells = cells
            .iter()
            .map(|(row, col, content, bbox)| OcrTableCell {
                row_index: *row,
                column_index: *col,
                row_span: 1,
                column_span: 1,
                content: content.to_string(),
                polygon: self.polygon(bbox),
            })
            .collect();
        self.page.tables.push(OcrTable {
            row_count: rows,
            column_count: cols,
            cells,
        });
        self
    }

    pub fn kv(mut self, key: &str, key_box: BBox, value_box: BBox) -> Self {
        let key_polygon = self.polygon(&key_box);
        let value_polygon = self.polygon(&value_box);
        self.page.kv_pairs_with_value.push(OcrKeyValuePair {
            key: key.to_string(),
            key_polygon,
            value_polygon,
            confidence: 0.9,
        });
        self
    }

    pub fn build(self) -> OcrPage {
        self.page
    }

    pub fn layout(self) -> PageLayout {
        Normalizer::normalize_page(&self.page).expect("valid page").0
    }
}

/// A semantic field with no optional attributes.
pub fn field(label: &str, style: FieldStyle, input: InputType) -> SemanticField {
    SemanticField {
        label_text: label.to_string(),
        field_type: style,
        input_type: input,
        section: None,
        required: false,
        row_group: None,
        related_fields: Vec::new(),
        has_visible_boundary: None,
        visual_description: None,
        name: None,
        digit_count: None,
    }
}

/// An unlabeled text hint.
pub fn hint(nearby: &str, position: RelativePosition, description: &str) -> UnlabeledFieldHint {
    UnlabeledFieldHint {
        field_type: FieldStyle::Underline,
        input_type: InputType::Text,
        section: None,
        visual_description: description.to_string(),
        nearby_text: nearby.to_string(),
        relative_position: position,
    }
}

pub fn semantic_page(page_number: u32, fields: Vec<SemanticField>) -> SemanticPage {
    SemanticPage {
        page_number,
        page_width: None,
        page_height: None,
        fields,
        unlabeled_fields: Vec::new(),
    }
}
