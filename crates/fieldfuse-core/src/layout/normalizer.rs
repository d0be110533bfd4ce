//! Coordinate normalization from OCR polygons to point-space boxes.
//!
//! OCR polygons are 4 corners in page units (inches by default) with a
//! top-left origin. Boxes are PDF points with a bottom-left origin.

use tracing::{debug, warn};

use super::{KeyValuePair, PageLayout, SelectionMark, Table, TableCell, TextLine, Word};
use crate::error::{GeometryError, PageExtractionError};
use crate::models::{BBox, Diagnostic, DiagnosticKind, OcrPage, PageUnit, Polygon};

/// Slack used when looking for a line enclosing a degenerate element.
const ENCLOSING_TOLERANCE: f64 = 0.5;

/// Page dimensions in the OCR unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageDims {
    pub width: f64,
    pub height: f64,
    pub unit: PageUnit,
}

impl PageDims {
    /// Create dimensions in inches.
    #[cfg(test)]
    pub fn inches(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            unit: PageUnit::Inch,
        }
    }

    /// Dimensions of an OCR page.
    pub fn of_page(page: &OcrPage) -> Self {
        Self {
            width: page.width,
            height: page.height,
            unit: page.unit,
        }
    }

    /// Page width in points.
    pub fn width_pts(&self) -> f64 {
        self.width * self.unit.points_per_unit()
    }

    /// Page height in points.
    pub fn height_pts(&self) -> f64 {
        self.height * self.unit.points_per_unit()
    }

    fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Convert a polygon to a point-space box.
///
/// Fails for non-finite coordinates and for polygons with zero width or height.
pub fn normalize(polygon: &Polygon, dims: &PageDims) -> Result<BBox, GeometryError> {
    if polygon.iter().any(|v| !v.is_finite()) {
        return Err(GeometryError::NonFinite);
    }

    let scale = dims.unit.points_per_unit();
    let xs = polygon.iter().step_by(2);
    let ys = polygon.iter().skip(1).step_by(2);

    let x_min = xs.clone().cloned().fold(f64::INFINITY, f64::min) * scale;
    let x_max = xs.cloned().fold(f64::NEG_INFINITY, f64::max) * scale;
    let y_min = ys.clone().cloned().fold(f64::INFINITY, f64::min) * scale;
    let y_max = ys.cloned().fold(f64::NEG_INFINITY, f64::max) * scale;

    let page_height = dims.height_pts();
    let y_top = page_height - y_min;
    let y_bottom = page_height - y_max;

    let bbox = BBox::from_edges(x_min, y_bottom, x_max, y_top);
    if bbox.width <= 0.0 || bbox.height <= 0.0 {
        return Err(GeometryError::Degenerate {
            width: bbox.width,
            height: bbox.height,
        });
    }

    Ok(bbox)
}

/// Convert a point-space box back to a polygon (TL, TR, BR, BL).
///
/// Exact inverse of [`normalize`].
pub fn to_polygon(bbox: &BBox, dims: &PageDims) -> Polygon {
    let scale = dims.unit.points_per_unit();
    let page_height = dims.height_pts();

    let left = bbox.x / scale;
    let right = bbox.right() / scale;
    let top = (page_height - bbox.top()) / scale;
    let bottom = (page_height - bbox.y) / scale;

    [left, top, right, top, right, bottom, left, bottom]
}

/// Normalizes a whole OCR page, recovering or dropping bad geometry.
pub struct Normalizer {
    dims: PageDims,
    page_number: u32,
}

impl Normalizer {
    /// Create a normalizer for a page.
    pub fn new(page_number: u32, dims: PageDims) -> Self {
        Self { dims, page_number }
    }

    /// Normalize every element of an OCR page.
    ///
    /// Degenerate elements fall back to the smallest enclosing text line box,
    /// or are dropped; each case is reported as a diagnostic.
    pub fn normalize_page(
        page: &OcrPage,
    ) -> Result<(PageLayout, Vec<Diagnostic>), PageExtractionError> {
        let dims = PageDims::of_page(page);
        if !dims.is_valid() {
            return Err(PageExtractionError::InvalidDimensions {
                page: page.page_number,
                width: page.width,
                height: page.height,
            });
        }

        let normalizer = Normalizer::new(page.page_number, dims);
        let mut diagnostics = Vec::new();
        let mut layout = PageLayout::empty(page.page_number, dims.width_pts(), dims.height_pts());

        for line in &page.text_lines {
            if let Some(bbox) =
                normalizer.recover(&line.polygon, &[], "text line", &line.content, &mut diagnostics)
            {
                layout.lines.push(TextLine {
                    content: line.content.clone(),
                    bbox,
                });
            }
        }

        let lines = layout.lines.clone();

        for word in &page.words {
            if let Some(bbox) =
                normalizer.recover(&word.polygon, &lines, "word", &word.content, &mut diagnostics)
            {
                layout.words.push(Word {
                    content: word.content.clone(),
                    bbox,
                });
            }
        }

        for table in &page.tables {
            let cells: Vec<TableCell> = table
                .cells
                .iter()
                .filter_map(|cell| {
                    let bbox = normalizer.recover(
                        &cell.polygon,
                        &lines,
                        "table cell",
                        &cell.content,
                        &mut diagnostics,
                    )?;
                    Some(TableCell {
                        row: cell.row_index,
                        col: cell.column_index,
                        row_span: cell.row_span.max(1),
                        col_span: cell.column_span.max(1),
                        content: cell.content.clone(),
                        bbox,
                    })
                })
                .collect();

            layout.tables.push(Table {
                num_rows: table.row_count,
                num_cols: table.column_count,
                cells,
            });
        }

        for mark in &page.selection_marks {
            if let Some(bbox) =
                normalizer.recover(&mark.polygon, &lines, "selection mark", "", &mut diagnostics)
            {
                layout.marks.push(SelectionMark {
                    state: mark.state,
                    bbox,
                    confidence: mark.confidence,
                });
            }
        }

        for pair in &page.kv_pairs_with_value {
            let key_box =
                normalizer.recover(&pair.key_polygon, &lines, "key", &pair.key, &mut diagnostics);
            let value_box =
                normalizer.recover(&pair.value_polygon, &lines, "value of key", &pair.key, &mut diagnostics);
            if let (Some(key_box), Some(value_box)) = (key_box, value_box) {
                layout.kv_pairs.push(KeyValuePair {
                    key: pair.key.clone(),
                    key_box,
                    value_box,
                    confidence: pair.confidence,
                });
            }
        }

        debug!(
            "Normalized page {}: {} lines, {} words, {} tables, {} marks, {} key-value pairs",
            page.page_number,
            layout.lines.len(),
            layout.words.len(),
            layout.tables.len(),
            layout.marks.len(),
            layout.kv_pairs.len()
        );

        Ok((layout, diagnostics))
    }

    /// Normalize one polygon, falling back to an enclosing line box.
    fn recover(
        &self,
        polygon: &Polygon,
        lines: &[TextLine],
        element: &str,
        content: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<BBox> {
        let err = match normalize(polygon, &self.dims) {
            Ok(bbox) => return Some(bbox),
            Err(err) => err,
        };

        let fallback = match err {
            GeometryError::NonFinite => None,
            GeometryError::Degenerate { .. } => self.enclosing_line(polygon, lines),
        };

        let subject = if content.is_empty() {
            element.to_string()
        } else {
            format!("{} '{}'", element, content)
        };
        let (message, result) = match fallback {
            Some(bbox) => (format!("{}: {}; substituted enclosing line box", subject, err), Some(bbox)),
            None => (format!("{}: {}; dropped", subject, err), None),
        };

        warn!("Page {}: {}", self.page_number, message);
        diagnostics.push(Diagnostic::warning(
            self.page_number,
            DiagnosticKind::DegenerateGeometry,
            message,
        ));

        result
    }

    /// Smallest line box containing the center of a (finite) polygon.
    fn enclosing_line(&self, polygon: &Polygon, lines: &[TextLine]) -> Option<BBox> {
        let scale = self.dims.unit.points_per_unit();
        let cx = polygon.iter().step_by(2).sum::<f64>() / 4.0 * scale;
        let cy = self.dims.height_pts() - polygon.iter().skip(1).step_by(2).sum::<f64>() / 4.0 * scale;

        lines
            .iter()
            .filter(|l| l.bbox.contains_point(cx, cy, ENCLOSING_TOLERANCE))
            .min_by(|a, b| a.bbox.area().total_cmp(&b.bbox.area()))
            .map(|l| l.bbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OcrKeyValuePair, OcrLine, OcrWord};
    use proptest::prelude::*;

    fn letter() -> PageDims {
        PageDims::inches(8.5, 11.0)
    }

    #[test]
    fn test_normalize_flips_origin() {
        // 1in from the left, 1in from the top, 2in wide, 0.5in tall
        let polygon = [1.0, 1.0, 3.0, 1.0, 3.0, 1.5, 1.0, 1.5];
        let bbox = normalize(&polygon, &letter()).unwrap();

        assert_eq!(bbox.x, 72.0);
        assert_eq!(bbox.width, 144.0);
        assert_eq!(bbox.top(), 792.0 - 72.0);
        assert_eq!(bbox.height, 36.0);
    }

    #[test]
    fn test_normalize_rejects_degenerate() {
        let zero_width = [1.0, 1.0, 1.0, 1.0, 1.0, 1.5, 1.0, 1.5];
        assert!(matches!(
            normalize(&zero_width, &letter()),
            Err(GeometryError::Degenerate { .. })
        ));

        let non_finite = [1.0, f64::NAN, 3.0, 1.0, 3.0, 1.5, 1.0, 1.5];
        assert_eq!(normalize(&non_finite, &letter()), Err(GeometryError::NonFinite));
    }

    #[test]
    fn test_round_trip_known_box() {
        let bbox = BBox::new(395.0, 400.0, 15.0, 15.0);
        let back = normalize(&to_polygon(&bbox, &letter()), &letter()).unwrap();
        assert!((back.x - bbox.x).abs() < 1e-6);
        assert!((back.y - bbox.y).abs() < 1e-6);
        assert!((back.width - bbox.width).abs() < 1e-6);
        assert!((back.height - bbox.height).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn prop_round_trip(
            x in 0.0f64..600.0,
            y in 0.0f64..780.0,
            width in 0.5f64..300.0,
            height in 0.5f64..100.0,
            page_height in 500.0f64..1200.0,
        ) {
            let dims = PageDims::inches(8.5, page_height / 72.0);
            let bbox = BBox::new(x, y, width, height);
            let back = normalize(&to_polygon(&bbox, &dims), &dims).unwrap();
            prop_assert!((back.x - bbox.x).abs() < 1e-6);
            prop_assert!((back.y - bbox.y).abs() < 1e-6);
            prop_assert!((back.width - bbox.width).abs() < 1e-6);
            prop_assert!((back.height - bbox.height).abs() < 1e-6);
        }
    }

    fn page_with(lines: Vec<OcrLine>, words: Vec<OcrWord>) -> OcrPage {
        OcrPage {
            page_number: 1,
            width: 8.5,
            height: 11.0,
            unit: PageUnit::Inch,
            text_lines: lines,
            words,
            tables: Vec::new(),
            selection_marks: Vec::new(),
            kv_pairs_with_value: Vec::new(),
        }
    }

    #[test]
    fn test_degenerate_word_uses_enclosing_line() {
        let line_box = BBox::new(100.0, 700.0, 200.0, 12.0);
        let line = OcrLine {
            content: "שם הסוכן:".to_string(),
            polygon: to_polygon(&line_box, &letter()),
        };
        // zero-width word in the middle of the line
        let x = 150.0 / 72.0;
        let top = (792.0 - 712.0) / 72.0;
        let bottom = (792.0 - 700.0) / 72.0;
        let word = OcrWord {
            content: "שם".to_string(),
            polygon: [x, top, x, top, x, bottom, x, bottom],
            confidence: None,
        };

        let (layout, diagnostics) =
            Normalizer::normalize_page(&page_with(vec![line], vec![word])).unwrap();

        assert_eq!(layout.words.len(), 1);
        assert!(layout.words[0].bbox.width > 0.0);
        assert!((layout.words[0].bbox.x - 100.0).abs() < 1e-6);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::DegenerateGeometry);
    }

    #[test]
    fn test_degenerate_word_without_line_is_dropped() {
        let word = OcrWord {
            content: "x".to_string(),
            polygon: [1.0, 1.0, 1.0, 1.0, 1.0, 1.2, 1.0, 1.2],
            confidence: None,
        };

        let (layout, diagnostics) =
            Normalizer::normalize_page(&page_with(Vec::new(), vec![word])).unwrap();

        assert!(layout.words.is_empty());
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("dropped"));
    }

    #[test]
    fn test_degenerate_kv_value_names_its_key() {
        let mut page = page_with(Vec::new(), Vec::new());
        page.kv_pairs_with_value.push(OcrKeyValuePair {
            key: "Name".to_string(),
            key_polygon: [1.0, 1.0, 1.5, 1.0, 1.5, 1.2, 1.0, 1.2],
            value_polygon: [2.0, 1.0, 2.0, 1.0, 2.0, 1.2, 2.0, 1.2],
            confidence: 0.9,
        });

        let (layout, diagnostics) = Normalizer::normalize_page(&page).unwrap();

        assert!(layout.kv_pairs.is_empty());
        assert!(layout.words.is_empty() && layout.lines.is_empty());
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.starts_with("value of key 'Name':"));
        assert_eq!(diagnostics[0].label, None);
    }

    #[test]
    fn test_invalid_page_dimensions() {
        let mut page = page_with(Vec::new(), Vec::new());
        page.height = 0.0;
        assert!(matches!(
            Normalizer::normalize_page(&page),
            Err(PageExtractionError::InvalidDimensions { page: 1, .. })
        ));
    }
}
