//! Text rows: OCR lines with their words in reading order.

use crate::layout::{dominant_direction, sort_reading_order, PageLayout, TextLine, Word};
use crate::models::{BBox, Direction};

use super::text::normalize_label;

/// Slack when deciding whether a word belongs to a line.
const LINE_MEMBERSHIP_TOLERANCE: f64 = 1.0;

/// An OCR line with its words, or a band of words no line claimed.
#[derive(Debug, Clone)]
pub struct TextRow {
    /// Index into `PageLayout::lines`, `None` for rows built from orphan words.
    pub line_index: Option<usize>,
    pub line: TextLine,
    /// Dominant script direction of the line content.
    pub direction: Direction,
    /// Words in reading order.
    pub words: Vec<Word>,
    /// Normalized line content.
    pub normalized: String,
}

impl TextRow {
    fn new(line_index: Option<usize>, line: TextLine, mut words: Vec<Word>) -> Self {
        let direction = dominant_direction(&line.content);
        sort_reading_order(&mut words, direction);
        let normalized = normalize_label(&line.content);
        Self {
            line_index,
            line,
            direction,
            words,
            normalized,
        }
    }
}

/// All text rows of a page in document order (top to bottom).
#[derive(Debug, Clone)]
pub struct PageText {
    rows: Vec<TextRow>,
}

impl PageText {
    /// Group the page's words under their lines.
    ///
    /// Words outside every line are grouped into synthetic rows by vertical band.
    pub fn build(layout: &PageLayout, row_tolerance: f64) -> Self {
        let mut line_words: Vec<Vec<Word>> = vec![Vec::new(); layout.lines.len()];
        let mut orphans: Vec<Word> = Vec::new();

        for word in &layout.words {
            let (cx, cy) = word.bbox.center();
            let owner = layout
                .lines
                .iter()
                .enumerate()
                .filter(|(_, l)| l.bbox.contains_point(cx, cy, LINE_MEMBERSHIP_TOLERANCE))
                .max_by(|(_, a), (_, b)| {
                    a.bbox
                        .vertical_overlap(&word.bbox)
                        .total_cmp(&b.bbox.vertical_overlap(&word.bbox))
                })
                .map(|(i, _)| i);

            match owner {
                Some(i) => line_words[i].push(word.clone()),
                None => orphans.push(word.clone()),
            }
        }

        let mut rows: Vec<TextRow> = layout
            .lines
            .iter()
            .cloned()
            .zip(line_words)
            .enumerate()
            .map(|(i, (line, words))| TextRow::new(Some(i), line, words))
            .collect();

        rows.extend(Self::orphan_rows(orphans, row_tolerance));

        rows.sort_by(|a, b| {
            b.line
                .bbox
                .center_y()
                .total_cmp(&a.line.bbox.center_y())
                .then(a.line.bbox.x.total_cmp(&b.line.bbox.x))
        });

        Self { rows }
    }

    fn orphan_rows(mut orphans: Vec<Word>, row_tolerance: f64) -> Vec<TextRow> {
        orphans.sort_by(|a, b| b.bbox.center_y().total_cmp(&a.bbox.center_y()));

        let mut bands: Vec<Vec<Word>> = Vec::new();
        for word in orphans {
            match bands.last_mut() {
                Some(band)
                    if (band[0].bbox.center_y() - word.bbox.center_y()).abs() <= row_tolerance =>
                {
                    band.push(word)
                }
                _ => bands.push(vec![word]),
            }
        }

        bands
            .into_iter()
            .filter_map(|mut band| {
                let unordered: String =
                    band.iter().map(|w| w.content.as_str()).collect::<Vec<_>>().join(" ");
                sort_reading_order(&mut band, dominant_direction(&unordered));
                let bbox = BBox::union_all(band.iter().map(|w| &w.bbox))?;
                let content = band.iter().map(|w| w.content.as_str()).collect::<Vec<_>>().join(" ");
                Some(TextRow::new(None, TextLine { content, bbox }, band))
            })
            .collect()
    }

    /// Rows in document order.
    pub fn rows(&self) -> &[TextRow] {
        &self.rows
    }

    /// Get a row by index.
    pub fn row(&self, index: usize) -> &TextRow {
        &self.rows[index]
    }
}
