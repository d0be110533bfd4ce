//! Normalized page layout in PDF point space.
//!
//! Everything downstream of the [`normalizer`] works on these types; raw
//! polygons never leave this module.

pub mod normalizer;
pub mod script;

pub use normalizer::{normalize, to_polygon, Normalizer, PageDims};
pub use script::{dominant_direction, is_rtl_char};

use serde::{Deserialize, Serialize};

use crate::models::{BBox, Direction, MarkState};

/// A text line with its box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub content: String,
    pub bbox: BBox,
}

/// A word with its box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub content: String,
    pub bbox: BBox,
}

/// A table cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    /// Row index (0-based).
    pub row: usize,
    /// Column index (0-based).
    pub col: usize,
    /// Row span (number of rows this cell spans).
    pub row_span: usize,
    /// Column span (number of columns this cell spans).
    pub col_span: usize,
    pub content: String,
    pub bbox: BBox,
}

/// A table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub num_rows: usize,
    pub num_cols: usize,
    pub cells: Vec<TableCell>,
}

impl Table {
    /// Get the cell covering a grid position.
    pub fn cell_at(&self, row: usize, col: usize) -> Option<&TableCell> {
        self.cells.iter().find(|c| {
            row >= c.row && row < c.row + c.row_span && col >= c.col && col < c.col + c.col_span
        })
    }

    /// Get the smallest cell containing a point.
    pub fn cell_containing(&self, x: f64, y: f64) -> Option<&TableCell> {
        self.cells
            .iter()
            .filter(|c| c.bbox.contains_point(x, y, 0.0))
            .min_by(|a, b| a.bbox.area().total_cmp(&b.bbox.area()))
    }
}

/// A selection mark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionMark {
    pub state: MarkState,
    pub bbox: BBox,
    pub confidence: f64,
}

/// A key-value pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub key: String,
    pub key_box: BBox,
    pub value_box: BBox,
    pub confidence: f64,
}

/// One page of geometric evidence in point space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_number: u32,
    /// Page width in points.
    pub width: f64,
    /// Page height in points.
    pub height: f64,
    pub lines: Vec<TextLine>,
    pub words: Vec<Word>,
    pub tables: Vec<Table>,
    pub marks: Vec<SelectionMark>,
    pub kv_pairs: Vec<KeyValuePair>,
}

impl PageLayout {
    /// Create an empty layout.
    pub fn empty(page_number: u32, width: f64, height: f64) -> Self {
        Self {
            page_number,
            width,
            height,
            lines: Vec::new(),
            words: Vec::new(),
            tables: Vec::new(),
            marks: Vec::new(),
            kv_pairs: Vec::new(),
        }
    }

    /// Iterate over every table cell on the page.
    pub fn cells(&self) -> impl Iterator<Item = (&Table, &TableCell)> {
        self.tables
            .iter()
            .flat_map(|t| t.cells.iter().map(move |c| (t, c)))
    }
}

/// Position of a box along a reading axis: increases in reading order.
pub fn reading_key(bbox: &BBox, direction: Direction) -> f64 {
    let (x, _) = bbox.center();
    if direction.is_rtl() { -x } else { x }
}

/// Sort words in reading order for the given direction.
pub fn sort_reading_order(words: &mut [Word], direction: Direction) {
    words.sort_by(|a, b| reading_key(&a.bbox, direction).total_cmp(&reading_key(&b.bbox, direction)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(content: &str, x: f64) -> Word {
        Word {
            content: content.to_string(),
            bbox: BBox::new(x, 100.0, 20.0, 10.0),
        }
    }

    #[test]
    fn test_sort_reading_order_rtl() {
        let mut words = vec![word("b", 100.0), word("a", 300.0), word("c", 50.0)];
        sort_reading_order(&mut words, Direction::Rtl);
        let order: Vec<_> = words.iter().map(|w| w.content.as_str()).collect();
        assert_eq!(order, ["a", "b", "c"]);

        sort_reading_order(&mut words, Direction::Ltr);
        let order: Vec<_> = words.iter().map(|w| w.content.as_str()).collect();
        assert_eq!(order, ["c", "b", "a"]);
    }

    #[test]
    fn test_table_cell_lookup() {
        let cell = |row, col, x| TableCell {
            row,
            col,
            row_span: 1,
            col_span: 1,
            content: String::new(),
            bbox: BBox::new(x, 0.0, 50.0, 20.0),
        };
        let table = Table {
            num_rows: 1,
            num_cols: 2,
            cells: vec![cell(0, 0, 0.0), cell(0, 1, 50.0)],
        };

        assert_eq!(table.cell_at(0, 1).map(|c| c.col), Some(1));
        assert!(table.cell_at(1, 0).is_none());
        assert_eq!(table.cell_containing(75.0, 10.0).map(|c| c.col), Some(1));
    }
}
