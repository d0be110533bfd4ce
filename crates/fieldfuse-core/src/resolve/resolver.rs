//! Box resolution dispatched on the field's visual style.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use super::marks::ClaimedMarks;
use crate::layout::PageLayout;
use crate::matching::{normalize_label, TextRow, WordCluster};
use crate::models::config::{GeometryConfig, ResolverConfig};
use crate::models::{BBox, Direction, FieldStyle, InputType, SemanticField};

lazy_static! {
    // "9 digit boxes", "8-digit", "9 ספרות", "6 משבצות"
    static ref DIGIT_HINT: Regex = Regex::new(
        r"(?i)(\d+)\s*-?\s*(?:digits?|boxes|cells|ספרות|תיבות|משבצות)"
    ).unwrap();

    // Trailing row number of a row group tag ("row_3", "row 3")
    static ref ROW_INDEX: Regex = Regex::new(r"(\d+)\s*$").unwrap();
}

/// Where a field's label sits on the page.
#[derive(Debug, Clone, Copy)]
pub struct FieldGeometry<'a> {
    /// Box of the label words.
    pub anchor: BBox,
    /// Row the label was matched on.
    pub row: &'a TextRow,
    /// Reading direction of the row.
    pub direction: Direction,
    /// The field's cluster when the row holds several fields.
    pub cluster: Option<&'a WordCluster>,
}

impl<'a> FieldGeometry<'a> {
    pub fn new(anchor: BBox, row: &'a TextRow) -> Self {
        Self {
            anchor,
            row,
            direction: row.direction,
            cluster: None,
        }
    }

    /// Use a partitioned cluster; its label box becomes the anchor.
    pub fn with_cluster(mut self, cluster: &'a WordCluster) -> Self {
        self.anchor = cluster.anchor;
        self.cluster = Some(cluster);
        self
    }

    fn boundary(&self) -> Option<f64> {
        self.cluster.and_then(|c| c.boundary)
    }
}

/// Box produced for a field.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub bbox: BBox,
    /// Individual digit boxes, left to right.
    pub segments: Option<Vec<BBox>>,
    /// The box is default geometry rather than page evidence.
    pub synthesized: bool,
}

impl Resolution {
    fn measured(bbox: BBox) -> Self {
        Self {
            bbox,
            segments: None,
            synthesized: false,
        }
    }

    fn synthesized(bbox: BBox) -> Self {
        Self {
            bbox,
            segments: None,
            synthesized: true,
        }
    }
}

/// Number of digit boxes for a field: explicit count, then the visual
/// description, then the per-input-type default.
pub fn digit_count(field: &SemanticField, config: &ResolverConfig) -> u32 {
    field
        .digit_count
        .filter(|&n| n > 0)
        .or_else(|| {
            field
                .visual_description
                .as_deref()
                .and_then(|d| DIGIT_HINT.captures(d))
                .and_then(|caps| caps[1].parse::<u32>().ok())
                .filter(|&n| n > 0)
        })
        .unwrap_or(match field.input_type {
            InputType::Date => config.date_digit_count,
            _ => config.default_digit_count,
        })
}

/// Row index encoded in a row group tag.
pub fn row_index(row_group: Option<&str>) -> Option<usize> {
    row_group
        .and_then(|g| ROW_INDEX.captures(g))
        .and_then(|caps| caps[1].parse().ok())
}

/// Split `[left, right]` into `n` equal boxes; the last one absorbs rounding.
pub fn split_evenly(left: f64, right: f64, y: f64, height: f64, n: u32) -> Vec<BBox> {
    let n = n.max(1) as usize;
    let width = (right - left) / n as f64;

    (0..n)
        .map(|i| {
            let x = left + width * i as f64;
            let w = if i + 1 == n { right - x } else { width };
            BBox::new(x, y, w, height)
        })
        .collect()
}

/// Resolves labeled fields to input boxes.
pub struct BoxResolver {
    geometry: GeometryConfig,
    config: ResolverConfig,
    page_width: f64,
    page_height: f64,
}

impl BoxResolver {
    pub fn new(
        geometry: &GeometryConfig,
        config: &ResolverConfig,
        page_width: f64,
        page_height: f64,
    ) -> Self {
        Self {
            geometry: geometry.clone(),
            config: config.clone(),
            page_width,
            page_height,
        }
    }

    /// Resolve a field's input box.
    ///
    /// Returns `None` when the style has no usable geometry; the caller falls
    /// back to placement.
    pub fn resolve(
        &self,
        field: &SemanticField,
        geometry: &FieldGeometry<'_>,
        layout: &PageLayout,
        claimed: &mut ClaimedMarks,
    ) -> Option<Resolution> {
        let resolution = match field.field_type {
            FieldStyle::Underline => self.underline(field, geometry, layout),
            FieldStyle::DigitBoxes => self.digit_boxes(field, geometry),
            FieldStyle::BoxWithTitle => self.box_with_title(field, geometry, layout),
            FieldStyle::TableCell => self.table_cell(field, geometry, layout),
            FieldStyle::SelectionMark => self.selection_mark(geometry, layout, claimed),
            FieldStyle::TitleRight => self.title_right(geometry, layout),
        };

        match &resolution {
            Some(r) if r.bbox.is_valid() => debug!(
                "Resolved '{}' ({}) to {:?}{}",
                field.label_text,
                field.field_type.as_str(),
                r.bbox,
                if r.synthesized { " (synthesized)" } else { "" }
            ),
            _ => debug!("No geometry for '{}' ({})", field.label_text, field.field_type.as_str()),
        }

        resolution.filter(|r| r.bbox.is_valid())
    }

    /// Vertical band of the label's line: bottom and height.
    fn band(&self, geometry: &FieldGeometry<'_>) -> (f64, f64) {
        let line = geometry.row.line.bbox;
        let pad = self.geometry.vertical_padding;
        (line.y - pad, line.height + 2.0 * pad)
    }

    /// Space after the label up to the next cluster or the end of the line.
    fn measured_span(&self, geometry: &FieldGeometry<'_>) -> (f64, f64) {
        let gap = self.geometry.label_gap;
        let line = geometry.row.line.bbox;

        if geometry.direction.is_rtl() {
            let right = geometry.anchor.x - gap;
            let left = geometry.boundary().map(|b| b + gap).unwrap_or(line.x);
            (left, right)
        } else {
            let left = geometry.anchor.right() + gap;
            let right = geometry.boundary().map(|b| b - gap).unwrap_or(line.right());
            (left, right)
        }
    }

    /// Default-width span after the label, kept off the next cluster and the page margin.
    fn synthesized_span(&self, geometry: &FieldGeometry<'_>, width: f64) -> (f64, f64) {
        let gap = self.geometry.label_gap;
        let margin = self.geometry.page_margin;

        if geometry.direction.is_rtl() {
            let right = geometry.anchor.x - gap;
            let limit = geometry.boundary().map(|b| b + gap).unwrap_or(margin).max(margin);
            ((right - width).max(limit), right)
        } else {
            let left = geometry.anchor.right() + gap;
            let page_limit = self.page_width - margin;
            let limit = geometry.boundary().map(|b| b - gap).unwrap_or(page_limit).min(page_limit);
            (left, (left + width).min(limit))
        }
    }

    /// Value box of a key-value pair whose key is this label.
    fn key_value_box(
        &self,
        field: &SemanticField,
        geometry: &FieldGeometry<'_>,
        layout: &PageLayout,
    ) -> Option<BBox> {
        let label = normalize_label(&field.label_text);
        let (cx, cy) = geometry.anchor.center();

        layout
            .kv_pairs
            .iter()
            .filter(|kv| kv.value_box.is_valid())
            .find(|kv| kv.key_box.contains_point(cx, cy, 0.0) || normalize_label(&kv.key) == label)
            .map(|kv| kv.value_box)
    }

    fn underline(
        &self,
        field: &SemanticField,
        geometry: &FieldGeometry<'_>,
        layout: &PageLayout,
    ) -> Option<Resolution> {
        if let Some(value) = self.key_value_box(field, geometry, layout) {
            return Some(Resolution::measured(value));
        }

        let (y, height) = self.band(geometry);
        let (left, right) = self.measured_span(geometry);
        if right - left >= self.geometry.min_input_width {
            return Some(Resolution::measured(BBox::new(left, y, right - left, height)));
        }

        let (left, right) = self.synthesized_span(geometry, self.geometry.default_input_width);
        Some(Resolution::synthesized(BBox::new(left, y, right - left, height)))
    }

    fn digit_boxes(&self, field: &SemanticField, geometry: &FieldGeometry<'_>) -> Option<Resolution> {
        let n = digit_count(field, &self.config);
        let (y, height) = self.band(geometry);

        let (mut left, mut right) = self.measured_span(geometry);
        let mut synthesized = false;
        if right - left < self.geometry.min_input_width {
            (left, right) = self.synthesized_span(geometry, n as f64 * self.config.digit_box_width);
            synthesized = true;
        }
        if right <= left {
            return None;
        }

        Some(Resolution {
            bbox: BBox::new(left, y, right - left, height),
            segments: Some(split_evenly(left, right, y, height, n)),
            synthesized,
        })
    }

    fn box_with_title(
        &self,
        field: &SemanticField,
        geometry: &FieldGeometry<'_>,
        layout: &PageLayout,
    ) -> Option<Resolution> {
        if let Some(value) = self.key_value_box(field, geometry, layout) {
            return Some(Resolution::measured(value));
        }

        if field.has_visible_boundary != Some(false) {
            let found = self
                .cell_under_title(geometry, layout)
                .or_else(|| self.free_cell_below(geometry, layout))
                .or_else(|| self.free_cell_beside(geometry, layout));
            if let Some(bbox) = found {
                return Some(Resolution::measured(bbox));
            }
        }

        let anchor = geometry.anchor;
        let width = self.geometry.default_input_width;
        let height = width / self.config.box_aspect_ratio;
        let top = anchor.y - self.geometry.label_gap;
        let x = if geometry.direction.is_rtl() {
            anchor.right() - width
        } else {
            anchor.x
        };

        let bbox = BBox::new(x, top - height, width, height).clamp_to_page(self.page_width, self.page_height);
        Some(Resolution::synthesized(bbox))
    }

    /// Part of the cell holding the title that lies below it.
    fn cell_under_title(&self, geometry: &FieldGeometry<'_>, layout: &PageLayout) -> Option<BBox> {
        let anchor = geometry.anchor;
        let (cx, cy) = anchor.center();
        let top = anchor.y - self.geometry.label_gap;

        layout
            .cells()
            .map(|(_, c)| c.bbox)
            .filter(|b| b.contains_point(cx, cy, 0.0))
            .min_by(|a, b| a.area().total_cmp(&b.area()))
            .filter(|b| top - b.y >= anchor.height)
            .map(|b| BBox::from_edges(b.x, b.y, b.right(), top))
    }

    /// Nearest mark-free cell starting just below the title.
    fn free_cell_below(&self, geometry: &FieldGeometry<'_>, layout: &PageLayout) -> Option<BBox> {
        let anchor = geometry.anchor;
        let (cx, cy) = anchor.center();
        let tolerance = self.geometry.vertical_padding;

        layout
            .cells()
            .map(|(_, c)| c.bbox)
            .filter(|b| !b.contains_point(cx, cy, 0.0))
            .filter(|b| {
                b.top() <= anchor.y + tolerance
                    && anchor.y - b.top() <= self.config.box_search_distance
            })
            .filter(|b| b.horizontal_overlap(&anchor) > 0.0)
            .filter(|b| is_mark_free(b, layout))
            .min_by(|a, b| (anchor.y - a.top()).total_cmp(&(anchor.y - b.top())))
    }

    /// Nearest mark-free cell on the title's band, on the reading side.
    fn free_cell_beside(&self, geometry: &FieldGeometry<'_>, layout: &PageLayout) -> Option<BBox> {
        let anchor = geometry.anchor;

        self.cells_beside(geometry, layout)
            .filter(|b| b.gap_distance(&anchor) <= self.config.box_search_distance)
            .filter(|b| is_mark_free(b, layout))
            .min_by(|a, b| a.gap_distance(&anchor).total_cmp(&b.gap_distance(&anchor)))
    }

    fn cells_beside<'l>(
        &self,
        geometry: &FieldGeometry<'_>,
        layout: &'l PageLayout,
    ) -> impl Iterator<Item = BBox> + 'l {
        let anchor = geometry.anchor;
        let (cx, cy) = anchor.center();
        let rtl = geometry.direction.is_rtl();
        let tolerance = self.geometry.label_gap;

        layout
            .cells()
            .map(|(_, c)| c.bbox)
            .filter(move |b| !b.contains_point(cx, cy, 0.0))
            .filter(move |b| b.vertical_overlap(&anchor) > 0.0)
            .filter(move |b| {
                if rtl {
                    b.right() <= anchor.x + tolerance
                } else {
                    b.x >= anchor.right() - tolerance
                }
            })
    }

    fn table_cell(
        &self,
        field: &SemanticField,
        geometry: &FieldGeometry<'_>,
        layout: &PageLayout,
    ) -> Option<Resolution> {
        let label = normalize_label(&field.label_text);
        let (cx, cy) = geometry.anchor.center();

        let header = layout
            .tables
            .iter()
            .find_map(|t| t.cell_containing(cx, cy).map(|c| (t, c)))
            .or_else(|| {
                layout.tables.iter().find_map(|t| {
                    t.cells
                        .iter()
                        .find(|c| !label.is_empty() && normalize_label(&c.content).contains(&label))
                        .map(|c| (t, c))
                })
            });

        if let Some((table, header)) = header {
            let target_row = row_index(field.row_group.as_deref())
                .filter(|&r| r < table.num_rows && r != header.row)
                .unwrap_or(header.row + header.row_span);
            return table
                .cell_at(target_row, header.col)
                .map(|c| Resolution::measured(c.bbox));
        }

        let anchor = geometry.anchor;
        self.cells_beside(geometry, layout)
            .min_by(|a, b| a.gap_distance(&anchor).total_cmp(&b.gap_distance(&anchor)))
            .map(Resolution::measured)
    }

    /// Greedy nearest unclaimed mark on the label's band.
    fn selection_mark(
        &self,
        geometry: &FieldGeometry<'_>,
        layout: &PageLayout,
        claimed: &mut ClaimedMarks,
    ) -> Option<Resolution> {
        let anchor = geometry.anchor;
        let band = self.geometry.row_tolerance.max(anchor.height / 2.0);

        let (index, bbox) = layout
            .marks
            .iter()
            .enumerate()
            .filter(|(i, _)| !claimed.is_claimed(*i))
            .filter(|(_, m)| (m.bbox.center_y() - anchor.center_y()).abs() <= band)
            .map(|(i, m)| (i, m.bbox, m.bbox.gap_distance(&anchor)))
            .filter(|(_, _, distance)| *distance <= self.config.max_mark_distance)
            .min_by(|a, b| a.2.total_cmp(&b.2))
            .map(|(i, bbox, _)| (i, bbox))?;

        claimed.claim(index);
        Some(Resolution::measured(bbox))
    }

    /// Box on the reading side of the label, up to the nearest word on the band.
    fn title_right(&self, geometry: &FieldGeometry<'_>, layout: &PageLayout) -> Option<Resolution> {
        let anchor = geometry.anchor;
        let gap = self.geometry.label_gap;
        let margin = self.geometry.page_margin;
        let (y, height) = self.band(geometry);
        let band = BBox::new(0.0, y, self.page_width, height);

        let on_band = layout
            .words
            .iter()
            .map(|w| w.bbox)
            .filter(|b| b.vertical_overlap(&band) >= b.height / 2.0);

        let (left, right, synthesized) = if geometry.direction.is_rtl() {
            let right = anchor.x - gap;
            let obstacle = on_band
                .filter(|b| b.right() <= anchor.x)
                .map(|b| b.right())
                .fold(f64::NEG_INFINITY, f64::max);
            if obstacle.is_finite() {
                (obstacle + gap, right, false)
            } else {
                ((right - self.geometry.default_input_width).max(margin), right, true)
            }
        } else {
            let left = anchor.right() + gap;
            let obstacle = on_band
                .filter(|b| b.x >= anchor.right())
                .map(|b| b.x)
                .fold(f64::INFINITY, f64::min);
            if obstacle.is_finite() {
                (left, obstacle - gap, false)
            } else {
                let limit = self.page_width - margin;
                (left, (left + self.geometry.default_input_width).min(limit), true)
            }
        };

        if !synthesized && right - left < self.geometry.min_input_width {
            return None;
        }

        let bbox = BBox::new(left, y, right - left, height);
        Some(if synthesized {
            Resolution::synthesized(bbox)
        } else {
            Resolution::measured(bbox)
        })
    }
}

fn is_mark_free(bbox: &BBox, layout: &PageLayout) -> bool {
    !layout.marks.iter().any(|m| {
        let (x, y) = m.bbox.center();
        bbox.contains_point(x, y, 0.0)
    })
}
