//! Splitting a line that carries several fields into per-field word clusters.

use std::fmt;

use super::rows::TextRow;
use super::text::normalize_label;
use crate::layout::{reading_key, Word};
use crate::models::{BBox, Direction, SemanticField};

/// A field's label position on a shared line.
#[derive(Debug, Clone)]
pub struct FieldAnchor {
    /// Index of the semantic field on the page.
    pub field: usize,
    /// Label word range within the row.
    pub span: Option<(usize, usize)>,
    /// Label box.
    pub anchor: BBox,
}

/// The words of a line that belong to one field.
#[derive(Debug, Clone)]
pub struct WordCluster {
    /// Index of the semantic field on the page.
    pub field: usize,
    /// Position along the line in reading order.
    pub order: usize,
    pub label_words: Vec<Word>,
    /// Label words plus the words assigned to this field, in reading order.
    pub words: Vec<Word>,
    /// Box of the label words.
    pub anchor: BBox,
    /// Box of every word in the cluster.
    pub extent: BBox,
    /// X coordinate of the next cluster's label edge facing this one.
    pub boundary: Option<f64>,
}

/// All clusters of one line, ordered along the line.
#[derive(Debug, Clone)]
pub struct LinePartition {
    pub row: usize,
    pub direction: Direction,
    pub clusters: Vec<WordCluster>,
}

impl LinePartition {
    /// Get the cluster of a field.
    pub fn cluster_for(&self, field: usize) -> Option<&WordCluster> {
        self.clusters.iter().find(|c| c.field == field)
    }
}

/// Partitions multi-field lines.
pub struct RowPartitioner;

impl RowPartitioner {
    /// Split a row's words into one cluster per anchored field.
    ///
    /// Each label run seeds a cluster; other words join the nearest preceding
    /// anchor in reading order, or the physically nearest cluster when no
    /// anchor precedes them.
    pub fn partition(row_index: usize, row: &TextRow, anchors: &[FieldAnchor]) -> LinePartition {
        let direction = row.direction;
        let mut ordered: Vec<&FieldAnchor> = anchors.iter().collect();
        ordered.sort_by(|a, b| {
            reading_key(&a.anchor, direction).total_cmp(&reading_key(&b.anchor, direction))
        });

        let n = row.words.len();
        let mut owner: Vec<Option<usize>> = vec![None; n];
        let mut is_label = vec![false; n];

        for (k, anchor) in ordered.iter().enumerate() {
            if let Some((start, end)) = anchor.span {
                for i in start..end.min(n) {
                    if owner[i].is_none() {
                        owner[i] = Some(k);
                        is_label[i] = true;
                    }
                }
            }
        }

        for i in 0..n {
            if owner[i].is_some() {
                continue;
            }
            let word = &row.words[i];
            let key = reading_key(&word.bbox, direction);
            let preceding = ordered
                .iter()
                .enumerate()
                .filter(|(_, a)| reading_key(&a.anchor, direction) <= key)
                .map(|(k, _)| k)
                .last();
            owner[i] = preceding.or_else(|| {
                ordered
                    .iter()
                    .enumerate()
                    .min_by(|(_, a), (_, b)| {
                        a.anchor
                            .gap_distance(&word.bbox)
                            .total_cmp(&b.anchor.gap_distance(&word.bbox))
                    })
                    .map(|(k, _)| k)
            });
        }

        let mut clusters: Vec<WordCluster> = ordered
            .iter()
            .enumerate()
            .map(|(k, a)| {
                let owned: Vec<usize> = (0..n).filter(|&i| owner[i] == Some(k)).collect();
                let label_words: Vec<Word> = owned
                    .iter()
                    .filter(|&&i| is_label[i])
                    .map(|&i| row.words[i].clone())
                    .collect();
                let words: Vec<Word> = owned.iter().map(|&i| row.words[i].clone()).collect();

                let anchor = BBox::union_all(label_words.iter().map(|w| &w.bbox)).unwrap_or(a.anchor);
                let extent = BBox::union_all(words.iter().map(|w| &w.bbox))
                    .map(|e| e.union(&anchor))
                    .unwrap_or(anchor);

                WordCluster {
                    field: a.field,
                    order: k,
                    label_words,
                    words,
                    anchor,
                    extent,
                    boundary: None,
                }
            })
            .collect();

        for k in 1..clusters.len() {
            let next = clusters[k].anchor;
            clusters[k - 1].boundary = Some(if direction.is_rtl() { next.right() } else { next.x });
        }

        LinePartition {
            row: row_index,
            direction,
            clusters,
        }
    }
}

/// Why a `relatedFields` reference is inconsistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchReason {
    /// No field on the page has the referenced label.
    Missing,
    /// The referenced field is in another row group.
    DifferentRowGroup,
    /// The referenced field matched another line.
    DifferentLine,
}

impl fmt::Display for MismatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchReason::Missing => write!(f, "no field with that label on the page"),
            MismatchReason::DifferentRowGroup => write!(f, "it belongs to another row group"),
            MismatchReason::DifferentLine => write!(f, "it matched a different line"),
        }
    }
}

/// An inconsistent `relatedFields` reference.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedMismatch {
    /// Field holding the reference.
    pub field: usize,
    /// Referenced label.
    pub related: String,
    pub reason: MismatchReason,
}

/// Check every `relatedFields` reference against row groups and matched rows.
///
/// `rows[i]` is the row field `i` matched, if any. References to unmatched
/// fields are only checked for row-group consistency.
pub fn related_mismatches(fields: &[SemanticField], rows: &[Option<usize>]) -> Vec<RelatedMismatch> {
    let labels: Vec<String> = fields.iter().map(|f| normalize_label(&f.label_text)).collect();
    let mut mismatches = Vec::new();

    for (a, field) in fields.iter().enumerate() {
        for related in &field.related_fields {
            let wanted = normalize_label(related);
            let candidates: Vec<usize> = (0..fields.len())
                .filter(|&b| b != a && labels[b] == wanted)
                .collect();

            let reason = if candidates.is_empty() {
                Some(MismatchReason::Missing)
            } else if !candidates
                .iter()
                .any(|&b| field.row_group.is_none() || fields[b].row_group == field.row_group)
            {
                Some(MismatchReason::DifferentRowGroup)
            } else if let Some(row) = rows[a] {
                let matched: Vec<usize> = candidates.iter().filter_map(|&b| rows[b]).collect();
                (!matched.is_empty() && !matched.contains(&row)).then_some(MismatchReason::DifferentLine)
            } else {
                None
            };

            if let Some(reason) = reason {
                mismatches.push(RelatedMismatch {
                    field: a,
                    related: related.clone(),
                    reason,
                });
            }
        }
    }

    mismatches
}
