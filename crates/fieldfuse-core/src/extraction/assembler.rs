//! Final field list: row-group alignment, naming, confidence and ordering.

use tracing::warn;

use super::slug::{slugify, NameRegistry};
use crate::layout::dominant_direction;
use crate::models::{Diagnostic, DiagnosticKind, ExtractedField, FieldSource};
use crate::resolve::{Provenance, ResolvedField};

/// Builds the editor-facing field list for a page.
pub struct FieldAssembler {
    row_tolerance: f64,
    /// Furthest a field is moved onto its row group's band.
    snap_reach: f64,
}

impl FieldAssembler {
    pub fn new(row_tolerance: f64) -> Self {
        Self {
            row_tolerance,
            snap_reach: row_tolerance * 2.0,
        }
    }

    /// Bring each row group onto one band.
    ///
    /// A group whose spread of `y` is within the row tolerance is left alone.
    /// Otherwise its most confident field (first wins on ties) is the
    /// reference: members within half the tolerance of it stay, members within
    /// snap reach move onto its `y`, and members further away keep their box.
    /// Every member that moved or stayed off the band takes one penalty and
    /// yields a diagnostic.
    pub fn align_row_groups(&self, page_number: u32, resolved: &mut [ResolvedField]) -> Vec<Diagnostic> {
        let mut groups: Vec<String> = Vec::new();
        for group in resolved.iter().filter_map(|r| r.row_group.as_ref()) {
            if !groups.contains(group) {
                groups.push(group.clone());
            }
        }

        let mut diagnostics = Vec::new();

        for group in groups {
            let members: Vec<usize> = (0..resolved.len())
                .filter(|&i| resolved[i].row_group.as_deref() == Some(group.as_str()))
                .collect();
            if members.len() < 2 {
                continue;
            }

            let (low, high) = members.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(low, high), &i| {
                let y = resolved[i].bbox.y;
                (low.min(y), high.max(y))
            });
            if high - low <= self.row_tolerance {
                continue;
            }

            let Some(reference) = members.iter().copied().max_by(|&a, &b| {
                resolved[a]
                    .confidence()
                    .total_cmp(&resolved[b].confidence())
                    .then(b.cmp(&a))
            }) else {
                continue;
            };
            let band = resolved[reference].bbox.y;
            let reference_label = resolved[reference].label.clone();

            for &i in members.iter().filter(|&&i| i != reference) {
                let deviation = resolved[i].bbox.y - band;
                if deviation.abs() <= self.row_tolerance / 2.0 {
                    continue;
                }

                let field = &mut resolved[i];
                field.penalties += 1;

                let message = if deviation.abs() <= self.snap_reach {
                    field.shift_y(-deviation);
                    format!(
                        "'{}' was {:.1} pt off row group '{}'; aligned with '{}'",
                        field.label,
                        deviation.abs(),
                        group,
                        reference_label
                    )
                } else {
                    format!(
                        "'{}' is {:.1} pt off row group '{}', too far to align with '{}'; left in place",
                        field.label,
                        deviation.abs(),
                        group,
                        reference_label
                    )
                };
                warn!("Page {}: {}", page_number, message);
                diagnostics.push(
                    Diagnostic::warning(page_number, DiagnosticKind::RowGroupMismatch, message)
                        .with_label(field.label.clone()),
                );
            }
        }

        diagnostics
    }

    /// Name, score and order resolved fields.
    ///
    /// Names are assigned in resolution order; output is top-to-bottom rows,
    /// each row ordered in its majority reading direction.
    /// Ids follow this document order, not confidence.
    pub fn assemble(&self, page_number: u32, resolved: Vec<ResolvedField>) -> Vec<ExtractedField> {
        let mut names = NameRegistry::new();

        let fields: Vec<ExtractedField> = resolved
            .into_iter()
            .map(|r| {
                let base = slugify(r.name_hint.as_deref().unwrap_or(&r.label));
                let name = names.register(&base);
                let confidence = r.confidence();
                let source = match r.provenance {
                    Provenance::Semantic(_) => FieldSource::Semantic,
                    Provenance::Unlabeled(_) => FieldSource::Unlabeled,
                };

                ExtractedField {
                    id: 0,
                    kind: r.kind,
                    name,
                    direction: dominant_direction(&r.label),
                    x: r.bbox.x,
                    y: r.bbox.y,
                    width: r.bbox.width,
                    height: r.bbox.height,
                    page_number,
                    required: r.required,
                    confidence,
                    section_name: r.section,
                    row_group: r.row_group,
                    segments: r.segments,
                    source,
                    label: r.label,
                }
            })
            .collect();

        let order = self.document_order(&fields);
        let mut slots: Vec<Option<ExtractedField>> = fields.into_iter().map(Some).collect();

        order
            .into_iter()
            .filter_map(|i| slots[i].take())
            .zip(1u32..)
            .map(|(mut field, id)| {
                field.id = id;
                field
            })
            .collect()
    }

    /// Indices in reading order.
    fn document_order(&self, fields: &[ExtractedField]) -> Vec<usize> {
        let center_y = |i: usize| fields[i].bbox().center_y();
        let center_x = |i: usize| fields[i].bbox().center().0;

        let mut indices: Vec<usize> = (0..fields.len()).collect();
        indices.sort_by(|&a, &b| center_y(b).total_cmp(&center_y(a)).then(a.cmp(&b)));

        let mut rows: Vec<Vec<usize>> = Vec::new();
        for i in indices {
            match rows.last_mut() {
                Some(row) if (center_y(row[0]) - center_y(i)).abs() <= self.row_tolerance => {
                    row.push(i)
                }
                _ => rows.push(vec![i]),
            }
        }

        for row in &mut rows {
            let rtl = row.iter().filter(|&&i| fields[i].direction.is_rtl()).count() * 2 > row.len();
            row.sort_by(|&a, &b| {
                let by_x = if rtl {
                    center_x(b).total_cmp(&center_x(a))
                } else {
                    center_x(a).total_cmp(&center_x(b))
                };
                by_x.then(a.cmp(&b))
            });
        }

        rows.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BBox, Direction, FieldKind};
    use crate::resolve::ConfidenceBasis;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn resolved(label: &str, bbox: BBox, basis: ConfidenceBasis) -> ResolvedField {
        ResolvedField {
            provenance: Provenance::Semantic(0),
            label: label.to_string(),
            name_hint: None,
            kind: FieldKind::Text,
            required: false,
            section: None,
            row_group: None,
            bbox,
            segments: None,
            basis,
            penalties: 0,
        }
    }

    #[test]
    fn test_rtl_row_ordered_right_to_left() {
        let fields = vec![
            resolved("רח'", BBox::new(100.0, 500.0, 80.0, 16.0), ConfidenceBasis::Partitioned),
            resolved("עיר", BBox::new(400.0, 500.0, 80.0, 16.0), ConfidenceBasis::Partitioned),
            resolved("מיקוד", BBox::new(250.0, 501.0, 80.0, 16.0), ConfidenceBasis::Partitioned),
            resolved("שם", BBox::new(300.0, 700.0, 80.0, 16.0), ConfidenceBasis::LineMatch),
        ];

        let out = FieldAssembler::new(8.0).assemble(1, fields);

        let labels: Vec<&str> = out.iter().map(|f| f.label.as_str()).collect();
        assert_eq!(labels, ["שם", "עיר", "מיקוד", "רח'"]);
        let ids: Vec<u32> = out.iter().map(|f| f.id).collect();
        assert_eq!(ids, [1, 2, 3, 4]);
        assert!(out.iter().all(|f| f.direction == Direction::Rtl));
    }

    #[test]
    fn test_ltr_row_ordered_left_to_right() {
        let fields = vec![
            resolved("Date", BBox::new(300.0, 500.0, 80.0, 16.0), ConfidenceBasis::LineMatch),
            resolved("Name", BBox::new(50.0, 500.0, 80.0, 16.0), ConfidenceBasis::LineMatch),
        ];

        let out = FieldAssembler::new(8.0).assemble(1, fields);

        assert_eq!(out[0].label, "Name");
        assert_eq!(out[0].direction, Direction::Ltr);
    }

    #[test]
    fn test_names_follow_resolution_order() {
        let mut hinted = resolved("שם הסוכן", BBox::new(300.0, 700.0, 80.0, 16.0), ConfidenceBasis::LineMatch);
        hinted.name_hint = Some("agent_name".to_string());
        let fields = vec![
            resolved("Signature", BBox::new(50.0, 100.0, 80.0, 16.0), ConfidenceBasis::LineMatch),
            resolved("Signature", BBox::new(50.0, 300.0, 80.0, 16.0), ConfidenceBasis::LineMatch),
            hinted,
        ];

        let out = FieldAssembler::new(8.0).assemble(2, fields);

        let names: Vec<&str> = out.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["agent_name", "signature_2", "signature"]);
        assert!(out.iter().all(|f| f.page_number == 2));
    }

    fn grouped(label: &str, y: f64, basis: ConfidenceBasis) -> ResolvedField {
        let mut f = resolved(label, BBox::new(100.0, y, 80.0, 16.0), basis);
        f.row_group = Some("row_3".to_string());
        f
    }

    #[test]
    fn test_align_row_groups_snaps_and_penalizes() {
        let mut fields = vec![
            grouped("א", 500.0, ConfidenceBasis::Partitioned),
            grouped("ב", 490.0, ConfidenceBasis::Synthesized),
            grouped("ג", 503.0, ConfidenceBasis::Partitioned),
        ];

        let diagnostics = FieldAssembler::new(8.0).align_row_groups(1, &mut fields);

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::RowGroupMismatch);
        assert_eq!(diagnostics[0].label.as_deref(), Some("ב"));
        assert_eq!(fields[1].bbox.y, 500.0);
        assert_eq!(fields[1].confidence(), 0.5);
        assert_eq!(fields[2].bbox.y, 503.0);
        assert_eq!(fields[2].penalties, 0);
    }

    #[test]
    fn test_align_row_groups_bounds_pairwise_spread() {
        // each member is within tolerance of the reference, not of each other
        let mut fields = vec![
            grouped("First", 492.0, ConfidenceBasis::LineMatch),
            grouped("Middle", 499.0, ConfidenceBasis::LineMatch),
            grouped("Last", 485.0, ConfidenceBasis::LineMatch),
        ];

        let diagnostics = FieldAssembler::new(8.0).align_row_groups(1, &mut fields);

        let ys: Vec<f64> = fields.iter().map(|f| f.bbox.y).collect();
        assert_eq!(ys, [492.0, 492.0, 492.0]);
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(fields[0].penalties, 0);
    }

    #[test]
    fn test_align_row_groups_keeps_distant_member_in_place() {
        let mut fields = vec![
            grouped("First", 698.0, ConfidenceBasis::Partitioned),
            grouped("Last", 598.0, ConfidenceBasis::LineMatch),
        ];

        let diagnostics = FieldAssembler::new(8.0).align_row_groups(1, &mut fields);

        assert_eq!(fields[0].bbox, BBox::new(100.0, 698.0, 80.0, 16.0));
        assert_ne!(fields[0].bbox, fields[1].bbox);
        assert_eq!(fields[0].confidence(), 0.7);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("left in place"));
    }

    proptest! {
        #[test]
        fn prop_row_group_band_within_tolerance(
            ys in prop::collection::vec(400.0f64..600.0, 2..7),
            tolerance in 2.0f64..12.0,
        ) {
            let mut fields: Vec<ResolvedField> = ys
                .iter()
                .map(|&y| grouped("f", y, ConfidenceBasis::LineMatch))
                .collect();

            let diagnostics = FieldAssembler::new(tolerance).align_row_groups(1, &mut fields);

            let band = fields[0].bbox.y;
            prop_assert_eq!(band, ys[0]);
            let on_band: Vec<f64> = fields
                .iter()
                .map(|f| f.bbox.y)
                .filter(|y| (y - band).abs() <= tolerance * 2.0)
                .collect();
            let low = on_band.iter().copied().fold(f64::INFINITY, f64::min);
            let high = on_band.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(high - low <= tolerance);

            for (field, &y) in fields.iter().zip(&ys) {
                if (y - band).abs() > tolerance * 2.0 {
                    prop_assert_eq!(field.bbox.y, y);
                }
            }
            let penalized = fields.iter().filter(|f| f.penalties > 0).count();
            prop_assert_eq!(diagnostics.len(), penalized);
        }
    }
}
