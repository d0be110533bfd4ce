//! Page and document extraction: the fusion engine entry points.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::assembler::FieldAssembler;
use crate::error::PageExtractionError;
use crate::layout::{Normalizer, PageLayout};
use crate::matching::{
    normalize_label, related_mismatches, FieldAnchor, LabelMatch, LabelMatcher, LinePartition,
    MatchContext, MatchMethod, PageText, RowPartitioner,
};
use crate::models::{
    BBox, Diagnostic, DiagnosticKind, Direction, ExtractedField, FieldKind, FuseConfig, OcrDocument,
    OcrPage, RelativePosition, SemanticDocument, SemanticField, SemanticPage, UnlabeledFieldHint,
};
use crate::resolve::{
    BoxResolver, ClaimedMarks, ConfidenceBasis, FieldGeometry, Provenance, ResolvedField,
    UnlabeledPlacer,
};

/// Page dimensions of the two sources may differ by this much (points).
const DIMENSION_TOLERANCE: f64 = 1.0;

/// Fields and diagnostics for one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageExtraction {
    pub page_number: u32,
    pub fields: Vec<ExtractedField>,
    pub diagnostics: Vec<Diagnostic>,
}

/// A page that could not be processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageFailure {
    pub page_number: u32,
    pub message: String,
}

impl From<&PageExtractionError> for PageFailure {
    fn from(err: &PageExtractionError) -> Self {
        Self {
            page_number: err.page_number(),
            message: err.to_string(),
        }
    }
}

/// Results for a whole document, in page order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentExtraction {
    pub pages: Vec<PageExtraction>,
    pub errors: Vec<PageFailure>,
}

impl DocumentExtraction {
    /// All fields of all pages.
    pub fn fields(&self) -> impl Iterator<Item = &ExtractedField> {
        self.pages.iter().flat_map(|p| p.fields.iter())
    }

    /// All diagnostics of all pages.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.pages.iter().flat_map(|p| p.diagnostics.iter())
    }

    /// Every page was processed.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Trait for form field extractors.
pub trait FormExtractor {
    /// Extract the fields of one page from its two evidence records.
    fn extract_page(
        &self,
        ocr: &OcrPage,
        semantic: &SemanticPage,
    ) -> Result<PageExtraction, PageExtractionError>;

    /// Extract every page of a document; failed pages are reported, not fatal.
    fn extract_document(&self, ocr: &OcrDocument, semantic: &SemanticDocument) -> DocumentExtraction;
}

/// The two evidence records of a page, or why they could not be paired.
enum PageJob<'a> {
    Paired(&'a OcrPage, &'a SemanticPage),
    Invalid(PageExtractionError),
}

/// Fuses OCR geometry and semantic field descriptions into positioned fields.
pub struct FusionEngine {
    config: FuseConfig,
    matcher: LabelMatcher,
}

impl FusionEngine {
    /// Create an engine with the default matching pipeline.
    pub fn new(config: FuseConfig) -> Self {
        let matcher = LabelMatcher::new(&config.matching);
        Self { config, matcher }
    }

    /// Create an engine with a custom label matcher.
    pub fn with_matcher(config: FuseConfig, matcher: LabelMatcher) -> Self {
        Self { config, matcher }
    }

    pub fn config(&self) -> &FuseConfig {
        &self.config
    }

    fn check_dimensions(
        layout: &PageLayout,
        semantic: &SemanticPage,
    ) -> Result<(), PageExtractionError> {
        let width_ok = semantic
            .page_width
            .is_none_or(|w| (w - layout.width).abs() <= DIMENSION_TOLERANCE);
        let height_ok = semantic
            .page_height
            .is_none_or(|h| (h - layout.height).abs() <= DIMENSION_TOLERANCE);

        if width_ok && height_ok {
            return Ok(());
        }

        Err(PageExtractionError::DimensionMismatch {
            page: layout.page_number,
            ocr_width: layout.width,
            ocr_height: layout.height,
            semantic_width: semantic.page_width.unwrap_or(layout.width),
            semantic_height: semantic.page_height.unwrap_or(layout.height),
        })
    }

    /// Partition every row matched by two or more fields.
    fn partition_rows(text: &PageText, matches: &[Option<LabelMatch>]) -> HashMap<usize, LinePartition> {
        let mut by_row: BTreeMap<usize, Vec<FieldAnchor>> = BTreeMap::new();
        for (i, m) in matches.iter().enumerate() {
            if let Some(m) = m {
                by_row.entry(m.row).or_default().push(FieldAnchor {
                    field: i,
                    span: m.span,
                    anchor: m.anchor(),
                });
            }
        }

        by_row
            .into_iter()
            .filter(|(_, anchors)| anchors.len() >= 2)
            .map(|(row, anchors)| {
                debug!("Partitioning row {} between {} fields", row, anchors.len());
                (row, RowPartitioner::partition(row, text.row(row), &anchors))
            })
            .collect()
    }

    /// First unused hint describing the same field.
    fn find_hint(field: &SemanticField, hints: &[UnlabeledFieldHint], used: &[bool]) -> Option<usize> {
        let label = normalize_label(&field.label_text);
        hints.iter().enumerate().position(|(j, hint)| {
            !used[j]
                && (field.visual_description.as_deref() == Some(hint.visual_description.as_str())
                    || normalize_label(&hint.nearby_text) == label)
        })
    }

    /// Place a field from its hint, claiming the hint only once it is placed.
    fn place_from_hint(
        field: &SemanticField,
        hints: &[UnlabeledFieldHint],
        used: &mut [bool],
        place: impl FnOnce(&UnlabeledFieldHint) -> Option<BBox>,
    ) -> Option<BBox> {
        let index = Self::find_hint(field, hints, used)?;
        let bbox = place(&hints[index])?;
        used[index] = true;
        Some(bbox)
    }

    /// Run every paired page, in parallel when enabled.
    #[cfg(feature = "parallel")]
    fn run_pages(&self, jobs: &[PageJob<'_>]) -> Vec<Result<PageExtraction, PageExtractionError>> {
        use rayon::prelude::*;

        if self.config.parallel.enabled {
            jobs.par_iter().map(|job| self.run_page(job)).collect()
        } else {
            jobs.iter().map(|job| self.run_page(job)).collect()
        }
    }

    /// Run every paired page.
    #[cfg(not(feature = "parallel"))]
    fn run_pages(&self, jobs: &[PageJob<'_>]) -> Vec<Result<PageExtraction, PageExtractionError>> {
        jobs.iter().map(|job| self.run_page(job)).collect()
    }

    fn run_page(&self, job: &PageJob<'_>) -> Result<PageExtraction, PageExtractionError> {
        match job {
            PageJob::Paired(ocr, semantic) => self.extract_page(ocr, semantic),
            PageJob::Invalid(err) => Err(err.clone()),
        }
    }
}

impl Default for FusionEngine {
    fn default() -> Self {
        Self::new(FuseConfig::default())
    }
}

/// Pair OCR and semantic pages by page number, in page order.
fn pair_pages<'a>(ocr: &'a OcrDocument, semantic: &'a SemanticDocument) -> Vec<PageJob<'a>> {
    let mut ocr_pages: BTreeMap<u32, Vec<&OcrPage>> = BTreeMap::new();
    for page in &ocr.pages {
        ocr_pages.entry(page.page_number).or_default().push(page);
    }
    let mut semantic_pages: BTreeMap<u32, Vec<&SemanticPage>> = BTreeMap::new();
    for page in &semantic.pages {
        semantic_pages.entry(page.page_number).or_default().push(page);
    }

    let numbers: BTreeSet<u32> = ocr_pages.keys().chain(semantic_pages.keys()).copied().collect();

    numbers
        .into_iter()
        .map(|n| {
            let o = ocr_pages.get(&n).map(|v| v.as_slice()).unwrap_or(&[]);
            let s = semantic_pages.get(&n).map(|v| v.as_slice()).unwrap_or(&[]);
            match (o, s) {
                ([o], [s]) => PageJob::Paired(*o, *s),
                ([], _) => PageJob::Invalid(PageExtractionError::MissingOcrPage(n)),
                (_, []) => PageJob::Invalid(PageExtractionError::MissingSemanticPage(n)),
                _ => PageJob::Invalid(PageExtractionError::DuplicatePage(n)),
            }
        })
        .collect()
}

/// Side of the label a field's input sits on when reading in `direction`.
fn reading_side(direction: Direction) -> RelativePosition {
    if direction.is_rtl() {
        RelativePosition::Left
    } else {
        RelativePosition::Right
    }
}

fn semantic_field(
    index: usize,
    field: &SemanticField,
    bbox: BBox,
    segments: Option<Vec<BBox>>,
    basis: ConfidenceBasis,
    penalties: u32,
) -> ResolvedField {
    ResolvedField {
        provenance: Provenance::Semantic(index),
        label: field.label_text.clone(),
        name_hint: field.name.clone(),
        kind: FieldKind::from_semantic(field.field_type, field.input_type),
        required: field.required,
        section: field.section.clone(),
        row_group: field.row_group.clone(),
        bbox,
        segments,
        basis,
        penalties,
    }
}

fn unlabeled_field(index: usize, hint: &UnlabeledFieldHint, bbox: BBox) -> ResolvedField {
    let label = if hint.visual_description.trim().is_empty() {
        hint.nearby_text.clone()
    } else {
        hint.visual_description.clone()
    };

    ResolvedField {
        provenance: Provenance::Unlabeled(index),
        label,
        name_hint: None,
        kind: FieldKind::from_semantic(hint.field_type, hint.input_type),
        required: false,
        section: hint.section.clone(),
        row_group: None,
        bbox,
        segments: None,
        basis: ConfidenceBasis::Placed,
        penalties: 0,
    }
}

impl FormExtractor for FusionEngine {
    fn extract_page(
        &self,
        ocr: &OcrPage,
        semantic: &SemanticPage,
    ) -> Result<PageExtraction, PageExtractionError> {
        let page_number = ocr.page_number;
        if semantic.page_number != page_number {
            return Err(PageExtractionError::PageNumberMismatch {
                ocr: page_number,
                semantic: semantic.page_number,
            });
        }

        let (layout, mut diagnostics) = Normalizer::normalize_page(ocr)?;
        Self::check_dimensions(&layout, semantic)?;

        let config = &self.config;
        let text = PageText::build(&layout, config.geometry.row_tolerance);
        let fields = &semantic.fields;
        let hints = &semantic.unlabeled_fields;

        // Label matching, in semantic order
        let mut context = MatchContext::new();
        let mut matches: Vec<Option<LabelMatch>> = Vec::with_capacity(fields.len());
        for field in fields {
            let found = self.matcher.match_field(field, &text, &context);
            if let Some(m) = &found {
                context.record(field, m);
            }
            matches.push(found);
        }

        let partitions = Self::partition_rows(&text, &matches);

        let mut penalties: Vec<u32> = matches
            .iter()
            .map(|m| match m {
                Some(m) if m.method == MatchMethod::Fuzzy => 1,
                _ => 0,
            })
            .collect();

        let rows: Vec<Option<usize>> = matches.iter().map(|m| m.as_ref().map(|m| m.row)).collect();
        for mismatch in related_mismatches(fields, &rows) {
            penalties[mismatch.field] += 1;
            let label = &fields[mismatch.field].label_text;
            let message = format!(
                "'{}' lists '{}' as related, but {}",
                label, mismatch.related, mismatch.reason
            );
            warn!("Page {}: {}", page_number, message);
            diagnostics.push(
                Diagnostic::warning(page_number, DiagnosticKind::PartitionMismatch, message)
                    .with_label(label.clone()),
            );
        }

        let resolver = BoxResolver::new(&config.geometry, &config.resolver, layout.width, layout.height);
        let placer = UnlabeledPlacer::new(
            &config.placer,
            config.matching.fuzzy_threshold,
            layout.width,
            layout.height,
        );
        let mut claimed = ClaimedMarks::new();
        let mut hint_used = vec![false; hints.len()];
        let mut resolved: Vec<ResolvedField> = Vec::with_capacity(fields.len() + hints.len());

        for (i, field) in fields.iter().enumerate() {
            let Some(m) = &matches[i] else {
                let placed = Self::place_from_hint(field, hints, &mut hint_used, |hint| {
                    placer.place(hint, &resolved, &text, &self.matcher)
                });

                match placed {
                    Some(bbox) => {
                        debug!("Placed unmatched '{}' from its hint", field.label_text);
                        resolved.push(semantic_field(i, field, bbox, None, ConfidenceBasis::Placed, penalties[i]));
                    }
                    None => {
                        let message = format!("no OCR text matches label '{}'", field.label_text);
                        warn!("Page {}: {}", page_number, message);
                        diagnostics.push(
                            Diagnostic::warning(page_number, DiagnosticKind::UnmatchedField, message)
                                .with_label(field.label_text.clone()),
                        );
                    }
                }
                continue;
            };

            let mut geometry = FieldGeometry::new(m.anchor(), text.row(m.row));
            let cluster = partitions.get(&m.row).and_then(|p| p.cluster_for(i));
            if let Some(cluster) = cluster {
                geometry = geometry.with_cluster(cluster);
            }

            if let Some(r) = resolver.resolve(field, &geometry, &layout, &mut claimed) {
                let basis = if r.synthesized {
                    ConfidenceBasis::Synthesized
                } else if cluster.is_some() {
                    ConfidenceBasis::Partitioned
                } else {
                    ConfidenceBasis::LineMatch
                };
                resolved.push(semantic_field(i, field, r.bbox, r.segments, basis, penalties[i]));
                continue;
            }

            diagnostics.push(
                Diagnostic::info(
                    page_number,
                    DiagnosticKind::ResolverFallback,
                    format!(
                        "no {} geometry for '{}'; placed next to its label",
                        field.field_type.as_str(),
                        field.label_text
                    ),
                )
                .with_label(field.label_text.clone()),
            );

            let placed = Self::place_from_hint(field, hints, &mut hint_used, |hint| {
                placer.place(hint, &resolved, &text, &self.matcher)
            })
            .or_else(|| placer.place_near(&geometry.anchor, reading_side(geometry.direction)));

            match placed {
                Some(bbox) => {
                    resolved.push(semantic_field(i, field, bbox, None, ConfidenceBasis::Placed, penalties[i]))
                }
                None => {
                    let message = format!("'{}' could not be positioned; omitted", field.label_text);
                    warn!("Page {}: {}", page_number, message);
                    diagnostics.push(
                        Diagnostic::warning(page_number, DiagnosticKind::OmittedField, message)
                            .with_label(field.label_text.clone()),
                    );
                }
            }
        }

        for (j, hint) in hints.iter().enumerate() {
            if hint_used[j] {
                continue;
            }

            match placer.place(hint, &resolved, &text, &self.matcher) {
                Some(bbox) => resolved.push(unlabeled_field(j, hint, bbox)),
                None => {
                    let message = format!(
                        "no anchor for unlabeled field near '{}'; dropped",
                        hint.nearby_text
                    );
                    warn!("Page {}: {}", page_number, message);
                    diagnostics.push(
                        Diagnostic::warning(page_number, DiagnosticKind::DroppedHint, message)
                            .with_label(hint.visual_description.clone()),
                    );
                }
            }
        }

        let assembler = FieldAssembler::new(config.geometry.row_tolerance);
        diagnostics.extend(assembler.align_row_groups(page_number, &mut resolved));
        let fields = assembler.assemble(page_number, resolved);

        info!(
            "Page {}: extracted {} fields ({} semantic, {} hints), {} diagnostics",
            page_number,
            fields.len(),
            semantic.fields.len(),
            hints.len(),
            diagnostics.len()
        );

        Ok(PageExtraction {
            page_number,
            fields,
            diagnostics,
        })
    }

    fn extract_document(&self, ocr: &OcrDocument, semantic: &SemanticDocument) -> DocumentExtraction {
        let jobs = pair_pages(ocr, semantic);
        info!("Extracting {} pages", jobs.len());

        let mut result = DocumentExtraction::default();
        for outcome in self.run_pages(&jobs) {
            match outcome {
                Ok(page) => result.pages.push(page),
                Err(err) => {
                    warn!("Page {} failed: {}", err.page_number(), err);
                    result.errors.push(PageFailure::from(&err));
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{field, hint, semantic_page, PageBuilder};
    use crate::models::{FieldSource, FieldStyle, InputType, MarkState};
    use pretty_assertions::assert_eq;

    fn engine() -> FusionEngine {
        FusionEngine::default()
    }

    fn related(mut f: SemanticField, group: &str, others: &[&str]) -> SemanticField {
        f.row_group = Some(group.to_string());
        f.related_fields = others.iter().map(|s| s.to_string()).collect();
        f
    }

    fn agent_line(ocr: PageBuilder) -> PageExtraction {
        let ocr = ocr
            .line_with_words(
                "שם הסוכן:     מס' הסוכן:",
                &[
                    ("שם", BBox::new(530.0, 700.0, 30.0, 12.0)),
                    ("הסוכן:", BBox::new(480.0, 700.0, 45.0, 12.0)),
                    ("מס'", BBox::new(300.0, 700.0, 25.0, 12.0)),
                    ("הסוכן:", BBox::new(250.0, 700.0, 45.0, 12.0)),
                ],
            )
            .build();

        let mut agent = related(
            field("שם הסוכן", FieldStyle::Underline, InputType::Text),
            "row_1",
            &["מס' הסוכן"],
        );
        agent.name = Some("agent_name".to_string());
        let mut number = related(
            field("מס' הסוכן", FieldStyle::DigitBoxes, InputType::Number),
            "row_1",
            &["שם הסוכן"],
        );
        number.name = Some("number".to_string());

        engine()
            .extract_page(&ocr, &semantic_page(1, vec![agent, number]))
            .unwrap()
    }

    fn checkbox(ocr: PageBuilder, mark: BBox) -> PageExtraction {
        let ocr = ocr
            .line_with_words(
                "אישור תקנון",
                &[
                    ("אישור", BBox::new(450.0, 400.0, 35.0, 15.0)),
                    ("תקנון", BBox::new(415.0, 400.0, 32.0, 15.0)),
                ],
            )
            .mark(MarkState::Unselected, mark)
            .build();
        let mut f = field("אישור תקנון", FieldStyle::SelectionMark, InputType::Checkbox);
        f.has_visible_boundary = Some(false);

        engine().extract_page(&ocr, &semantic_page(1, vec![f])).unwrap()
    }

    fn assert_same_fields(a: &PageExtraction, b: &PageExtraction) {
        assert_eq!(a.fields.len(), b.fields.len());
        for (x, y) in a.fields.iter().zip(&b.fields) {
            assert_eq!(x.name, y.name);
            assert_eq!(x.confidence, y.confidence);
            assert_eq!(x.segments.as_ref().map(Vec::len), y.segments.as_ref().map(Vec::len));
            for (p, q) in [(x.x, y.x), (x.y, y.y), (x.width, y.width), (x.height, y.height)] {
                assert!((p - q).abs() < 1e-6, "{} vs {} for {}", p, q, x.name);
            }
        }
        assert_eq!(a.diagnostics.len(), b.diagnostics.len());
    }

    #[test]
    fn test_agent_line_two_fields() {
        let out = agent_line(PageBuilder::new());

        let names: Vec<&str> = out.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["agent_name", "number"]);
        assert!(out.fields.iter().all(|f| f.direction == Direction::Rtl));
        assert!(out.fields.iter().all(|f| f.page_number == 1));
        assert_eq!(out.fields[0].label, "שם הסוכן");
        assert_eq!(out.fields[1].label, "מס' הסוכן");
        assert!(out.fields[0].x > out.fields[1].x);

        assert_eq!(out.fields[0].bbox(), BBox::new(297.0, 698.0, 181.0, 16.0));
        assert_eq!(out.fields[0].confidence, 0.8);
        assert_eq!(out.fields[1].kind, FieldKind::Number);
        assert_eq!(out.fields[1].segments.as_ref().map(|s| s.len()), Some(9));
        assert_eq!(out.fields[1].confidence, 0.6);
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_agent_line_in_inches() {
        let points = agent_line(PageBuilder::new());
        let inches = agent_line(PageBuilder::new().inches());

        assert_same_fields(&points, &inches);
        assert!((inches.fields[0].x - 297.0).abs() < 1e-6);
        assert!((inches.fields[0].y - 698.0).abs() < 1e-6);
    }

    #[test]
    fn test_address_line_three_fields() {
        let ocr = PageBuilder::new()
            .line_with_words(
                "עיר:    מיקוד:    רח':",
                &[
                    ("עיר:", BBox::new(520.0, 600.0, 40.0, 12.0)),
                    ("מיקוד:", BBox::new(380.0, 600.0, 50.0, 12.0)),
                    ("רח':", BBox::new(240.0, 600.0, 30.0, 12.0)),
                ],
            )
            .build();
        let labels = ["עיר", "מיקוד", "רח'"];
        let fields = labels
            .iter()
            .map(|label| {
                let others: Vec<&str> = labels.iter().copied().filter(|l| l != label).collect();
                related(field(label, FieldStyle::Underline, InputType::Text), "row_3", &others)
            })
            .collect();

        let out = engine().extract_page(&ocr, &semantic_page(1, fields)).unwrap();

        assert_eq!(out.fields.len(), 3);
        let xs: Vec<f64> = out.fields.iter().map(|f| f.x).collect();
        assert!(xs.windows(2).all(|w| w[0] > w[1]));
        let ys: Vec<f64> = out.fields.iter().map(|f| f.y).collect();
        assert!(ys.iter().all(|y| (y - ys[0]).abs() <= 8.0));
        assert!(out.fields.iter().all(|f| f.row_group.as_deref() == Some("row_3")));
        assert_eq!(out.fields[0].bbox(), BBox::new(432.0, 598.0, 86.0, 16.0));
        assert_eq!(out.fields[1].bbox(), BBox::new(272.0, 598.0, 106.0, 16.0));
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_checkbox_takes_single_mark() {
        let mark = BBox::new(395.0, 400.0, 15.0, 15.0);
        let out = checkbox(PageBuilder::new(), mark);

        assert_eq!(out.fields.len(), 1);
        assert_eq!(out.fields[0].bbox(), mark);
        assert_eq!(out.fields[0].confidence, 1.0);
        assert_eq!(out.fields[0].kind, FieldKind::Checkbox);
    }

    #[test]
    fn test_checkbox_in_inches() {
        let mark = BBox::new(395.0, 400.0, 15.0, 15.0);
        let points = checkbox(PageBuilder::new(), mark);
        let inches = checkbox(PageBuilder::new().inches(), mark);

        assert_same_fields(&points, &inches);
        assert_eq!(inches.fields[0].kind, FieldKind::Checkbox);
        assert!((inches.fields[0].x - 395.0).abs() < 1e-6);
    }

    #[test]
    fn test_hint_placed_right_of_resolved_field() {
        let ocr = PageBuilder::new()
            .line_with_words("Phone:", &[("Phone:", BBox::new(50.0, 500.0, 40.0, 12.0))])
            .build();
        let mut semantic = semantic_page(1, vec![field("Phone", FieldStyle::Underline, InputType::Text)]);
        semantic
            .unlabeled_fields
            .push(hint("Phone", RelativePosition::Right, "extension box"));

        let out = engine().extract_page(&ocr, &semantic).unwrap();

        assert_eq!(out.fields.len(), 2);
        let phone = out.fields.iter().find(|f| f.source == FieldSource::Semantic).unwrap();
        let extra = out.fields.iter().find(|f| f.source == FieldSource::Unlabeled).unwrap();
        assert_eq!(extra.confidence, 0.5);
        assert_eq!(extra.label, "extension box");
        assert_eq!(extra.x, phone.bbox().right() + 4.0);
        assert_eq!(extra.bbox().center_y(), phone.bbox().center_y());
    }

    #[test]
    fn test_degenerate_word_never_yields_empty_box() {
        let ocr = PageBuilder::new()
            .line("שם:", BBox::new(100.0, 700.0, 200.0, 12.0))
            .raw_word("שם:", [150.0, 80.0, 150.0, 80.0, 150.0, 92.0, 150.0, 92.0])
            .build();
        let f = field("שם", FieldStyle::Underline, InputType::Text);

        let out = engine().extract_page(&ocr, &semantic_page(1, vec![f])).unwrap();

        assert!(out
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::DegenerateGeometry));
        assert!(out.fields.iter().all(|f| f.width > 0.0 && f.height > 0.0));
    }

    #[test]
    fn test_page_number_mismatch_is_fatal() {
        let ocr = PageBuilder::new().page_number(2).build();
        let err = engine().extract_page(&ocr, &semantic_page(3, Vec::new())).unwrap_err();
        assert_eq!(err, PageExtractionError::PageNumberMismatch { ocr: 2, semantic: 3 });
    }

    #[test]
    fn test_dimension_mismatch_is_fatal() {
        let ocr = PageBuilder::new().build();
        let mut semantic = semantic_page(1, Vec::new());
        semantic.page_width = Some(595.0);
        semantic.page_height = Some(792.0);

        let err = engine().extract_page(&ocr, &semantic).unwrap_err();
        assert!(matches!(err, PageExtractionError::DimensionMismatch { page: 1, .. }));

        semantic.page_width = Some(612.4);
        assert!(engine().extract_page(&ocr, &semantic).is_ok());
    }

    #[test]
    fn test_unmatched_field_reported() {
        let ocr = PageBuilder::new()
            .line_with_words("טלפון:", &[("טלפון:", BBox::new(500.0, 500.0, 40.0, 12.0))])
            .build();
        let f = field("כתובת מגורים", FieldStyle::Underline, InputType::Text);

        let out = engine().extract_page(&ocr, &semantic_page(1, vec![f])).unwrap();

        assert!(out.fields.is_empty());
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].kind, DiagnosticKind::UnmatchedField);
        assert_eq!(out.diagnostics[0].label.as_deref(), Some("כתובת מגורים"));
    }

    #[test]
    fn test_unmatched_field_placed_from_hint() {
        let ocr = PageBuilder::new()
            .line_with_words("Comments", &[("Comments", BBox::new(50.0, 300.0, 60.0, 12.0))])
            .build();
        let mut f = field("Notes", FieldStyle::BoxWithTitle, InputType::Text);
        f.visual_description = Some("large empty box".to_string());
        let mut semantic = semantic_page(1, vec![f]);
        semantic
            .unlabeled_fields
            .push(hint("Comments", RelativePosition::Below, "large empty box"));

        let out = engine().extract_page(&ocr, &semantic).unwrap();

        assert_eq!(out.fields.len(), 1);
        assert_eq!(out.fields[0].label, "Notes");
        assert_eq!(out.fields[0].source, FieldSource::Semantic);
        assert_eq!(out.fields[0].confidence, 0.5);
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_dropped_hint_reported() {
        let ocr = PageBuilder::new().build();
        let mut semantic = semantic_page(1, Vec::new());
        semantic
            .unlabeled_fields
            .push(hint("nowhere", RelativePosition::Left, "box"));

        let out = engine().extract_page(&ocr, &semantic).unwrap();

        assert!(out.fields.is_empty());
        assert_eq!(out.diagnostics[0].kind, DiagnosticKind::DroppedHint);
    }

    #[test]
    fn test_hint_stays_available_when_field_placement_fails() {
        let ocr = PageBuilder::new().build();
        let mut f = field("Notes", FieldStyle::BoxWithTitle, InputType::Text);
        f.visual_description = Some("large empty box".to_string());
        let mut semantic = semantic_page(1, vec![f]);
        semantic
            .unlabeled_fields
            .push(hint("nowhere", RelativePosition::Below, "large empty box"));

        let out = engine().extract_page(&ocr, &semantic).unwrap();

        assert!(out.fields.is_empty());
        let kinds: Vec<DiagnosticKind> = out.diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(kinds, [DiagnosticKind::UnmatchedField, DiagnosticKind::DroppedHint]);
    }

    #[test]
    fn test_related_mismatch_penalized() {
        let ocr = PageBuilder::new()
            .line_with_words("First ______", &[
                ("First", BBox::new(50.0, 700.0, 40.0, 12.0)),
                ("______", BBox::new(95.0, 700.0, 150.0, 12.0)),
            ])
            .line_with_words("Last ______", &[
                ("Last", BBox::new(50.0, 600.0, 40.0, 12.0)),
                ("______", BBox::new(95.0, 600.0, 150.0, 12.0)),
            ])
            .build();
        let first = related(field("First", FieldStyle::Underline, InputType::Text), "row_1", &["Last"]);
        let mut last = field("Last", FieldStyle::Underline, InputType::Text);
        last.row_group = Some("row_1".to_string());

        let out = engine().extract_page(&ocr, &semantic_page(1, vec![first, last])).unwrap();

        assert_eq!(out.fields.len(), 2);
        let first = out.fields.iter().find(|f| f.label == "First").unwrap();
        // one penalty for the relation, one for being off the row group
        assert_eq!(first.confidence, 0.8);
        let kinds: Vec<DiagnosticKind> = out.diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            [DiagnosticKind::PartitionMismatch, DiagnosticKind::RowGroupMismatch]
        );
        let last = out.fields.iter().find(|f| f.label == "Last").unwrap();
        assert_eq!(first.y, 698.0);
        assert_eq!(last.y, 598.0);
        assert_ne!(first.bbox(), last.bbox());
    }

    #[test]
    fn test_fuzzy_match_costs_confidence() {
        let ocr = PageBuilder::new()
            .line_with_words("Adress ______", &[
                ("Adress", BBox::new(50.0, 500.0, 45.0, 12.0)),
                ("______", BBox::new(100.0, 500.0, 150.0, 12.0)),
            ])
            .build();
        let f = field("Address", FieldStyle::Underline, InputType::Text);

        let out = engine().extract_page(&ocr, &semantic_page(1, vec![f])).unwrap();

        assert_eq!(out.fields[0].confidence, 0.9);
    }

    #[test]
    fn test_resolver_fallback_places_next_to_label() {
        let ocr = PageBuilder::new()
            .line_with_words("גיל", &[("גיל", BBox::new(500.0, 500.0, 30.0, 12.0))])
            .build();
        let f = field("גיל", FieldStyle::TableCell, InputType::Number);

        let out = engine().extract_page(&ocr, &semantic_page(1, vec![f])).unwrap();

        assert_eq!(out.fields.len(), 1);
        assert_eq!(out.fields[0].confidence, 0.5);
        assert!(out.fields[0].bbox().right() <= 500.0);
        assert_eq!(out.diagnostics[0].kind, DiagnosticKind::ResolverFallback);
    }

    #[test]
    fn test_document_pairs_pages() {
        let ocr = OcrDocument {
            pages: vec![
                PageBuilder::new().page_number(2).build(),
                PageBuilder::new().page_number(1).build(),
            ],
        };
        let semantic = SemanticDocument {
            pages: vec![semantic_page(1, Vec::new()), semantic_page(3, Vec::new())],
        };

        let out = engine().extract_document(&ocr, &semantic);

        let pages: Vec<u32> = out.pages.iter().map(|p| p.page_number).collect();
        assert_eq!(pages, [1]);
        let failed: Vec<u32> = out.errors.iter().map(|e| e.page_number).collect();
        assert_eq!(failed, [2, 3]);
        assert!(!out.is_complete());
    }

    #[test]
    fn test_document_sequential_matches_parallel() {
        let build = |n: u32| {
            PageBuilder::new()
                .page_number(n)
                .line_with_words("עיר:", &[("עיר:", BBox::new(500.0, 600.0, 30.0, 12.0))])
                .build()
        };
        let ocr = OcrDocument {
            pages: (1..=4).map(build).collect(),
        };
        let semantic = SemanticDocument {
            pages: (1..=4)
                .map(|n| semantic_page(n, vec![field("עיר", FieldStyle::Underline, InputType::Text)]))
                .collect(),
        };

        let mut config = FuseConfig::default();
        config.parallel.enabled = false;
        let sequential = FusionEngine::new(config).extract_document(&ocr, &semantic);
        let parallel = engine().extract_document(&ocr, &semantic);

        assert_eq!(sequential.pages.len(), 4);
        assert_eq!(
            sequential.fields().cloned().collect::<Vec<_>>(),
            parallel.fields().cloned().collect::<Vec<_>>()
        );
    }
}
