//! Tiered label matching: exact line substring, then word runs, then fuzzy.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::rows::{PageText, TextRow};
use super::text::{compact, normalize_label, relative_distance};
use crate::layout::{TextLine, Word};
use crate::models::config::MatchingConfig;
use crate::models::{BBox, SemanticField};

/// Extra words a token run may span beyond the label's own word count.
const MAX_EXTRA_RUN_WORDS: usize = 3;

/// Which matching tier produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMethod {
    /// Normalized label is a substring of a normalized line.
    Exact,
    /// A contiguous run of words normalizes to the label.
    Token,
    /// Edit distance below the configured threshold.
    Fuzzy,
}

/// A label located in the page text.
#[derive(Debug, Clone)]
pub struct LabelMatch {
    /// Index of the row in [`PageText`].
    pub row: usize,
    /// Matched word range within the row, `None` when only the line matched.
    pub span: Option<(usize, usize)>,
    /// Label words in reading order.
    pub words: Vec<Word>,
    pub line: TextLine,
    pub method: MatchMethod,
    /// Relative edit distance (0 for exact and token matches).
    pub distance: f64,
}

impl LabelMatch {
    /// Box of the label words, or the whole line when no word run matched.
    pub fn anchor(&self) -> BBox {
        BBox::union_all(self.words.iter().map(|w| &w.bbox)).unwrap_or(self.line.bbox)
    }
}

/// A possible location for a label.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub row: usize,
    pub span: Option<(usize, usize)>,
    pub words: Vec<Word>,
    pub distance: f64,
}

impl Candidate {
    fn in_row(row_index: usize, row: &TextRow, span: Option<(usize, usize)>, distance: f64) -> Self {
        let words = span
            .map(|(start, end)| row.words[start..end].to_vec())
            .unwrap_or_default();
        Self {
            row: row_index,
            span,
            words,
            distance,
        }
    }

    fn anchor(&self, text: &PageText) -> BBox {
        BBox::union_all(self.words.iter().map(|w| &w.bbox)).unwrap_or(text.row(self.row).line.bbox)
    }

    fn key(&self) -> (usize, usize) {
        (self.row, self.span.map(|(start, _)| start).unwrap_or(usize::MAX))
    }
}

/// A single tier of the matching pipeline.
pub trait MatchStrategy: Send + Sync {
    /// Method reported for matches from this tier.
    fn method(&self) -> MatchMethod;

    /// All locations of an already-normalized label.
    fn candidates(&self, label: &str, text: &PageText) -> Vec<Candidate>;
}

/// Normalized text of a run of words, joined the way the line would read.
fn run_text(words: &[Word]) -> String {
    normalize_label(
        &words
            .iter()
            .map(|w| w.content.as_str())
            .collect::<Vec<_>>()
            .join(" "),
    )
}

/// Tier (a): the label is a substring of a line.
pub struct ExactLineStrategy;

impl ExactLineStrategy {
    /// Word runs of a row that normalize to exactly the label.
    fn exact_runs(row: &TextRow, label: &str) -> Vec<(usize, usize)> {
        let target = compact(label);
        let target_len = target.chars().count();
        let mut runs = Vec::new();

        for start in 0..row.words.len() {
            for end in start + 1..=row.words.len() {
                let joined = compact(&run_text(&row.words[start..end]));
                if joined == target {
                    runs.push((start, end));
                    break;
                }
                if joined.chars().count() > target_len {
                    break;
                }
            }
        }

        runs
    }

    /// Shortest word run whose text contains the label.
    fn containing_run(row: &TextRow, label: &str) -> Option<(usize, usize)> {
        let n = row.words.len();
        (1..=n).find_map(|len| {
            (0..=n - len)
                .find(|&start| run_text(&row.words[start..start + len]).contains(label))
                .map(|start| (start, start + len))
        })
    }
}

impl MatchStrategy for ExactLineStrategy {
    fn method(&self) -> MatchMethod {
        MatchMethod::Exact
    }

    fn candidates(&self, label: &str, text: &PageText) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for (i, row) in text.rows().iter().enumerate() {
            if !row.normalized.contains(label) {
                continue;
            }

            let runs = Self::exact_runs(row, label);
            if runs.is_empty() {
                candidates.push(Candidate::in_row(i, row, Self::containing_run(row, label), 0.0));
            } else {
                candidates.extend(runs.into_iter().map(|run| Candidate::in_row(i, row, Some(run), 0.0)));
            }
        }

        candidates
    }
}

/// Tier (b): a contiguous run of words in page reading order equals the label.
///
/// Runs may continue onto the next row, for labels that wrap.
pub struct TokenRunStrategy;

impl MatchStrategy for TokenRunStrategy {
    fn method(&self) -> MatchMethod {
        MatchMethod::Token
    }

    fn candidates(&self, label: &str, text: &PageText) -> Vec<Candidate> {
        let target = compact(label);
        let target_len = target.chars().count();
        let max_words = label.split_whitespace().count() + MAX_EXTRA_RUN_WORDS;

        let sequence: Vec<(usize, usize)> = text
            .rows()
            .iter()
            .enumerate()
            .flat_map(|(r, row)| (0..row.words.len()).map(move |w| (r, w)))
            .collect();

        let mut candidates = Vec::new();

        for start in 0..sequence.len() {
            let mut words: Vec<Word> = Vec::new();

            for &(r, w) in sequence[start..].iter().take(max_words) {
                words.push(text.row(r).words[w].clone());
                let joined = compact(&run_text(&words));

                if joined == target {
                    let (row, first) = sequence[start];
                    let in_first_row = sequence[start..start + words.len()]
                        .iter()
                        .filter(|(r, _)| *r == row)
                        .count();
                    candidates.push(Candidate {
                        row,
                        span: Some((first, first + in_first_row)),
                        words,
                        distance: 0.0,
                    });
                    break;
                }
                if joined.chars().count() > target_len {
                    break;
                }
            }
        }

        candidates
    }
}

/// Tier (c): smallest edit distance below a threshold relative to label length.
pub struct FuzzyStrategy {
    threshold: f64,
    min_label_chars: usize,
}

impl FuzzyStrategy {
    pub fn new(threshold: f64, min_label_chars: usize) -> Self {
        Self {
            threshold,
            min_label_chars,
        }
    }

    /// Best window of a row, compared against the label.
    fn best_in_row(&self, row: &TextRow, label: &str) -> Option<(Option<(usize, usize)>, f64)> {
        let n = row.words.len();
        if n == 0 {
            return Some((None, relative_distance(label, &row.normalized)));
        }

        let tokens = label.split_whitespace().count().max(1);
        let sizes = tokens.saturating_sub(1).max(1)..=(tokens + 1).min(n);

        sizes
            .flat_map(|len| (0..=n - len).map(move |start| (start, start + len)))
            .map(|(start, end)| {
                let distance = relative_distance(label, &run_text(&row.words[start..end]));
                (Some((start, end)), distance)
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}

impl MatchStrategy for FuzzyStrategy {
    fn method(&self) -> MatchMethod {
        MatchMethod::Fuzzy
    }

    fn candidates(&self, label: &str, text: &PageText) -> Vec<Candidate> {
        if label.chars().count() < self.min_label_chars {
            return Vec::new();
        }

        text.rows()
            .iter()
            .enumerate()
            .filter_map(|(i, row)| {
                let (span, distance) = self.best_in_row(row, label)?;
                (distance <= self.threshold).then(|| Candidate::in_row(i, row, span, distance))
            })
            .collect()
    }
}

/// Matches already made on the page, used to break ties between candidates.
#[derive(Debug, Default)]
pub struct MatchContext {
    used: HashSet<(usize, usize)>,
    row_groups: HashMap<String, Vec<BBox>>,
    sections: HashMap<String, Vec<BBox>>,
}

impl MatchContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a match so later fields can use it as a neighbor.
    pub fn record(&mut self, field: &SemanticField, m: &LabelMatch) {
        self.used
            .insert((m.row, m.span.map(|(start, _)| start).unwrap_or(usize::MAX)));

        let anchor = m.anchor();
        if let Some(group) = &field.row_group {
            self.row_groups.entry(group.clone()).or_default().push(anchor);
        }
        if let Some(section) = &field.section {
            self.sections.entry(section.clone()).or_default().push(anchor);
        }
    }

    fn is_used(&self, candidate: &Candidate) -> bool {
        self.used.contains(&candidate.key())
    }

    /// Anchors of already-matched fields in the same row group, else the same section.
    fn neighbors(&self, field: &SemanticField) -> &[BBox] {
        let by_group = field
            .row_group
            .as_ref()
            .and_then(|g| self.row_groups.get(g))
            .filter(|v| !v.is_empty());
        let by_section = || {
            field
                .section
                .as_ref()
                .and_then(|s| self.sections.get(s))
                .filter(|v| !v.is_empty())
        };

        by_group.or_else(by_section).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

/// Locates semantic labels in OCR text.
pub struct LabelMatcher {
    strategies: Vec<Box<dyn MatchStrategy>>,
}

impl LabelMatcher {
    /// Create a matcher with the exact, token and fuzzy tiers.
    pub fn new(config: &MatchingConfig) -> Self {
        Self::with_strategies(vec![
            Box::new(ExactLineStrategy),
            Box::new(TokenRunStrategy),
            Box::new(FuzzyStrategy::new(
                config.fuzzy_threshold,
                config.min_fuzzy_label_chars,
            )),
        ])
    }

    /// Create a matcher with a custom strategy pipeline, tried in order.
    pub fn with_strategies(strategies: Vec<Box<dyn MatchStrategy>>) -> Self {
        Self { strategies }
    }

    /// Locate a semantic field's label.
    pub fn match_field(
        &self,
        field: &SemanticField,
        text: &PageText,
        context: &MatchContext,
    ) -> Option<LabelMatch> {
        let found = self.locate(&field.label_text, text, |candidates| {
            Self::select(candidates, text, context, field)
        });

        match &found {
            Some(m) => debug!(
                "Matched '{}' on row {} ({:?}, distance {:.2})",
                field.label_text, m.row, m.method, m.distance
            ),
            None => debug!("No match for '{}'", field.label_text),
        }

        found
    }

    /// Locate arbitrary text, taking the first best candidate in document order.
    pub fn find(&self, text_to_find: &str, text: &PageText) -> Option<LabelMatch> {
        self.locate(text_to_find, text, |candidates| {
            let best = candidates.iter().map(|c| c.distance).fold(f64::INFINITY, f64::min);
            candidates.into_iter().find(|c| c.distance <= best)
        })
    }

    fn locate(
        &self,
        raw: &str,
        text: &PageText,
        select: impl Fn(Vec<Candidate>) -> Option<Candidate>,
    ) -> Option<LabelMatch> {
        let label = normalize_label(raw);
        if label.is_empty() {
            return None;
        }

        self.strategies.iter().find_map(|strategy| {
            let candidates = strategy.candidates(&label, text);
            if candidates.is_empty() {
                return None;
            }

            let chosen = select(candidates)?;
            let row = text.row(chosen.row);
            Some(LabelMatch {
                row: chosen.row,
                span: chosen.span,
                words: chosen.words,
                line: row.line.clone(),
                method: strategy.method(),
                distance: chosen.distance,
            })
        })
    }

    /// Pick the best candidate: lowest distance, unused, then closest to neighbors.
    fn select(
        candidates: Vec<Candidate>,
        text: &PageText,
        context: &MatchContext,
        field: &SemanticField,
    ) -> Option<Candidate> {
        let best = candidates.iter().map(|c| c.distance).fold(f64::INFINITY, f64::min);
        let mut tied: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| c.distance <= best + f64::EPSILON)
            .collect();

        if tied.iter().any(|c| !context.is_used(c)) {
            tied.retain(|c| !context.is_used(c));
        }

        let neighbors = context.neighbors(field);
        if tied.len() > 1 && !neighbors.is_empty() {
            let closeness = |c: &Candidate| {
                let anchor = c.anchor(text);
                neighbors
                    .iter()
                    .map(|n| anchor.center_distance(n))
                    .fold(f64::INFINITY, f64::min)
            };
            return tied
                .into_iter()
                .min_by(|a, b| closeness(a).total_cmp(&closeness(b)));
        }

        tied.into_iter().next()
    }
}
