//! Placement of default-sized boxes next to an anchor.

use tracing::debug;

use super::ResolvedField;
use crate::matching::text::relative_distance;
use crate::matching::{normalize_label, LabelMatcher, PageText};
use crate::models::config::PlacerConfig;
use crate::models::{BBox, RelativePosition, UnlabeledFieldHint};

/// Places unlabeled hints and fields the box resolver could not position.
pub struct UnlabeledPlacer {
    config: PlacerConfig,
    fuzzy_threshold: f64,
    page_width: f64,
    page_height: f64,
}

impl UnlabeledPlacer {
    pub fn new(config: &PlacerConfig, fuzzy_threshold: f64, page_width: f64, page_height: f64) -> Self {
        Self {
            config: config.clone(),
            fuzzy_threshold,
            page_width,
            page_height,
        }
    }

    /// Place a hint next to the resolved field or OCR text matching its nearby text.
    ///
    /// Returns `None` when no anchor is found.
    pub fn place(
        &self,
        hint: &UnlabeledFieldHint,
        resolved: &[ResolvedField],
        text: &PageText,
        matcher: &LabelMatcher,
    ) -> Option<BBox> {
        let anchor = self
            .anchor_in_fields(&hint.nearby_text, resolved)
            .or_else(|| matcher.find(&hint.nearby_text, text).map(|m| m.anchor()));

        match anchor {
            Some(anchor) => self.place_near(&anchor, hint.relative_position),
            None => {
                debug!("No anchor for nearby text '{}'", hint.nearby_text);
                None
            }
        }
    }

    /// Box of the resolved field whose label best matches `nearby`.
    fn anchor_in_fields(&self, nearby: &str, resolved: &[ResolvedField]) -> Option<BBox> {
        let wanted = normalize_label(nearby);
        if wanted.is_empty() {
            return None;
        }

        let labels: Vec<String> = resolved.iter().map(|r| normalize_label(&r.label)).collect();

        let exact = labels.iter().position(|l| *l == wanted);
        let containing = || {
            labels
                .iter()
                .position(|l| !l.is_empty() && (l.contains(&wanted) || wanted.contains(l.as_str())))
        };
        let fuzzy = || {
            labels
                .iter()
                .enumerate()
                .map(|(i, l)| (i, relative_distance(&wanted, l)))
                .filter(|(_, d)| *d <= self.fuzzy_threshold)
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(i, _)| i)
        };

        exact
            .or_else(containing)
            .or_else(fuzzy)
            .map(|i| resolved[i].bbox)
    }

    /// Default-sized box offset from an anchor, kept on the page.
    pub fn place_near(&self, anchor: &BBox, position: RelativePosition) -> Option<BBox> {
        let width = self.config.default_width;
        let height = self.config.default_height;
        let offset = self.config.offset;
        let centered_y = anchor.center_y() - height / 2.0;

        let bbox = match position {
            RelativePosition::Right => BBox::new(anchor.right() + offset, centered_y, width, height),
            RelativePosition::Left => BBox::new(anchor.x - offset - width, centered_y, width, height),
            RelativePosition::Above => BBox::new(anchor.x, anchor.top() + offset, width, height),
            RelativePosition::Below => BBox::new(anchor.x, anchor.y - offset - height, width, height),
        };

        Some(bbox.clamp_to_page(self.page_width, self.page_height)).filter(|b| b.is_valid())
    }
}
