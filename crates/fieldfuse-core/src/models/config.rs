//! Configuration structures for the fusion engine.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::error::{ConfigError, Result};

/// Main configuration for the fieldfuse engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FuseConfig {
    /// Label matching configuration.
    pub matching: MatchingConfig,

    /// Shared geometry tolerances and sizes.
    pub geometry: GeometryConfig,

    /// Box resolver configuration.
    pub resolver: ResolverConfig,

    /// Unlabeled-field placement configuration.
    pub placer: PlacerConfig,

    /// Document-level parallelism.
    pub parallel: ParallelConfig,
}

/// Label matching configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Maximum edit distance relative to the label length for a fuzzy match (0.0 - 1.0).
    pub fuzzy_threshold: f64,

    /// Labels shorter than this (in characters) never fuzzy-match.
    pub min_fuzzy_label_chars: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.25,
            min_fuzzy_label_chars: 3,
        }
    }
}

/// Geometry tolerances and default sizes, in PDF points.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Padding added above and below a line band.
    pub vertical_padding: f64,

    /// Gap kept between a label and its input box.
    pub label_gap: f64,

    /// Narrower input areas are treated as missing.
    pub min_input_width: f64,

    /// Width of a synthesized input box.
    pub default_input_width: f64,

    /// Maximum vertical-center distance for two boxes to share a row.
    pub row_tolerance: f64,

    /// Synthesized boxes stay this far from the page edge.
    pub page_margin: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            vertical_padding: 2.0,
            label_gap: 2.0,
            min_input_width: 24.0,
            default_input_width: 150.0,
            row_tolerance: 8.0,
            page_margin: 18.0,
        }
    }
}

/// Box resolver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Digit boxes when no count is given (Israeli ID style).
    pub default_digit_count: u32,

    /// Digit boxes for date fields (DDMMYYYY).
    pub date_digit_count: u32,

    /// Width of one synthesized digit box.
    pub digit_box_width: f64,

    /// Width-to-height ratio of a synthesized titled box.
    pub box_aspect_ratio: f64,

    /// How far below a title an enclosing box may start.
    pub box_search_distance: f64,

    /// Maximum distance between a label and its selection mark.
    pub max_mark_distance: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            default_digit_count: 9,
            date_digit_count: 8,
            digit_box_width: 14.0,
            box_aspect_ratio: 4.0,
            box_search_distance: 72.0,
            max_mark_distance: 150.0,
        }
    }
}

/// Unlabeled-field placement configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacerConfig {
    /// Width of a placed box.
    pub default_width: f64,

    /// Height of a placed box.
    pub default_height: f64,

    /// Distance between the anchor and the placed box.
    pub offset: f64,
}

impl Default for PlacerConfig {
    fn default() -> Self {
        Self {
            default_width: 120.0,
            default_height: 18.0,
            offset: 4.0,
        }
    }
}

/// Document-level parallelism.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    /// Process the pages of a document in parallel.
    pub enabled: bool,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Every settable key, in `section.field` form.
pub const CONFIG_KEYS: &[&str] = &[
    "matching.fuzzy_threshold",
    "matching.min_fuzzy_label_chars",
    "geometry.vertical_padding",
    "geometry.label_gap",
    "geometry.min_input_width",
    "geometry.default_input_width",
    "geometry.row_tolerance",
    "geometry.page_margin",
    "resolver.default_digit_count",
    "resolver.date_digit_count",
    "resolver.digit_box_width",
    "resolver.box_aspect_ratio",
    "resolver.box_search_distance",
    "resolver.max_mark_distance",
    "placer.default_width",
    "placer.default_height",
    "placer.offset",
    "parallel.enabled",
];

fn parse<T: FromStr>(key: &str, value: &str, expected: &str) -> std::result::Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(key, format!("expected {}, got '{}'", expected, value)))
}

impl FuseConfig {
    /// Current value of a key, `None` for unknown keys.
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            "matching.fuzzy_threshold" => self.matching.fuzzy_threshold.to_string(),
            "matching.min_fuzzy_label_chars" => self.matching.min_fuzzy_label_chars.to_string(),
            "geometry.vertical_padding" => self.geometry.vertical_padding.to_string(),
            "geometry.label_gap" => self.geometry.label_gap.to_string(),
            "geometry.min_input_width" => self.geometry.min_input_width.to_string(),
            "geometry.default_input_width" => self.geometry.default_input_width.to_string(),
            "geometry.row_tolerance" => self.geometry.row_tolerance.to_string(),
            "geometry.page_margin" => self.geometry.page_margin.to_string(),
            "resolver.default_digit_count" => self.resolver.default_digit_count.to_string(),
            "resolver.date_digit_count" => self.resolver.date_digit_count.to_string(),
            "resolver.digit_box_width" => self.resolver.digit_box_width.to_string(),
            "resolver.box_aspect_ratio" => self.resolver.box_aspect_ratio.to_string(),
            "resolver.box_search_distance" => self.resolver.box_search_distance.to_string(),
            "resolver.max_mark_distance" => self.resolver.max_mark_distance.to_string(),
            "placer.default_width" => self.placer.default_width.to_string(),
            "placer.default_height" => self.placer.default_height.to_string(),
            "placer.offset" => self.placer.offset.to_string(),
            "parallel.enabled" => self.parallel.enabled.to_string(),
            _ => return None,
        };
        Some(value)
    }

    /// Set a key from its text form.
    ///
    /// The change is applied only if the whole configuration still validates.
    pub fn set(&mut self, key: &str, value: &str) -> std::result::Result<(), ConfigError> {
        const NUMBER: &str = "a number";
        const COUNT: &str = "a whole number";

        let mut next = self.clone();
        match key {
            "matching.fuzzy_threshold" => next.matching.fuzzy_threshold = parse(key, value, NUMBER)?,
            "matching.min_fuzzy_label_chars" => next.matching.min_fuzzy_label_chars = parse(key, value, COUNT)?,
            "geometry.vertical_padding" => next.geometry.vertical_padding = parse(key, value, NUMBER)?,
            "geometry.label_gap" => next.geometry.label_gap = parse(key, value, NUMBER)?,
            "geometry.min_input_width" => next.geometry.min_input_width = parse(key, value, NUMBER)?,
            "geometry.default_input_width" => next.geometry.default_input_width = parse(key, value, NUMBER)?,
            "geometry.row_tolerance" => next.geometry.row_tolerance = parse(key, value, NUMBER)?,
            "geometry.page_margin" => next.geometry.page_margin = parse(key, value, NUMBER)?,
            "resolver.default_digit_count" => next.resolver.default_digit_count = parse(key, value, COUNT)?,
            "resolver.date_digit_count" => next.resolver.date_digit_count = parse(key, value, COUNT)?,
            "resolver.digit_box_width" => next.resolver.digit_box_width = parse(key, value, NUMBER)?,
            "resolver.box_aspect_ratio" => next.resolver.box_aspect_ratio = parse(key, value, NUMBER)?,
            "resolver.box_search_distance" => next.resolver.box_search_distance = parse(key, value, NUMBER)?,
            "resolver.max_mark_distance" => next.resolver.max_mark_distance = parse(key, value, NUMBER)?,
            "placer.default_width" => next.placer.default_width = parse(key, value, NUMBER)?,
            "placer.default_height" => next.placer.default_height = parse(key, value, NUMBER)?,
            "placer.offset" => next.placer.offset = parse(key, value, NUMBER)?,
            "parallel.enabled" => next.parallel.enabled = parse(key, value, "true or false")?,
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }

        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: FuseConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check that every value is within its allowed range.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let threshold = self.matching.fuzzy_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::invalid(
                "matching.fuzzy_threshold",
                format!("{} is outside 0.0 - 1.0", threshold),
            ));
        }

        let positive = [
            ("geometry.min_input_width", self.geometry.min_input_width),
            ("geometry.default_input_width", self.geometry.default_input_width),
            ("geometry.row_tolerance", self.geometry.row_tolerance),
            ("resolver.digit_box_width", self.resolver.digit_box_width),
            ("resolver.box_aspect_ratio", self.resolver.box_aspect_ratio),
            ("resolver.max_mark_distance", self.resolver.max_mark_distance),
            ("placer.default_width", self.placer.default_width),
            ("placer.default_height", self.placer.default_height),
        ];
        for (key, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::invalid(key, format!("{} must be positive", value)));
            }
        }

        let non_negative = [
            ("geometry.vertical_padding", self.geometry.vertical_padding),
            ("geometry.label_gap", self.geometry.label_gap),
            ("geometry.page_margin", self.geometry.page_margin),
            ("resolver.box_search_distance", self.resolver.box_search_distance),
            ("placer.offset", self.placer.offset),
        ];
        for (key, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::invalid(key, format!("{} must not be negative", value)));
            }
        }

        let counts = [
            ("resolver.default_digit_count", self.resolver.default_digit_count),
            ("resolver.date_digit_count", self.resolver.date_digit_count),
        ];
        for (key, value) in counts {
            if value == 0 {
                return Err(ConfigError::invalid(key, "digit counts must be at least 1"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = FuseConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.resolver.default_digit_count, 9);
        assert_eq!(config.matching.fuzzy_threshold, 0.25);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: FuseConfig =
            serde_json::from_str(r#"{"resolver": {"default_digit_count": 10}}"#).unwrap();
        assert_eq!(config.resolver.default_digit_count, 10);
        assert_eq!(config.resolver.date_digit_count, 8);
        assert_eq!(config.placer.default_width, 120.0);
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut config = FuseConfig::default();
        config.matching.fuzzy_threshold = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { ref key, .. }) if key == "matching.fuzzy_threshold"
        ));
    }

    #[test]
    fn test_validate_rejects_zero_digits() {
        let mut config = FuseConfig::default();
        config.resolver.date_digit_count = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { ref key, .. }) if key == "resolver.date_digit_count"
        ));
    }

    #[test]
    fn test_every_key_round_trips_through_get() {
        let mut config = FuseConfig::default();
        for key in CONFIG_KEYS {
            let value = config.get(key).unwrap();
            config.set(key, &value).unwrap();
            assert_eq!(config.get(key), Some(value), "{}", key);
        }
    }

    #[test]
    fn test_set_typed_values() {
        let mut config = FuseConfig::default();

        config.set("geometry.row_tolerance", "6.5").unwrap();
        config.set("resolver.default_digit_count", " 10 ").unwrap();
        config.set("parallel.enabled", "false").unwrap();

        assert_eq!(config.geometry.row_tolerance, 6.5);
        assert_eq!(config.resolver.default_digit_count, 10);
        assert!(!config.parallel.enabled);
        assert_eq!(config.get("geometry.row_tolerance").as_deref(), Some("6.5"));
    }

    #[test]
    fn test_set_rejects_bad_values_and_keeps_config() {
        let mut config = FuseConfig::default();

        let err = config.set("matching.fuzzy_threshold", "2").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "matching.fuzzy_threshold"));
        assert_eq!(config.matching.fuzzy_threshold, 0.25);

        let err = config.set("resolver.date_digit_count", "eight").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value for resolver.date_digit_count: expected a whole number, got 'eight'"
        );

        assert!(config.set("placer.default_width", "-3").is_err());
        assert_eq!(config.placer.default_width, 120.0);

        assert_eq!(
            config.set("matching.nope", "1"),
            Err(ConfigError::UnknownKey("matching.nope".to_string()))
        );
        assert_eq!(config.get("matching.nope"), None);
    }
}
