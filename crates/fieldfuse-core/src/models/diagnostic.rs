//! Per-page diagnostics handed to the editor next to the field list.

use serde::{Deserialize, Serialize};

/// What went wrong (or was worked around) for one element or field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A polygon was degenerate or non-finite.
    DegenerateGeometry,
    /// No OCR text matched a semantic label.
    UnmatchedField,
    /// `relatedFields` references did not land on the same row.
    PartitionMismatch,
    /// A field drifted out of its row group's band.
    RowGroupMismatch,
    /// The box resolver had no geometry for the field's style.
    ResolverFallback,
    /// An unlabeled hint had no anchor and was dropped.
    DroppedHint,
    /// A field could not be positioned at all.
    OmittedField,
}

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
}

/// A diagnostic record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub page_number: u32,
    pub kind: DiagnosticKind,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub message: String,
}

impl Diagnostic {
    /// Create a warning.
    pub fn warning(page_number: u32, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            page_number,
            kind,
            severity: Severity::Warning,
            label: None,
            message: message.into(),
        }
    }

    /// Create an informational diagnostic.
    pub fn info(page_number: u32, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            ..Self::warning(page_number, kind, message)
        }
    }

    /// Attach the label of the field the diagnostic is about.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}
