//! Output formats for extraction results.

use std::fmt::Write as _;

use fieldfuse_core::{DocumentExtraction, ExtractedField, FieldSource, Severity};

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output, one row per field
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

/// Drop fields below `min_confidence` from every page.
pub fn filter_confidence(document: &mut DocumentExtraction, min_confidence: f64) {
    for page in &mut document.pages {
        page.fields.retain(|f| f.confidence >= min_confidence);
    }
}

pub fn format_document(document: &DocumentExtraction, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(document)?),
        OutputFormat::Csv => format_csv(document),
        OutputFormat::Text => Ok(format_text(document)),
    }
}

fn format_csv(document: &DocumentExtraction) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "page",
        "id",
        "name",
        "label",
        "type",
        "x",
        "y",
        "width",
        "height",
        "direction",
        "required",
        "confidence",
        "source",
        "section",
        "row_group",
    ])?;

    for field in document.fields() {
        wtr.write_record([
            field.page_number.to_string(),
            field.id.to_string(),
            field.name.clone(),
            field.label.clone(),
            field.kind.as_str().to_string(),
            format!("{:.2}", field.x),
            format!("{:.2}", field.y),
            format!("{:.2}", field.width),
            format!("{:.2}", field.height),
            if field.direction.is_rtl() { "rtl" } else { "ltr" }.to_string(),
            field.required.to_string(),
            format!("{:.2}", field.confidence),
            source_name(field).to_string(),
            field.section_name.clone().unwrap_or_default(),
            field.row_group.clone().unwrap_or_default(),
        ])?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(document: &DocumentExtraction) -> String {
    let mut output = String::new();

    for page in &document.pages {
        let _ = writeln!(output, "Page {}: {} fields", page.page_number, page.fields.len());
        for field in &page.fields {
            let _ = writeln!(
                output,
                "  #{:<3} {:<24} {:<9} ({:.1}, {:.1}) {:.1}x{:.1}  {:.2}  {}",
                field.id,
                field.name,
                field.kind.as_str(),
                field.x,
                field.y,
                field.width,
                field.height,
                field.confidence,
                field.label
            );
        }

        let warnings = page
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count();
        if warnings > 0 {
            let _ = writeln!(output, "  {} warnings", warnings);
        }
        output.push('\n');
    }

    for error in &document.errors {
        let _ = writeln!(output, "Page {} failed: {}", error.page_number, error.message);
    }

    output
}

fn source_name(field: &ExtractedField) -> &'static str {
    match field.source {
        FieldSource::Semantic => "semantic",
        FieldSource::Unlabeled => "unlabeled",
    }
}

/// Mean confidence over all fields, if any.
pub fn mean_confidence(document: &DocumentExtraction) -> Option<f64> {
    let (sum, count) = document
        .fields()
        .fold((0.0, 0usize), |(sum, count), f| (sum + f.confidence, count + 1));
    (count > 0).then(|| sum / count as f64)
}
