//! Process command - extract fields from one evidence pair.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use fieldfuse_core::{
    DocumentExtraction, FormExtractor, FusionEngine, OcrDocument, SemanticDocument, Severity,
};

use super::output::{filter_confidence, format_document, OutputFormat};
use super::{load_config, read_json};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// OCR layout evidence (JSON)
    #[arg(required = true)]
    ocr: PathBuf,

    /// Semantic field analysis (JSON)
    #[arg(required = true)]
    semantic: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Drop fields below this confidence
    #[arg(long, default_value = "0.0")]
    min_confidence: f64,

    /// Print diagnostics to stderr
    #[arg(long)]
    show_diagnostics: bool,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = load_config(config_path)?;

    if !(0.0..=1.0).contains(&args.min_confidence) {
        anyhow::bail!("--min-confidence must be between 0.0 and 1.0");
    }

    info!(
        "Processing {} with {}",
        args.ocr.display(),
        args.semantic.display()
    );

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );

    pb.set_message("Loading evidence...");
    let ocr: OcrDocument = read_json(&args.ocr)?;
    let semantic: SemanticDocument = read_json(&args.semantic)?;
    debug!(
        "Loaded {} OCR pages, {} semantic pages",
        ocr.pages.len(),
        semantic.pages.len()
    );

    pb.set_message("Extracting fields...");
    let engine = FusionEngine::new(config);
    let mut document = engine.extract_document(&ocr, &semantic);
    pb.finish_and_clear();

    if document.pages.is_empty() && !document.errors.is_empty() {
        let reasons: Vec<String> = document.errors.iter().map(|e| e.message.clone()).collect();
        anyhow::bail!("No page could be processed:\n  {}", reasons.join("\n  "));
    }

    filter_confidence(&mut document, args.min_confidence);

    let output = format_document(&document, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        eprintln!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    report(&document, args.show_diagnostics);

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

fn report(document: &DocumentExtraction, show_diagnostics: bool) {
    for error in &document.errors {
        eprintln!(
            "{} Page {} skipped: {}",
            style("✗").red(),
            error.page_number,
            error.message
        );
    }

    if !show_diagnostics {
        return;
    }

    for diagnostic in document.diagnostics() {
        let marker = match diagnostic.severity {
            Severity::Warning => style("⚠").yellow(),
            Severity::Info => style("ℹ").blue(),
        };
        eprintln!(
            "{} page {}: {}",
            marker, diagnostic.page_number, diagnostic.message
        );
    }
}
