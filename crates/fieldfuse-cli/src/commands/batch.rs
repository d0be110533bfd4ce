//! Batch processing command for many evidence pairs.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use fieldfuse_core::{DocumentExtraction, FormExtractor, FusionEngine, OcrDocument, SemanticDocument};

use super::output::{filter_confidence, format_document, mean_confidence, OutputFormat};
use super::{load_config, read_json};

const OCR_SUFFIX: &str = ".ocr.json";
const SEMANTIC_SUFFIX: &str = ".semantic.json";

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern for OCR evidence files (*.ocr.json, paired with *.semantic.json)
    #[arg(required = true)]
    input: String,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Drop fields below this confidence
    #[arg(long, default_value = "0.0")]
    min_confidence: f64,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Number of parallel workers
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Result of processing one evidence pair.
struct ProcessResult {
    path: PathBuf,
    document: Option<DocumentExtraction>,
    error: Option<String>,
    processing_time_ms: u64,
}

/// Sibling semantic file of an OCR evidence file.
fn semantic_path(ocr_path: &Path) -> Option<PathBuf> {
    let name = ocr_path.file_name()?.to_str()?;
    let stem = name.strip_suffix(OCR_SUFFIX)?;
    Some(ocr_path.with_file_name(format!("{}{}", stem, SEMANTIC_SUFFIX)))
}

/// File name without the `.ocr.json` suffix.
fn document_stem(ocr_path: &Path) -> String {
    ocr_path
        .file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.strip_suffix(OCR_SUFFIX).unwrap_or(name).to_string())
        .unwrap_or_else(|| "document".to_string())
}

fn process_pair(engine: &FusionEngine, ocr_path: &Path) -> anyhow::Result<DocumentExtraction> {
    let semantic_path = semantic_path(ocr_path)
        .ok_or_else(|| anyhow::anyhow!("Not an OCR evidence file: {}", ocr_path.display()))?;

    let ocr: OcrDocument = read_json(ocr_path)?;
    let semantic: SemanticDocument = read_json(&semantic_path)?;

    let document = engine.extract_document(&ocr, &semantic);
    if document.pages.is_empty() && !document.errors.is_empty() {
        anyhow::bail!("No page could be processed: {}", document.errors[0].message);
    }

    Ok(document)
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = load_config(config_path)?;

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| semantic_path(p).is_some())
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let overall_pb = ProgressBar::new(files.len() as u64);
    overall_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let engine = Arc::new(FusionEngine::new(config));
    let permits = Arc::new(Semaphore::new(args.jobs.max(1)));

    let handles: Vec<_> = files
        .iter()
        .cloned()
        .map(|path| {
            let engine = Arc::clone(&engine);
            let permits = Arc::clone(&permits);
            tokio::spawn(async move {
                let _permit = permits.acquire_owned().await?;
                tokio::task::spawn_blocking(move || {
                    let file_start = Instant::now();
                    let result = process_pair(&engine, &path);
                    (result, file_start.elapsed().as_millis() as u64)
                })
                .await
                .map_err(anyhow::Error::from)
            })
        })
        .collect();

    let mut results = Vec::with_capacity(files.len());

    for (path, handle) in files.into_iter().zip(handles) {
        let (result, processing_time_ms) = handle.await??;

        match result {
            Ok(mut document) => {
                filter_confidence(&mut document, args.min_confidence);
                for failure in &document.errors {
                    warn!("{}: page {} skipped: {}", path.display(), failure.page_number, failure.message);
                }
                results.push(ProcessResult {
                    path,
                    document: Some(document),
                    error: None,
                    processing_time_ms,
                });
            }
            Err(e) => {
                let error_msg = e.to_string();
                if args.continue_on_error {
                    warn!("Failed to process {}: {}", path.display(), error_msg);
                    results.push(ProcessResult {
                        path,
                        document: None,
                        error: Some(error_msg),
                        processing_time_ms,
                    });
                } else {
                    error!("Failed to process {}: {}", path.display(), error_msg);
                    anyhow::bail!("Processing failed: {}", error_msg);
                }
            }
        }

        overall_pb.inc(1);
    }

    overall_pb.finish_with_message("Complete");

    let successful: Vec<_> = results.iter().filter(|r| r.document.is_some()).collect();
    let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();

    if let Some(output_dir) = &args.output_dir {
        for result in &successful {
            if let Some(document) = &result.document {
                let output_path = output_dir.join(format!(
                    "{}.fields.{}",
                    document_stem(&result.path),
                    args.format.extension()
                ));
                fs::write(&output_path, format_document(document, args.format)?)?;
                debug!("Wrote output to {}", output_path.display());
            }
        }
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(successful.len()).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for result in &failed {
            println!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

fn write_summary(path: &Path, results: &[ProcessResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "pages",
        "failed_pages",
        "fields",
        "diagnostics",
        "mean_confidence",
        "processing_time_ms",
        "error",
    ])?;

    for result in results {
        let filename = result.path.file_name().and_then(|s| s.to_str()).unwrap_or("");

        if let Some(document) = &result.document {
            wtr.write_record([
                filename,
                "success",
                &document.pages.len().to_string(),
                &document.errors.len().to_string(),
                &document.fields().count().to_string(),
                &document.diagnostics().count().to_string(),
                &mean_confidence(document)
                    .map(|c| format!("{:.2}", c))
                    .unwrap_or_default(),
                &result.processing_time_ms.to_string(),
                "",
            ])?;
        } else {
            wtr.write_record([
                filename,
                "error",
                "",
                "",
                "",
                "",
                "",
                &result.processing_time_ms.to_string(),
                result.error.as_deref().unwrap_or(""),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}
