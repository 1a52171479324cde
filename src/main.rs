mod error;
mod parser;
mod pdf;
mod pipeline;
mod record;
mod report;
mod settings;
mod store;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::{error, info};

use pdf::{DocumentReader, PdfReader};
use pipeline::Pipeline;
use record::RunContext;
use settings::Settings;
use store::{CollectionStore, JsonFileStore};

type FilePipeline = Pipeline<PdfReader, JsonFileStore>;

#[derive(Parser)]
#[command(name = "eval_digest", about = "Teacher evaluation report extractor")]
struct Cli {
    /// Directory holding the results and snapshot files (overrides settings)
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract evaluation reports and append new pages to the results collection
    Process {
        /// PDF reports to process
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(short, long)]
        batch_code: String,
        #[arg(short, long)]
        semester: String,
        #[arg(long, default_value = "")]
        session: String,
    },
    /// Copy the current results collection to the snapshot file
    Snapshot,
    /// Print each page's text and the fields extracted from it
    Inspect { file: PathBuf },
    /// Show collection statistics
    Stats,
    /// Records overview table
    Overview {
        /// Filter by batch code
        #[arg(short, long)]
        batch: Option<String>,
        /// Filter by semester
        #[arg(short, long)]
        semester: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load()?;
    if let Some(dir) = cli.output_dir {
        settings.output_dir = dir;
    }

    let result = match cli.command {
        Commands::Process {
            files,
            batch_code,
            semester,
            session,
        } => {
            validate(&files, &batch_code, &semester)?;
            let ctx = RunContext {
                batch_code,
                semester,
                session,
            };
            let pipeline = Arc::new(build_pipeline(&settings));
            let failed = process_files(pipeline, files, ctx, settings.concurrency).await?;
            if failed > 0 {
                bail!("{} document(s) failed", failed);
            }
            Ok(())
        }
        Commands::Snapshot => match build_pipeline(&settings).export_snapshot() {
            Some(n) => {
                println!("Wrote {} bytes to {}", n, settings.snapshot_path().display());
                Ok(())
            }
            None => bail!("Snapshot export to {} failed", settings.snapshot_path().display()),
        },
        Commands::Inspect { file } => inspect(&file),
        Commands::Stats => {
            let records = load_records(&settings)?;
            let s = report::collection_stats(&records);
            println!("Records:   {}", s.records);
            println!("Documents: {}", s.documents);
            println!("Courses:   {}", s.courses);
            for (cat, n) in &s.coverage {
                println!("  {:<12} {}", cat.title(), n);
            }
            Ok(())
        }
        Commands::Overview {
            batch,
            semester,
            limit,
        } => {
            let records = load_records(&settings)?;
            let rows = report::overview(&records, batch.as_deref(), semester.as_deref(), limit);
            if rows.is_empty() {
                println!("No records found.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<20} | {:>4} | {:<28} | {:<20} | {:>5} | {:>5} | {:>6}",
                "#", "Document", "Page", "Course", "Teacher", "Stud", "Evals", "SA lrn"
            );
            println!("{}", "-".repeat(112));
            for (i, r) in rows.iter().enumerate() {
                println!(
                    "{:>3} | {:<20} | {:>4} | {:<28} | {:<20} | {:>5} | {:>5} | {:>6}",
                    i + 1,
                    truncate(&r.source_pdf, 20),
                    r.page,
                    truncate(&r.course, 28),
                    truncate(&r.teacher, 20),
                    opt(r.total_students),
                    opt(r.evaluation_count),
                    opt(r.sa_learning),
                );
            }
            println!("\n{} records", rows.len());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn build_pipeline(settings: &Settings) -> FilePipeline {
    Pipeline::new(
        PdfReader,
        JsonFileStore::new(settings.results_path()),
        JsonFileStore::new(settings.snapshot_path()),
    )
    .with_policy(settings.recovery_policy())
}

fn load_records(settings: &Settings) -> anyhow::Result<Vec<record::Record>> {
    let store = JsonFileStore::new(settings.results_path());
    let location = store.location();
    Ok(store.load().resolve(settings.recovery_policy(), &location)?)
}

fn validate(files: &[PathBuf], batch_code: &str, semester: &str) -> anyhow::Result<()> {
    if batch_code.trim().is_empty() || semester.trim().is_empty() {
        bail!("Batch code and semester required");
    }
    for f in files {
        let is_pdf = f
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("pdf"));
        if !is_pdf {
            bail!("Not a PDF: {}", f.display());
        }
    }
    Ok(())
}

/// One blocking worker per document, bounded by `concurrency`. Each finished
/// document is followed by a snapshot export. Returns the number of documents
/// that failed; a failed snapshot is logged and does not count.
async fn process_files(
    pipeline: Arc<FilePipeline>,
    files: Vec<PathBuf>,
    ctx: RunContext,
    concurrency: usize,
) -> anyhow::Result<usize> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut handles = Vec::with_capacity(files.len());
    for path in files {
        let pipeline = Arc::clone(&pipeline);
        let sem = Arc::clone(&semaphore);
        let ctx = ctx.clone();
        handles.push(tokio::spawn(async move {
            let _permit = sem.acquire_owned().await?;
            let worker_path = path.clone();
            let summary = tokio::task::spawn_blocking(move || {
                let summary = pipeline.process_document(&worker_path, &ctx)?;
                pipeline.export_snapshot();
                Ok::<_, error::PipelineError>(summary)
            })
            .await??;
            anyhow::Ok((path, summary))
        }));
    }

    let mut failed = 0usize;
    let mut added = 0usize;
    let mut total = 0usize;
    for handle in handles {
        match handle.await.context("worker panicked")? {
            Ok((path, summary)) => {
                added += summary.added;
                total = total.max(summary.total);
                pb.set_message(format!("{}", path.display()));
                info!(path = ?path, added = summary.added, skipped = summary.skipped, "Document done");
            }
            Err(e) => {
                failed += 1;
                error!("Pipeline error: {:#}", e);
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    println!("Added {} records ({} in collection, {} failed).", added, total, failed);
    Ok(failed)
}

fn inspect(file: &Path) -> anyhow::Result<()> {
    let pages = PdfReader.read_pages(file)?;
    for (i, text) in pages.iter().enumerate() {
        println!("\n=== PAGE {} {}", i + 1, "=".repeat(60));
        if text.trim().is_empty() {
            println!("⚠ NO TEXT FOUND");
            continue;
        }
        println!("{}", text);

        let parsed = parser::parse_page(text);
        println!("{}", "-".repeat(70));
        println!("{}", serde_json::to_string_pretty(&parsed.header)?);
        if parsed.averages.is_empty() {
            println!("  (no complete rating rows)");
        }
        for (key, value) in parsed.averages.iter() {
            println!("  {:<24} {}", key, value);
        }
    }
    Ok(())
}

fn opt<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_else(|| "-".into())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
