mod logger;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use pdf_assemble::{AssemblyOptions, EditOp, PageRasterizer, compile_collection, io};
use pdf_async_runtime::{AssemblySession, Notice};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::logger::CliLogger;

#[derive(Parser)]
#[command(name = "pdft", about = "Assemble, normalize and annotate PDFs", version)]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge files (PDF, images, Word, Excel) into one PDF
    Assemble {
        /// Input files, in upload order
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,

        /// Output PDF file
        #[arg(short, long)]
        output: PathBuf,

        /// JSON list of edits applied after upload, e.g.
        /// [{"op": "rotate_page", "page": 0}]
        #[arg(long)]
        plan: Option<PathBuf>,

        /// Assembly options (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Annotations (JSON) to burn into the merged output
        #[arg(long)]
        annotations: Option<PathBuf>,

        /// Thumbnail scale, overrides the config
        #[arg(long)]
        thumbnail_scale: Option<f32>,
    },

    /// Convert a single file to PDF
    Normalize {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write a PNG thumbnail per page
    Thumbnails {
        /// Input file (anything `normalize` accepts)
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, default_value = "0.4")]
        scale: f32,
    },

    /// Burn annotations into an existing PDF
    Annotate {
        #[arg(short, long)]
        input: PathBuf,

        /// Annotations (JSON array)
        #[arg(long)]
        annotations: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let logger = CliLogger::new(1000, level);
    logger.clone().init().context("Failed to install logger")?;

    match cli.command {
        Commands::Assemble {
            input,
            output,
            plan,
            config,
            annotations,
            thumbnail_scale,
        } => {
            let mut options = match config {
                Some(path) => AssemblyOptions::load(&path)
                    .await
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => AssemblyOptions::default(),
            };
            if let Some(scale) = thumbnail_scale {
                options.thumbnail_scale = scale;
            }
            options.validate()?;

            let mut session = AssemblySession::new(options, rasterizer());
            let report = session
                .upload_files(&input, |done, total| {
                    log::debug!("Processed {}/{} files", done, total)
                })
                .await;
            print_notices(&report.notices);

            if session.collection().is_empty() {
                bail!("None of the {} input files could be added", input.len());
            }

            if let Some(plan) = plan {
                let ops = load_plan(&plan).await?;
                for (i, op) in ops.iter().enumerate() {
                    session
                        .apply(op)
                        .with_context(|| format!("Plan step {} ({:?}) failed", i + 1, op))?;
                }
                println!("Applied {} edits from {}", ops.len(), plan.display());
            }

            let compiled = compile_collection(session.collection())?;
            for skipped in &compiled.skipped {
                println!("  skipped {}: {}", skipped.page_id, skipped.reason);
            }

            let bytes = match annotations {
                Some(path) => {
                    let annotations = io::load_annotations(&path)
                        .await
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    println!("Burning in {} annotations", annotations.len());
                    io::flatten_async(compiled.bytes, annotations).await?
                }
                None => compiled.bytes,
            };
            io::save_pdf(&bytes, &output).await?;

            println!("Assembly:");
            println!("  Documents: {}", compiled.report.document_count);
            println!("  Pages: {}", compiled.report.page_count);
            println!("  Input size: {} bytes", compiled.report.input_bytes);
            println!("  Output size: {} bytes", bytes.len());
            println!("Merged → {}", output.display());
        }

        Commands::Normalize { input, output } => {
            let options = pdf_normalize::NormalizeOptions::default();
            let normalized = pdf_normalize::normalize_file(&input, &options)
                .await
                .with_context(|| format!("Failed to convert {}", input.display()))?;
            let pages = pdf_normalize::page_count(&normalized.bytes)?;
            io::save_pdf(&normalized.bytes, &output).await?;
            println!(
                "Converted {:?} file to {} pages → {}",
                normalized.source_kind,
                pages,
                output.display()
            );
        }

        Commands::Thumbnails {
            input,
            output,
            scale,
        } => {
            let options = AssemblyOptions {
                thumbnail_scale: scale,
                ..Default::default()
            };
            options.validate()?;
            let mut session = AssemblySession::new(options, rasterizer());
            let report = session
                .upload_files(std::slice::from_ref(&input), |_, _| {})
                .await;
            print_notices(&report.notices);

            let Some(document) = session.collection().documents().first() else {
                bail!("{} could not be paged", input.display());
            };
            tokio::fs::create_dir_all(&output).await?;
            let mut written = 0;
            for id in document.pages() {
                let Some(page) = session.collection().page(*id) else {
                    continue;
                };
                let Some(thumbnail) = &page.thumbnail else {
                    continue;
                };
                let path = output.join(format!("page-{:03}.png", page.source_page));
                tokio::fs::write(&path, &thumbnail.png).await?;
                written += 1;
            }
            println!("Wrote {} thumbnails → {}", written, output.display());
        }

        Commands::Annotate {
            input,
            annotations,
            output,
        } => {
            let pdf = io::read_bytes(&input).await?;
            let annotations = io::load_annotations(&annotations)
                .await
                .with_context(|| format!("Failed to read {}", annotations.display()))?;
            let count = annotations.len();
            let flattened = io::flatten_async(pdf.to_vec(), annotations).await?;
            io::save_pdf(&flattened, &output).await?;
            println!("Burned {} annotations → {}", count, output.display());
        }
    }

    let warnings = logger.count_at_least(log::Level::Warn);
    if warnings > 0 {
        println!("Finished with {} warning(s)", warnings);
    }

    Ok(())
}

async fn load_plan(path: &Path) -> Result<Vec<EditOp>> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read plan {}", path.display()))?;
    let ops: Vec<EditOp> = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse plan {}", path.display()))?;
    Ok(ops)
}

fn print_notices(notices: &[Notice]) {
    if notices.is_empty() {
        return;
    }
    println!("{} file notice(s):", notices.len());
    for notice in notices {
        println!("  {}", notice);
    }
}

#[cfg(feature = "pdfium")]
fn rasterizer() -> Arc<dyn PageRasterizer> {
    Arc::new(pdf_assemble::thumbnail::PdfiumRasterizer)
}

#[cfg(not(feature = "pdfium"))]
fn rasterizer() -> Arc<dyn PageRasterizer> {
    Arc::new(pdf_assemble::PlaceholderRasterizer)
}
