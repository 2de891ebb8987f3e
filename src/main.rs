mod categories;
mod content;
mod document;
mod error;
mod images;
mod importer;
mod records;
mod settings;
mod sheets;
mod sink;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use crate::images::HttpImageFetcher;
use crate::importer::Importer;
use crate::settings::{RunConfig, Settings};
use crate::sheets::{GoogleSheetsSource, JsonFileSource, SheetSource};
use crate::sink::FsSink;

#[derive(Parser)]
#[command(
    name = "sheet_import",
    about = "Import speaker, sponsor and article data from a spreadsheet into site content"
)]
struct Cli {
    /// Spreadsheet id or URL (defaults to the one saved in .importrc)
    spreadsheet: Option<String>,
    /// Production mode: don't publish unpublished items, route them to previews
    #[arg(short, long)]
    production: bool,
    /// Alternative directory to look for images
    #[arg(short, long)]
    image_path: Option<PathBuf>,
    /// Don't remove previously generated documents before importing
    #[arg(short = 'C', long)]
    no_cleanup: bool,
    /// Content directory documents are written to
    #[arg(long)]
    content_root: Option<PathBuf>,
    /// Read sheets from a local JSON export instead of the Sheets API
    #[arg(long)]
    sheets_file: Option<PathBuf>,
    /// Max records processed at once (default: unbounded)
    #[arg(long)]
    concurrency: Option<usize>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let cwd = std::env::current_dir().context("No working directory")?;
    let settings = Settings::load(&cwd)?;

    let source: Box<dyn SheetSource> = match &cli.sheets_file {
        Some(path) => Box::new(JsonFileSource::new(path)),
        None => {
            let Some(id) = cli
                .spreadsheet
                .as_deref()
                .map(sheets::spreadsheet_id)
                .or_else(|| settings.spreadsheet_id.clone())
            else {
                bail!("A spreadsheet id (or spreadsheet url) is required.");
            };
            let Some(api_key) = settings.api_key.clone() else {
                bail!("No Sheets API key configured (set IMPORT_API_KEY or api_key in .importrc).");
            };
            if settings::save_spreadsheet_id(&cwd, &id)? {
                println!("saving settings to {}", settings::RC_FILE);
            }
            Box::new(GoogleSheetsSource::new(id, api_key))
        }
    };

    let content_root = cli.content_root.clone().unwrap_or_else(|| settings.content_root());
    let run_config = RunConfig {
        image_path: cli.image_path.clone().or_else(|| settings.image_path.clone()),
        do_cleanup: !cli.no_cleanup,
        published_only: cli.production || settings.production(),
        preview_secret: settings.preview_secret(),
        max_concurrency: cli.concurrency.or(settings.max_concurrency),
    };
    info!(
        content_root = %content_root.display(),
        published_only = run_config.published_only,
        "Starting import"
    );

    println!("loading spreadsheet data...");
    let sheets = source.fetch().await?;

    let fetcher = HttpImageFetcher::new(
        content_root.join("images").join("cms"),
        run_config.image_path.clone(),
    );
    let importer = Importer::new(
        Arc::new(fetcher),
        Arc::new(FsSink::new(&content_root)),
        categories::default_table(),
        run_config,
    )
    .with_progress(true);

    let summary = importer.run(&sheets).await?;
    summary.print();

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
