use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::categories::{Category, CategoryTable};
use crate::document::{
    preview_index, BuiltDocument, ContentDocument, DocumentBuilder, PreviewEntry, PREVIEW_DIR,
    STANDALONE_DIR,
};
use crate::error::Warning;
use crate::images::{ImageFetcher, ImageResolver};
use crate::records::{normalize_rows, Record};
use crate::settings::RunConfig;
use crate::sheets::Sheets;
use crate::sink::DocumentSink;

/// Outcome of one import run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub records: usize,
    pub written: Vec<String>,
    pub previews: Vec<PreviewEntry>,
    pub images_fetched: usize,
    pub cleaned: usize,
    pub warnings: Vec<Warning>,
}

impl RunSummary {
    pub fn failed_records(&self) -> usize {
        self.warnings
            .iter()
            .filter(|w| matches!(w, Warning::RecordFailed { .. }))
            .count()
    }

    pub fn print(&self) {
        println!(
            "Imported {} records: {} documents written, {} previews, {} images, {} old documents removed.",
            self.records,
            self.written.len(),
            self.previews.len(),
            self.images_fetched,
            self.cleaned,
        );
        let failed = self.failed_records();
        if failed > 0 {
            println!("{} records could not be imported.", failed);
        }
        if !self.warnings.is_empty() {
            println!("\n--- Warnings ({}) ---", self.warnings.len());
            for warning in &self.warnings {
                println!("  {}", warning);
            }
        }
    }
}

/// Drives one import: sheets → records → documents → sink.
pub struct Importer {
    fetcher: Arc<dyn ImageFetcher>,
    sink: Arc<dyn DocumentSink>,
    categories: CategoryTable,
    config: RunConfig,
    show_progress: bool,
}

struct Job<'a> {
    sheet: &'a str,
    category: &'a Category,
    record: Record,
}

impl Importer {
    pub fn new(
        fetcher: Arc<dyn ImageFetcher>,
        sink: Arc<dyn DocumentSink>,
        categories: CategoryTable,
        config: RunConfig,
    ) -> Self {
        Self {
            fetcher,
            sink,
            categories,
            config,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub async fn run(&self, sheets: &Sheets) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        if self.config.do_cleanup {
            info!("cleaning up...");
            summary.cleaned = self
                .sink
                .cleanup(&self.output_dirs())
                .await
                .context("Cleanup failed")?;
        }

        let jobs = self.collect_jobs(sheets, &mut summary.warnings);
        summary.records = jobs.len();

        // The resolver lives for exactly this run.
        let resolver = ImageResolver::new(Arc::clone(&self.fetcher));
        let builder = DocumentBuilder::new(&resolver, &self.config);
        let gate = self.config.max_concurrency.map(|n| Semaphore::new(n.max(1)));
        let pb = self.progress_bar(jobs.len());

        let results = join_all(jobs.into_iter().map(|job| {
            let builder = &builder;
            let gate = gate.as_ref();
            let pb = &pb;
            async move {
                let _permit = match gate {
                    Some(sem) => sem.acquire().await.ok(),
                    None => None,
                };
                let name = job.record.display_name();
                let result = builder.build(job.sheet, job.record, job.category).await;
                pb.inc(1);
                (name, result)
            }
        }))
        .await;
        pb.finish_and_clear();
        summary.images_fetched = resolver.fetch_count();

        let mut documents = Vec::with_capacity(results.len());
        for (name, result) in results {
            match result {
                Ok(BuiltDocument {
                    document,
                    preview,
                    warnings,
                }) => {
                    summary.warnings.extend(warnings);
                    if let Some(entry) = preview {
                        if !summary.previews.iter().any(|p| p.url == entry.url) {
                            summary.previews.push(entry);
                        }
                    }
                    documents.push(document);
                }
                Err(e) => {
                    warn!("Skipping {}: {}", name, e);
                    summary.warnings.push(Warning::RecordFailed {
                        record: name,
                        message: e.to_string(),
                    });
                }
            }
        }

        self.write_all(documents, &mut summary).await;

        let index = preview_index(&summary.previews, &self.config.preview_secret);
        let text = index.render().context("Failed to render preview index")?;
        self.sink
            .write(&index.relative_path(), text)
            .await
            .context("Failed to write preview index")?;
        info!("preview index lists {} documents", summary.previews.len());

        Ok(summary)
    }

    fn collect_jobs<'a>(&'a self, sheets: &'a Sheets, warnings: &mut Vec<Warning>) -> Vec<Job<'a>> {
        let mut jobs = Vec::new();
        for (sheet, rows) in sheets {
            // published spreadsheets export unnamed sheets
            if sheet.trim().is_empty() {
                continue;
            }
            let Some(category) = self.categories.get(sheet) else {
                warn!("Missing metadata for {}", sheet);
                warnings.push(Warning::UnknownSheet(sheet.clone()));
                continue;
            };
            let records = normalize_rows(rows);
            info!("processing sheet {} ({} records)", sheet, records.len());
            jobs.extend(records.into_iter().map(|record| Job {
                sheet,
                category,
                record,
            }));
        }
        jobs
    }

    /// Writes every document, waiting for all of them to land. Only the first
    /// document claiming a path is written.
    async fn write_all(&self, documents: Vec<ContentDocument>, summary: &mut RunSummary) {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(documents.len());
        for doc in documents {
            let path = doc.relative_path();
            if seen.insert(path.clone()) {
                unique.push(doc);
            } else {
                warn!("Duplicate output path {}", self.mask(&path));
                summary.warnings.push(Warning::DuplicatePath {
                    path: self.mask(&path),
                });
            }
        }

        let writes = unique.iter().map(|doc| async move {
            let path = doc.relative_path();
            let text = match doc.render() {
                Ok(text) => text,
                Err(e) => return (path, Err(e.to_string())),
            };
            info!(" --> write markdown {} ({:?})", self.mask(&path), doc.destination);
            let result = self.sink.write(&path, text).await.map_err(|e| e.to_string());
            (path, result)
        });

        for (path, result) in join_all(writes).await {
            match result {
                Ok(()) => summary.written.push(path),
                Err(message) => {
                    warn!("Failed to write {}: {}", self.mask(&path), message);
                    summary.warnings.push(Warning::WriteFailed {
                        path: self.mask(&path),
                        message,
                    });
                }
            }
        }
    }

    fn output_dirs(&self) -> Vec<String> {
        let mut dirs: Vec<String> = self
            .categories
            .values()
            .map(|c| c.destination_path.clone())
            .collect();
        dirs.push(STANDALONE_DIR.to_string());
        dirs.push(PREVIEW_DIR.to_string());
        dirs.sort();
        dirs.dedup();
        dirs
    }

    /// Keeps the preview secret out of logs.
    fn mask(&self, path: &str) -> String {
        if self.config.preview_secret.is_empty() {
            path.to_string()
        } else {
            path.replace(&self.config.preview_secret, "...")
        }
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} records")
        {
            pb.set_style(style.progress_chars("=> "));
        }
        pb
    }
}

// ── Tests ──
