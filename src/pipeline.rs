//! CSV → dedup → fetch → store, and CSV → dedup → labels.
//!
//! Each URL moves `unseen -> in-flight -> {stored | failed | skipped}`.
//! Skips are decided before any network work; everything else is decided as
//! fetch results come back. Per-item failures are tallied in the returned
//! report and logged at the level chosen in [`LoudnessSettings`]; only bad
//! column specs, unreadable CSVs and store read failures abort a call.

use std::collections::HashSet;
use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info, warn};

use crate::db::{ArticleStore, InsertOutcome};
use crate::errors::{ConfigurationError, IngestError};
use crate::fetch::{spawn_fetches, FetchOptions, FetchOutcome, FetchResult};
use crate::models::LabelRecord;
use crate::scrape::Scrape;
use crate::settings::{Loudness, LoudnessSettings};
use crate::tabular::{column_index, extract_url_column, read_rows, ColumnSpec};

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub column: ColumnSpec,
    pub header_present: bool,
    pub fetch: FetchOptions,
    pub loudness: LoudnessSettings,
    pub progress: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            column: ColumnSpec::Name("URL".to_string()),
            header_present: true,
            fetch: FetchOptions::default(),
            loudness: LoudnessSettings::default(),
            progress: false,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Distinct non-empty URLs found in the CSV.
    pub requested: usize,
    pub skipped_existing: usize,
    pub stored: usize,
    pub duplicates: usize,
    pub empty: usize,
    pub fetch_failures: usize,
    pub persistence_failures: usize,
}

impl IngestReport {
    pub fn fetched(&self) -> usize {
        self.requested - self.skipped_existing
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LabelReport {
    pub read: usize,
    pub skipped_existing: usize,
    pub malformed: usize,
    pub inserted: usize,
}

impl ArticleStore {
    /// Scrape every URL in `csv_path` not already stored and insert the results.
    pub async fn ingest_urls(
        &self,
        scraper: Arc<dyn Scrape>,
        csv_path: impl AsRef<Path>,
        opts: &IngestOptions,
    ) -> Result<IngestReport, IngestError> {
        let rows = read_rows(csv_path)?;
        let urls = clean_urls(extract_url_column(&rows, &opts.column, opts.header_present)?);
        let existing = self.article_urls()?;

        let mut report = IngestReport {
            requested: urls.len(),
            ..Default::default()
        };
        let pending: Vec<String> = urls
            .into_iter()
            .filter(|url| {
                let seen = existing.contains(url);
                if seen {
                    emit(opts.loudness.skipped, url, "Already stored, not fetching", None);
                }
                !seen
            })
            .collect();
        report.skipped_existing = report.requested - pending.len();

        if pending.is_empty() {
            info!(requested = report.requested, "No new URLs to fetch");
            return Ok(report);
        }
        info!(
            pending = pending.len(),
            skipped = report.skipped_existing,
            concurrency = opts.fetch.max_concurrency,
            "Fetching articles"
        );

        let pb = progress_bar(pending.len(), opts.progress);
        let mut rx = spawn_fetches(pending, scraper, &opts.fetch);

        // Single writer: results are inserted here, one at a time, as they complete.
        while let Some(FetchResult { url, outcome }) = rx.recv().await {
            match outcome {
                FetchOutcome::Fetched(article) => {
                    debug!(%url, title = %article.title, "Fetched");
                    match self.insert_article(&article) {
                        InsertOutcome::Inserted => report.stored += 1,
                        InsertOutcome::Duplicate => {
                            report.duplicates += 1;
                            emit(
                                opts.loudness.duplicate,
                                &url,
                                "URL already exists in Articles, skipping",
                                None,
                            );
                        }
                        InsertOutcome::Skipped => report.empty += 1,
                        InsertOutcome::Failed(e) => {
                            report.persistence_failures += 1;
                            emit(opts.loudness.persistence_failure, &url, "Insert failed", Some(&e));
                        }
                    }
                }
                FetchOutcome::Empty => {
                    report.empty += 1;
                    emit(opts.loudness.empty, &url, "Scrape returned nothing", None);
                }
                FetchOutcome::Failed(e) => {
                    report.fetch_failures += 1;
                    emit(opts.loudness.fetch_failure, &url, "Fetch failed", Some(&e));
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        info!(
            stored = report.stored,
            duplicates = report.duplicates,
            empty = report.empty,
            fetch_failures = report.fetch_failures,
            persistence_failures = report.persistence_failures,
            "Ingestion complete"
        );
        Ok(report)
    }

    /// Load (url, category) pairs from a CSV with named columns. URLs that
    /// already have a label are left alone. Inserted in one transaction.
    pub fn ingest_labels(
        &self,
        csv_path: impl AsRef<Path>,
        url_column_name: &str,
        label_column_name: &str,
    ) -> Result<LabelReport, IngestError> {
        let rows = read_rows(csv_path)?;
        let header = rows.first().ok_or(ConfigurationError::EmptyDataset)?;
        let url_idx = column_index(header, url_column_name)?;
        let label_idx = column_index(header, label_column_name)?;
        let existing = self.label_urls()?;

        let mut report = LabelReport::default();
        let mut pending = Vec::new();
        for (n, row) in rows.iter().enumerate().skip(1) {
            report.read += 1;
            let (Some(url), Some(category)) = (row.get(url_idx), row.get(label_idx)) else {
                warn!(row = n, "Label row is missing columns, skipping");
                report.malformed += 1;
                continue;
            };
            let url = url.trim();
            if url.is_empty() {
                warn!(row = n, "Label row has no URL, skipping");
                report.malformed += 1;
                continue;
            }
            if existing.contains(url) {
                debug!(%url, "Already labelled, skipping");
                report.skipped_existing += 1;
                continue;
            }
            pending.push(LabelRecord {
                url: url.to_string(),
                category: category.trim().to_string(),
            });
        }

        report.inserted = self.insert_labels(&pending)?;
        info!(
            read = report.read,
            inserted = report.inserted,
            skipped = report.skipped_existing,
            "Labels ingested"
        );
        Ok(report)
    }
}

/// Trim, drop blanks and de-duplicate, keeping first occurrence order.
fn clean_urls(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty() && seen.insert(u.clone()))
        .collect()
}

fn progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) =
        ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}

/// Log one per-item event at the configured level. `detail` is only recorded when there is one.
fn emit(level: Loudness, url: &str, msg: &str, detail: Option<&dyn Display>) {
    match (level, detail) {
        (Loudness::Off, _) => {}
        (Loudness::Debug, Some(d)) => debug!(%url, detail = %d, "{}", msg),
        (Loudness::Debug, None) => debug!(%url, "{}", msg),
        (Loudness::Info, Some(d)) => info!(%url, detail = %d, "{}", msg),
        (Loudness::Info, None) => info!(%url, "{}", msg),
        (Loudness::Warn, Some(d)) => warn!(%url, detail = %d, "{}", msg),
        (Loudness::Warn, None) => warn!(%url, "{}", msg),
        (Loudness::Error, Some(d)) => error!(%url, detail = %d, "{}", msg),
        (Loudness::Error, None) => error!(%url, "{}", msg),
    }
}
