use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use article_ingest::fetch::FetchOptions;
use article_ingest::scrape::http::HttpScraper;
use article_ingest::scrape::spider::SpiderScraper;
use article_ingest::settings::Backend;
use article_ingest::{
    Article, ArticleStore, ColumnSpec, IngestOptions, Scrape, Settings, UpdateOutcome,
};

#[derive(Parser)]
#[command(name = "article_ingest", about = "Scrape article URLs from CSV files into SQLite")]
struct Cli {
    /// SQLite database path (overrides settings)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and its tables
    Init,
    /// Scrape every new URL in a CSV file and store the articles
    IngestUrls {
        #[arg(long)]
        csv: PathBuf,
        /// Column index or header name; numeric values are always read as an index
        /// (default: detect the column containing "http")
        #[arg(short, long)]
        column: Option<ColumnSpec>,
        /// The CSV has no header row
        #[arg(long)]
        no_header: bool,
        /// Skip PDF documents
        #[arg(long)]
        no_pdf: bool,
        /// Max concurrent fetches
        #[arg(short = 'n', long)]
        concurrency: Option<usize>,
    },
    /// Load (url, category) labels from a CSV file
    IngestLabels {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, default_value = "URL")]
        url_column: String,
        #[arg(long, default_value = "Tag")]
        label_column: String,
    },
    /// Export a table (Articles or Labels) to CSV
    Export {
        #[arg(short, long)]
        table: String,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Set the language of a stored article
    SetLanguage {
        #[arg(long)]
        url: String,
        #[arg(long)]
        language: String,
    },
    /// Write labelled article texts as JSON for classifier training
    TrainingData {
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Show row counts
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load().context("Failed to load settings")?;
    if let Some(db) = cli.db {
        settings.db_path = db;
    }
    info!(db = ?settings.db_path, backend = ?settings.backend, "Settings loaded");

    let store = open_store(&settings.db_path)?;

    let result = match cli.command {
        Commands::Init => {
            println!("Database ready at {:?}", settings.db_path);
            Ok(())
        }
        Commands::IngestUrls {
            csv,
            column,
            no_header,
            no_pdf,
            concurrency,
        } => {
            let scraper = build_scraper(&settings)?;
            let opts = IngestOptions {
                column: column.unwrap_or_default(),
                header_present: !no_header,
                fetch: FetchOptions {
                    allow_pdf: settings.allow_pdf && !no_pdf,
                    max_concurrency: concurrency.unwrap_or(settings.max_concurrency).max(1),
                },
                loudness: settings.loudness.clone(),
                progress: true,
            };
            let report = store
                .ingest_urls(scraper, &csv, &opts)
                .await
                .with_context(|| format!("Failed to ingest {:?}", csv))?;
            println!(
                "{} URLs: {} already stored, {} fetched -> {} stored, {} duplicates, {} empty, {} fetch errors, {} db errors.",
                report.requested,
                report.skipped_existing,
                report.fetched(),
                report.stored,
                report.duplicates,
                report.empty,
                report.fetch_failures,
                report.persistence_failures,
            );
            Ok(())
        }
        Commands::IngestLabels {
            csv,
            url_column,
            label_column,
        } => {
            let report = store
                .ingest_labels(&csv, &url_column, &label_column)
                .with_context(|| format!("Failed to ingest labels from {:?}", csv))?;
            println!(
                "Read {} rows: {} inserted, {} already labelled, {} malformed.",
                report.read, report.inserted, report.skipped_existing, report.malformed
            );
            Ok(())
        }
        Commands::Export { table, output } => {
            let n = store.export_table(&table, &output)?;
            println!("Exported {} rows from {} to {:?}", n, table, output);
            Ok(())
        }
        Commands::SetLanguage { url, language } => {
            let article = Article {
                url: url.clone(),
                language,
                ..Default::default()
            };
            match store.update_article(&article) {
                UpdateOutcome::Updated => println!("Updated {}", url),
                UpdateOutcome::NotFound => println!("No article stored for {}", url),
                UpdateOutcome::Failed(e) => tracing::error!(%url, error = %e, "Update failed"),
            }
            Ok(())
        }
        Commands::TrainingData { output } => {
            let data = store.get_training_data()?;
            let json = serde_json::to_string_pretty(&data)?;
            std::fs::write(&output, json)
                .with_context(|| format!("Failed to write {:?}", output))?;
            println!("Wrote {} labelled texts to {:?}", data.len(), output);
            Ok(())
        }
        Commands::Stats => {
            let s = store.stats()?;
            println!("Articles:       {}", s.articles);
            println!("Labels:         {}", s.labels);
            println!("Training pairs: {}", s.training_pairs);
            println!("No language:    {}", s.without_language);
            Ok(())
        }
    };

    store.close()?;

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn open_store(path: &Path) -> Result<ArticleStore> {
    ArticleStore::open(path).with_context(|| format!("Failed to open {:?}", path))
}

fn build_scraper(settings: &Settings) -> Result<Arc<dyn Scrape>> {
    let scraper: Arc<dyn Scrape> = match settings.backend {
        Backend::Http => Arc::new(HttpScraper::new(
            &settings.user_agent,
            Duration::from_secs(settings.request_timeout_secs),
        )?),
        Backend::Spider => Arc::new(SpiderScraper::from_env()?),
    };
    Ok(scraper)
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
