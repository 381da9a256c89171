//! Ingest article URLs from CSV files, scrape them concurrently and keep the
//! parsed articles plus human-supplied labels in SQLite for export or
//! classifier training.

pub mod db;
pub mod errors;
pub mod fetch;
pub mod models;
pub mod pipeline;
pub mod scrape;
pub mod settings;
pub mod tabular;

#[cfg(test)]
mod testing;

pub use db::{ArticleStore, InsertOutcome, Table, UpdateOutcome};
pub use errors::{
    ConfigurationError, ExportError, FetchError, IngestError, InvalidTableError, OpenError,
};
pub use fetch::{fetch_all, FetchOptions, FetchOutcome};
pub use models::{Article, ArticleRecord, ContentType, LabelRecord, TrainingData, FAILURE_SENTINEL};
pub use pipeline::{IngestOptions, IngestReport, LabelReport};
pub use scrape::Scrape;
pub use settings::Settings;
pub use tabular::ColumnSpec;
