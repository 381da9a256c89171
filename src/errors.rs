use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Invalid or ambiguous column specification for a CSV extraction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("dataset has no rows")]
    EmptyDataset,
    #[error("column index {index} not in range of dataset (width {width})")]
    ColumnIndexOutOfRange { index: usize, width: usize },
    #[error("column name '{name}' given but no header present in dataset")]
    ColumnNameWithoutHeader { name: String },
    #[error("column name '{name}' not in dataset header")]
    UnknownColumnName { name: String },
    #[error("can't find any URLs: no cell containing 'http' in the first data row")]
    NoUrlColumn,
}

/// Failure while scraping or parsing a single URL.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}")]
    Status { status: u16 },
    #[error("retrieval failed")]
    RetrievalFailed,
    #[error("spider error: {0}")]
    Spider(String),
    #[error("scrape task panicked")]
    Panicked,
    #[error("{0}")]
    Other(String),
}

/// Storage-layer failure other than a uniqueness violation.
#[derive(Debug, Error)]
#[error("persistence error: {0}")]
pub struct PersistenceError(#[from] pub rusqlite::Error);

/// Failure opening an on-disk store.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("failed to create {path:?}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl From<rusqlite::Error> for OpenError {
    fn from(e: rusqlite::Error) -> Self {
        OpenError::Persistence(PersistenceError(e))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("not a valid table: '{name}'")]
pub struct InvalidTableError {
    pub name: String,
}

#[derive(Debug, Error)]
pub enum TabularError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Errors that abort a whole ingestion call. Per-item failures never end up here.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Tabular(#[from] TabularError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl From<rusqlite::Error> for IngestError {
    fn from(e: rusqlite::Error) -> Self {
        IngestError::Persistence(PersistenceError(e))
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    InvalidTable(#[from] InvalidTableError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl From<rusqlite::Error> for ExportError {
    fn from(e: rusqlite::Error) -> Self {
        ExportError::Persistence(PersistenceError(e))
    }
}
