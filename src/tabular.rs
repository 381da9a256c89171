use std::path::Path;
use std::str::FromStr;

use csv::ReaderBuilder;
use tracing::warn;

use crate::errors::{ConfigurationError, TabularError};

pub type Row = Vec<String>;

/// Which column of a URL-list CSV holds the URLs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ColumnSpec {
    Index(usize),
    Name(String),
    /// Pick the first column whose first data cell contains "http".
    #[default]
    Detect,
}

/// Numeric input is always an index; anything else is a header name.
impl FromStr for ColumnSpec {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s.parse::<usize>() {
            Ok(i) => ColumnSpec::Index(i),
            Err(_) => ColumnSpec::Name(s.to_string()),
        })
    }
}

/// Read every record of a CSV file, header included, as rows of cells.
pub fn read_rows(path: impl AsRef<Path>) -> Result<Vec<Row>, TabularError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path.as_ref())?;
    let rows = reader
        .records()
        .map(|r| r.map(|rec| rec.iter().map(str::to_string).collect()))
        .collect::<Result<Vec<Row>, _>>()?;
    Ok(rows)
}

pub fn column_index(header: &[String], name: &str) -> Result<usize, ConfigurationError> {
    header
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| ConfigurationError::UnknownColumnName {
            name: name.to_string(),
        })
}

/// Pull the URL column out of `rows`, skipping the header row when present.
///
/// A bad column spec fails the call. A row too short to hold the column is
/// logged and dropped.
pub fn extract_url_column(
    rows: &[Row],
    column: &ColumnSpec,
    header_present: bool,
) -> Result<Vec<String>, ConfigurationError> {
    let first = rows.first().ok_or(ConfigurationError::EmptyDataset)?;
    let offset = usize::from(header_present);

    let index = match column {
        ColumnSpec::Index(i) => {
            if *i >= first.len() {
                return Err(ConfigurationError::ColumnIndexOutOfRange {
                    index: *i,
                    width: first.len(),
                });
            }
            *i
        }
        ColumnSpec::Name(name) => {
            if !header_present {
                return Err(ConfigurationError::ColumnNameWithoutHeader { name: name.clone() });
            }
            column_index(first, name)?
        }
        ColumnSpec::Detect => rows
            .get(offset)
            .and_then(|row| row.iter().position(|cell| cell.contains("http")))
            .ok_or(ConfigurationError::NoUrlColumn)?,
    };

    let urls = rows
        .iter()
        .enumerate()
        .skip(offset)
        .filter_map(|(n, row)| {
            let cell = row.get(index).cloned();
            if cell.is_none() {
                warn!(row = n, column = index, "Row has no URL column, skipping");
            }
            cell
        })
        .collect();
    Ok(urls)
}
