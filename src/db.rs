use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use rusqlite::types::ValueRef;
use rusqlite::{ffi, Connection};
use tracing::debug;

use crate::errors::{ExportError, InvalidTableError, OpenError, PersistenceError};
use crate::models::{Article, ArticleRecord, LabelRecord, TrainingData};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS Articles (
        title        TEXT,
        url          TEXT NOT NULL UNIQUE,
        author       TEXT,
        publish_date TEXT,
        domain       TEXT,
        content      TEXT,
        content_type TEXT,
        language     TEXT
    );

    CREATE TABLE IF NOT EXISTS Labels (
        url      TEXT NOT NULL,
        category TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_labels_url ON Labels(url);
    CREATE UNIQUE INDEX IF NOT EXISTS idx_labels_url_category ON Labels(url, category);
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Articles,
    Labels,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Articles => "Articles",
            Table::Labels => "Labels",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Table {
    type Err = InvalidTableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "articles" => Ok(Table::Articles),
            "labels" => Ok(Table::Labels),
            _ => Err(InvalidTableError { name: s.to_string() }),
        }
    }
}

#[derive(Debug)]
pub enum InsertOutcome {
    Inserted,
    /// A row with the same url already exists.
    Duplicate,
    /// Content was the failure sentinel; nothing written.
    Skipped,
    Failed(PersistenceError),
}

#[derive(Debug)]
pub enum UpdateOutcome {
    Updated,
    NotFound,
    Failed(PersistenceError),
}

pub struct Stats {
    pub articles: usize,
    pub labels: usize,
    pub training_pairs: usize,
    pub without_language: usize,
}

/// Handle to the SQLite database holding the `Articles` and `Labels` tables.
///
/// Owns a single connection, so writes through one handle are serialized.
/// Every write commits on its own; a failed insert never rolls back earlier ones.
pub struct ArticleStore {
    conn: Connection,
}

impl ArticleStore {
    /// Open (or create) the database at `path`, creating missing parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, OpenError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| OpenError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(Self::with_connection(conn)?)
    }

    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, PersistenceError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Close the connection, surfacing any error instead of dropping it silently.
    pub fn close(self) -> Result<(), PersistenceError> {
        self.conn.close().map_err(|(_, e)| PersistenceError(e))
    }

    // ── Articles ──

    pub fn insert_article(&self, article: &Article) -> InsertOutcome {
        if article.is_retrieval_failure() {
            return InsertOutcome::Skipped;
        }

        let result = self.conn.execute(
            "INSERT INTO Articles (title, url, author, publish_date, domain, content, content_type, language)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                article.title,
                article.url,
                article.author_field(),
                article.publish_date,
                article.domain,
                article.content,
                article.content_type.as_str(),
                article.language,
            ],
        );

        match result {
            Ok(_) => InsertOutcome::Inserted,
            Err(e) if is_unique_violation(&e) => {
                debug!(url = %article.url, "URL already exists in Articles");
                InsertOutcome::Duplicate
            }
            Err(e) => InsertOutcome::Failed(PersistenceError(e)),
        }
    }

    /// Update the mutable fields of a stored article. Only `language` is mutable.
    pub fn update_article(&self, article: &Article) -> UpdateOutcome {
        let result = self.conn.execute(
            "UPDATE Articles SET language = ?1 WHERE url = ?2",
            rusqlite::params![article.language, article.url],
        );
        match result {
            Ok(0) => UpdateOutcome::NotFound,
            Ok(_) => UpdateOutcome::Updated,
            Err(e) => UpdateOutcome::Failed(PersistenceError(e)),
        }
    }

    pub fn get_article(&self, url: &str) -> Result<Option<ArticleRecord>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT title, url, author, publish_date, domain, content, content_type, language
             FROM Articles WHERE url = ?1",
        )?;
        let mut rows = stmt.query_map([url], |row| {
            let author: Option<String> = row.get(2)?;
            Ok(ArticleRecord {
                title: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                url: row.get(1)?,
                authors: author
                    .unwrap_or_default()
                    .split(',')
                    .filter(|a| !a.is_empty())
                    .map(str::to_string)
                    .collect(),
                publish_date: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                domain: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                content: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                content_type: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                language: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
            })
        })?;
        let first = rows.next().transpose()?;
        Ok(first)
    }

    pub fn article_urls(&self) -> Result<HashSet<String>, PersistenceError> {
        self.urls_in(Table::Articles)
    }

    // ── Labels ──

    pub fn label_urls(&self) -> Result<HashSet<String>, PersistenceError> {
        self.urls_in(Table::Labels)
    }

    /// Insert all labels in one transaction. Exact (url, category) repeats are ignored.
    pub fn insert_labels(&self, labels: &[LabelRecord]) -> Result<usize, PersistenceError> {
        let tx = self.conn.unchecked_transaction()?;
        let mut count = 0;
        {
            let mut stmt =
                tx.prepare("INSERT OR IGNORE INTO Labels (url, category) VALUES (?1, ?2)")?;
            for l in labels {
                count += stmt.execute(rusqlite::params![l.url, l.category])?;
            }
        }
        tx.commit()?;
        Ok(count)
    }

    pub fn labels(&self) -> Result<Vec<LabelRecord>, PersistenceError> {
        let mut stmt = self
            .conn
            .prepare("SELECT url, category FROM Labels ORDER BY rowid")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(LabelRecord {
                    url: row.get(0)?,
                    category: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Reads ──

    pub fn count(&self, table: Table) -> Result<usize, PersistenceError> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.name());
        Ok(self.conn.query_row(&sql, [], |r| r.get(0))?)
    }

    /// Write every row of `table_name` to a CSV file with a header row.
    /// Returns the number of data rows written.
    pub fn export_table(
        &self,
        table_name: &str,
        output: impl AsRef<Path>,
    ) -> Result<usize, ExportError> {
        let table: Table = table_name.parse()?;
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {} ORDER BY rowid", table.name()))?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut writer = csv::Writer::from_path(output.as_ref())?;
        writer.write_record(&columns)?;

        let mut rows = stmt.query([])?;
        let mut written = 0;
        while let Some(row) = rows.next()? {
            let record = (0..columns.len())
                .map(|i| row.get_ref(i).map(cell_text))
                .collect::<Result<Vec<_>, _>>()?;
            writer.write_record(&record)?;
            written += 1;
        }
        writer.flush()?;
        Ok(written)
    }

    /// Article contents paired with their categories via an inner join on url.
    pub fn get_training_data(&self) -> Result<TrainingData, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT a.content, l.category
             FROM Articles a
             INNER JOIN Labels l ON a.url = l.url
             ORDER BY a.rowid, l.rowid",
        )?;
        let mut data = TrainingData::default();
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                row.get::<_, String>(1)?,
            ))
        })?;
        for row in rows {
            let (text, label) = row?;
            data.texts.push(text);
            data.labels.push(label);
        }
        Ok(data)
    }

    pub fn stats(&self) -> Result<Stats, PersistenceError> {
        let training_pairs: usize = self.conn.query_row(
            "SELECT COUNT(*) FROM Articles a INNER JOIN Labels l ON a.url = l.url",
            [],
            |r| r.get(0),
        )?;
        let without_language: usize = self.conn.query_row(
            "SELECT COUNT(*) FROM Articles WHERE language IS NULL OR language = ''",
            [],
            |r| r.get(0),
        )?;
        Ok(Stats {
            articles: self.count(Table::Articles)?,
            labels: self.count(Table::Labels)?,
            training_pairs,
            without_language,
        })
    }

    #[cfg(test)]
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    fn urls_in(&self, table: Table) -> Result<HashSet<String>, PersistenceError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT url FROM {}", table.name()))?;
        let urls = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<HashSet<String>, _>>()?;
        Ok(urls)
    }
}

/// Only a UNIQUE clash on `url` counts as a duplicate; NOT NULL, CHECK or trigger aborts do not.
fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(err, _) if err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE)
}

fn cell_text(v: ValueRef<'_>) -> String {
    match v {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) | ValueRef::Blob(t) => String::from_utf8_lossy(t).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FAILURE_SENTINEL;
    use crate::testing::article;

    fn store() -> ArticleStore {
        ArticleStore::open_in_memory().unwrap()
    }

    fn label(url: &str, category: &str) -> LabelRecord {
        LabelRecord {
            url: url.into(),
            category: category.into(),
        }
    }

    #[test]
    fn insert_and_read_back() {
        let s = store();
        let mut a = article("http://a.com/x", "hello");
        a.authors = vec!["Ann".into(), "Bo".into()];
        assert!(matches!(s.insert_article(&a), InsertOutcome::Inserted));

        let rec = s.get_article("http://a.com/x").unwrap().unwrap();
        assert_eq!(rec.authors, vec!["Ann", "Bo"]);
        assert_eq!(rec.content, "hello");
        assert_eq!(rec.content_type, "html");
        assert!(s.get_article("http://missing.com").unwrap().is_none());
    }

    #[test]
    fn sentinel_never_creates_row() {
        let s = store();
        let before = s.count(Table::Articles).unwrap();
        let a = article("http://a.com", FAILURE_SENTINEL);
        assert!(matches!(s.insert_article(&a), InsertOutcome::Skipped));
        assert!(matches!(s.insert_article(&a), InsertOutcome::Skipped));
        assert_eq!(s.count(Table::Articles).unwrap(), before);
    }

    #[test]
    fn duplicate_url_is_not_fatal() {
        let s = store();
        let a = article("http://a.com", "one");
        assert!(matches!(s.insert_article(&a), InsertOutcome::Inserted));
        let b = article("http://a.com", "two");
        assert!(matches!(s.insert_article(&b), InsertOutcome::Duplicate));
        assert_eq!(s.count(Table::Articles).unwrap(), 1);
        assert_eq!(s.get_article("http://a.com").unwrap().unwrap().content, "one");
    }

    #[test]
    fn other_constraint_failures_are_not_duplicates() {
        let s = store();
        s.conn()
            .execute_batch(
                "CREATE TRIGGER reject_blocked BEFORE INSERT ON Articles
                 WHEN NEW.title = 'blocked'
                 BEGIN SELECT RAISE(ABORT, 'blocked title'); END;",
            )
            .unwrap();
        let mut a = article("http://a.com", "body");
        a.title = "blocked".into();
        assert!(matches!(s.insert_article(&a), InsertOutcome::Failed(_)));
        assert_eq!(s.count(Table::Articles).unwrap(), 0);
    }

    #[test]
    fn read_only_store_reports_failures() {
        let s = store();
        s.insert_article(&article("http://a.com", "body"));
        s.conn().execute_batch("PRAGMA query_only = 1;").unwrap();

        assert!(matches!(
            s.insert_article(&article("http://b.com", "body")),
            InsertOutcome::Failed(_)
        ));
        let mut changed = article("http://a.com", "body");
        changed.language = "de".into();
        assert!(matches!(s.update_article(&changed), UpdateOutcome::Failed(_)));
        assert_eq!(s.count(Table::Articles).unwrap(), 1);
    }

    #[test]
    fn update_touches_only_language() {
        let s = store();
        s.insert_article(&article("http://a.com", "body"));

        let mut changed = article("http://a.com", "other body");
        changed.language = "fr".into();
        changed.title = "New title".into();
        assert!(matches!(s.update_article(&changed), UpdateOutcome::Updated));

        let rec = s.get_article("http://a.com").unwrap().unwrap();
        assert_eq!(rec.language, "fr");
        assert_eq!(rec.content, "body");
        assert_eq!(rec.title, "Title of http://a.com");

        let missing = article("http://nope.com", "x");
        assert!(matches!(s.update_article(&missing), UpdateOutcome::NotFound));
    }

    #[test]
    fn labels_ignore_exact_repeats() {
        let s = store();
        let n = s
            .insert_labels(&[
                label("http://a.com", "X"),
                label("http://a.com", "X"),
                label("http://a.com", "Y"),
            ])
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(s.labels().unwrap().len(), 2);
        assert!(s.label_urls().unwrap().contains("http://a.com"));
    }

    #[test]
    fn training_data_inner_join() {
        let s = store();
        s.insert_article(&article("http://a.com", "hello"));
        s.insert_article(&article("http://unlabelled.com", "ignored"));
        s.insert_labels(&[label("http://a.com", "X"), label("http://orphan.com", "Y")])
            .unwrap();

        let data = s.get_training_data().unwrap();
        assert_eq!(data.texts, vec!["hello"]);
        assert_eq!(data.labels, vec!["X"]);

        let stats = s.stats().unwrap();
        assert_eq!(stats.articles, 2);
        assert_eq!(stats.labels, 2);
        assert_eq!(stats.training_pairs, 1);
        assert_eq!(stats.without_language, 0);
    }

    #[test]
    fn export_empty_articles_writes_header_only() {
        let s = store();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("articles.csv");
        assert_eq!(s.export_table("Articles", &out).unwrap(), 0);
        let text = std::fs::read_to_string(&out).unwrap();
        assert_eq!(
            text,
            "title,url,author,publish_date,domain,content,content_type,language\n"
        );
    }

    #[test]
    fn export_labels_rows() {
        let s = store();
        s.insert_labels(&[label("http://a.com", "X"), label("http://b.com", "Y")])
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("labels.csv");
        assert_eq!(s.export_table("labels", &out).unwrap(), 2);
        let text = std::fs::read_to_string(&out).unwrap();
        assert_eq!(text, "url,category\nhttp://a.com,X\nhttp://b.com,Y\n");
    }

    #[test]
    fn export_unknown_table_fails() {
        let s = store();
        let dir = tempfile::tempdir().unwrap();
        let err = s
            .export_table("Articles; DROP TABLE Labels", dir.path().join("x.csv"))
            .unwrap_err();
        assert!(matches!(err, ExportError::InvalidTable(_)));
        assert!(!dir.path().join("x.csv").exists());
    }

    #[test]
    fn reopen_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.sqlite");
        {
            let s = ArticleStore::open(&path).unwrap();
            s.insert_article(&article("http://a.com", "persisted"));
            s.close().unwrap();
        }
        let s = ArticleStore::open(&path).unwrap();
        assert_eq!(s.count(Table::Articles).unwrap(), 1);
    }

    #[test]
    fn open_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("store.sqlite");
        let s = ArticleStore::open(&path).unwrap();
        s.insert_article(&article("http://a.com", "body"));
        assert_eq!(s.count(Table::Articles).unwrap(), 1);
        assert!(path.exists());
    }

    #[test]
    fn open_reports_unusable_parent() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain-file");
        std::fs::write(&file, b"x").unwrap();
        let err = ArticleStore::open(file.join("store.sqlite")).err().unwrap();
        assert!(matches!(err, OpenError::CreateDir { .. }));
    }

    #[test]
    fn table_names() {
        assert_eq!("Articles".parse::<Table>().unwrap(), Table::Articles);
        assert_eq!(" LABELS ".parse::<Table>().unwrap(), Table::Labels);
        assert_eq!(
            "Users".parse::<Table>(),
            Err(InvalidTableError { name: "Users".into() })
        );
    }
}
