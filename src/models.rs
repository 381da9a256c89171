use serde::Serialize;

/// Content value a scraper returns when nothing usable could be retrieved.
/// Articles carrying it are never persisted.
pub const FAILURE_SENTINEL: &str = "retrieval_failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Html,
    Pdf,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Html => "html",
            ContentType::Pdf => "pdf",
        }
    }
}

/// A parsed article as handed back by a scrape backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Article {
    pub title: String,
    pub url: String,
    pub authors: Vec<String>,
    /// `YYYY-MM-DD` when known, empty otherwise.
    pub publish_date: String,
    pub domain: String,
    pub content: String,
    pub content_type: ContentType,
    /// ISO 639-1 code, empty if undetermined.
    pub language: String,
}

impl Article {
    pub fn is_retrieval_failure(&self) -> bool {
        self.content == FAILURE_SENTINEL
    }

    /// Authors as stored in the `author` column.
    pub fn author_field(&self) -> String {
        self.authors.join(",")
    }
}

/// A row of the `Articles` table.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleRecord {
    pub title: String,
    pub url: String,
    pub authors: Vec<String>,
    pub publish_date: String,
    pub domain: String,
    pub content: String,
    pub content_type: String,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRecord {
    pub url: String,
    pub category: String,
}

/// Inner join of articles and labels: `texts[i]` is labelled `labels[i]`.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct TrainingData {
    pub texts: Vec<String>,
    pub labels: Vec<String>,
}

impl TrainingData {
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}
