use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::debug;

use super::{domain_of, Scrape};
use crate::errors::FetchError;
use crate::models::{Article, ContentType, FAILURE_SENTINEL};

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static AUTHOR_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*(?:,|\band\b)\s*").unwrap());

static HTML_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("html").unwrap());
static TITLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static OG_TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[property="og:title"]"#).unwrap());
static AUTHOR_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[name="author"], meta[property="article:author"]"#).unwrap()
});
static DATE_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[property="article:published_time"], meta[name="date"], time[datetime]"#)
        .unwrap()
});
static ARTICLE_P_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("article p").unwrap());
static P_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());

pub struct HttpScraper {
    client: Client,
}

impl HttpScraper {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Scrape for HttpScraper {
    async fn scrape(&self, url: &str, allow_pdf: bool) -> Result<Option<Article>, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status: status.as_u16() });
        }

        let is_pdf = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("pdf"))
            .unwrap_or(false)
            || url.to_ascii_lowercase().ends_with(".pdf");

        if is_pdf {
            if !allow_pdf {
                debug!(%url, "Skipping PDF");
                return Ok(None);
            }
            // No PDF text extraction available; record the attempt as a failure.
            return Ok(Some(Article {
                title: String::new(),
                url: url.to_string(),
                authors: Vec::new(),
                publish_date: String::new(),
                domain: domain_of(url),
                content: FAILURE_SENTINEL.to_string(),
                content_type: ContentType::Pdf,
                language: String::new(),
            }));
        }

        let body = response.text().await?;
        Ok(Some(parse_html(url, &body)))
    }
}

/// Extract an [`Article`] from an HTML document.
pub fn parse_html(url: &str, html: &str) -> Article {
    let doc = Html::parse_document(html);

    let title = meta_content(&doc, &OG_TITLE_SEL)
        .into_iter()
        .next()
        .or_else(|| {
            doc.select(&TITLE_SEL)
                .next()
                .map(|t| collapse(&t.text().collect::<String>()))
        })
        .unwrap_or_default();

    let mut authors: Vec<String> = Vec::new();
    for raw in meta_content(&doc, &AUTHOR_SEL) {
        for name in AUTHOR_SPLIT_RE.split(&raw) {
            let name = name.trim();
            if !name.is_empty() && !authors.iter().any(|a| a == name) {
                authors.push(name.to_string());
            }
        }
    }

    let publish_date = doc
        .select(&DATE_SEL)
        .filter_map(|el| {
            el.value()
                .attr("content")
                .or_else(|| el.value().attr("datetime"))
        })
        .find_map(normalize_date)
        .unwrap_or_default();

    let language = doc
        .select(&HTML_SEL)
        .next()
        .and_then(|el| el.value().attr("lang"))
        .and_then(|lang| lang.split(['-', '_']).next())
        .map(|l| l.trim().to_ascii_lowercase())
        .unwrap_or_default();

    let mut paragraphs = paragraph_text(&doc, &ARTICLE_P_SEL);
    if paragraphs.is_empty() {
        paragraphs = paragraph_text(&doc, &P_SEL);
    }
    let content = if paragraphs.is_empty() {
        FAILURE_SENTINEL.to_string()
    } else {
        paragraphs.join("\n\n")
    };

    Article {
        title,
        url: url.to_string(),
        authors,
        publish_date,
        domain: domain_of(url),
        content,
        content_type: ContentType::Html,
        language,
    }
}

/// Normalize a timestamp or date string to `YYYY-MM-DD`.
pub fn normalize_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive().format("%Y-%m-%d").to_string());
    }
    let head = raw.get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .ok()
        .map(|d| d.format("%Y-%m-%d").to_string())
}

fn meta_content(doc: &Html, sel: &Selector) -> Vec<String> {
    doc.select(sel)
        .filter_map(|el| el.value().attr("content"))
        .map(collapse)
        .filter(|s| !s.is_empty())
        .collect()
}

fn paragraph_text(doc: &Html, sel: &Selector) -> Vec<String> {
    doc.select(sel)
        .map(|p| collapse(&p.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .collect()
}

fn collapse(s: &str) -> String {
    WS_RE.replace_all(s, " ").trim().to_string()
}
