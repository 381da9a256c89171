use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use spider_client::shapes::request::{ReturnFormat, ReturnFormatHandling};
use spider_client::{RequestParams, Spider};

use super::{domain_of, Scrape};
use crate::errors::FetchError;
use crate::models::{Article, ContentType, FAILURE_SENTINEL};

static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").unwrap());
static BLANKS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^#\s+(.+)$").unwrap());

/// Scrapes through spider.cloud, which returns the page as markdown.
pub struct SpiderScraper {
    spider: Spider,
}

impl SpiderScraper {
    pub fn from_env() -> Result<Self, FetchError> {
        let api_key = std::env::var("SPIDER_API_KEY")
            .map_err(|_| FetchError::Spider("SPIDER_API_KEY environment variable must be set".into()))?;
        let spider = Spider::new(Some(api_key))
            .map_err(|e| FetchError::Spider(format!("Failed to create Spider client: {}", e)))?;
        Ok(Self { spider })
    }
}

#[async_trait]
impl Scrape for SpiderScraper {
    async fn scrape(&self, url: &str, allow_pdf: bool) -> Result<Option<Article>, FetchError> {
        if !allow_pdf && url.to_ascii_lowercase().ends_with(".pdf") {
            return Ok(None);
        }

        let params = RequestParams {
            return_format: Some(ReturnFormatHandling::Single(ReturnFormat::Markdown)),
            ..Default::default()
        };
        let response = self
            .spider
            .scrape_url(url, Some(params), "application/json")
            .await
            .map_err(|e| FetchError::Spider(e.to_string()))?;

        let parsed: serde_json::Value = match response.as_str() {
            Some(s) => serde_json::from_str(s).unwrap_or(response.clone()),
            None => response,
        };
        let first = parsed.as_array().and_then(|arr| arr.first());

        if let Some(err) = first
            .and_then(|obj| obj.get("status"))
            .and_then(|s| s.as_u64())
            .and_then(status_error)
        {
            return Err(err);
        }

        let markdown = first
            .and_then(|obj| obj.get("content"))
            .and_then(|c| c.as_str())
            .map(strip_images)
            .unwrap_or_default();

        Ok(Some(article_from_markdown(url, &markdown)))
    }
}

/// Error for a non-2xx page status. Values outside the `u16` range are kept verbatim.
fn status_error(status: u64) -> Option<FetchError> {
    if (200..300).contains(&status) {
        return None;
    }
    Some(match u16::try_from(status) {
        Ok(status) => FetchError::Status { status },
        Err(_) => FetchError::Other(format!("invalid status {}", status)),
    })
}

fn article_from_markdown(url: &str, markdown: &str) -> Article {
    let title = HEADING_RE
        .captures(markdown)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    let content = if markdown.trim().is_empty() {
        FAILURE_SENTINEL.to_string()
    } else {
        markdown.trim().to_string()
    };

    Article {
        title,
        url: url.to_string(),
        authors: Vec::new(),
        publish_date: String::new(),
        domain: domain_of(url),
        content,
        content_type: ContentType::Html,
        language: String::new(),
    }
}

/// Remove markdown image syntax: ![alt](url)
fn strip_images(md: &str) -> String {
    let cleaned = IMAGE_RE.replace_all(md, "");
    BLANKS_RE.replace_all(&cleaned, "\n\n").to_string()
}
