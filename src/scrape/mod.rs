//! Scrape backends: turn a URL into a parsed [`Article`].
//!
//! The pipeline only depends on the [`Scrape`] trait. Two backends ship with
//! the crate:
//!
//! - [`http::HttpScraper`]: plain GET with reqwest, HTML parsed with `scraper`
//! - [`spider::SpiderScraper`]: delegated to spider.cloud, returns markdown
//!
//! A backend returns `Ok(None)` when it decided there was nothing worth
//! keeping, and `Err` on transient failures. Neither retries.

pub mod http;
pub mod spider;

use async_trait::async_trait;
use url::Url;

use crate::errors::FetchError;
use crate::models::Article;

#[async_trait]
pub trait Scrape: Send + Sync {
    async fn scrape(&self, url: &str, allow_pdf: bool) -> Result<Option<Article>, FetchError>;
}

/// Host part of `url` with a leading `www.` stripped, empty if unparseable.
pub fn domain_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_default()
}
