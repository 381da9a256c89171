//! Test doubles shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::FetchError;
use crate::models::{Article, ContentType, FAILURE_SENTINEL};
use crate::scrape::{domain_of, Scrape};

/// Behaviour is keyed off the URL: `fail` errors, `panic` panics, `empty`
/// returns nothing, `sentinel` returns a failed retrieval, `slow` and `hold`
/// sleep before answering. Anything else yields an article.
#[derive(Default)]
pub struct StubScraper {
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl StubScraper {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub fn article(url: &str, content: &str) -> Article {
    Article {
        title: format!("Title of {}", url),
        url: url.to_string(),
        authors: vec!["A. Writer".to_string()],
        publish_date: "2017-01-12".to_string(),
        domain: domain_of(url),
        content: content.to_string(),
        content_type: ContentType::Html,
        language: "en".to_string(),
    }
}

#[async_trait]
impl Scrape for StubScraper {
    async fn scrape(&self, url: &str, _allow_pdf: bool) -> Result<Option<Article>, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if url.contains("slow") {
            tokio::time::sleep(Duration::from_millis(200)).await;
        } else if url.contains("hold") {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if url.contains("panic") {
            panic!("stub scraper asked to panic");
        }
        if url.contains("fail") {
            return Err(FetchError::Other(format!("stub failure for {}", url)));
        }
        if url.contains("empty") {
            return Ok(None);
        }
        if url.contains("sentinel") {
            return Ok(Some(article(url, FAILURE_SENTINEL)));
        }
        Ok(Some(article(url, &format!("body of {}", url))))
    }
}
