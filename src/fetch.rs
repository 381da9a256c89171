use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};

use crate::errors::FetchError;
use crate::models::Article;
use crate::scrape::Scrape;
use crate::settings::DEFAULT_CONCURRENCY;

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub allow_pdf: bool,
    pub max_concurrency: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            allow_pdf: true,
            max_concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

#[derive(Debug)]
pub enum FetchOutcome {
    Fetched(Article),
    /// The scraper returned nothing worth keeping.
    Empty,
    Failed(FetchError),
}

#[derive(Debug)]
pub struct FetchResult {
    pub url: String,
    pub outcome: FetchOutcome,
}

/// Spawn one scrape task per URL, at most `max_concurrency` running at once.
///
/// Results arrive on the returned channel in completion order. The channel
/// closes once every task has reported. Must be called inside a tokio runtime.
pub fn spawn_fetches(
    urls: Vec<String>,
    scraper: Arc<dyn Scrape>,
    opts: &FetchOptions,
) -> mpsc::Receiver<FetchResult> {
    let concurrency = opts.max_concurrency.max(1);
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let (tx, rx) = mpsc::channel::<FetchResult>(concurrency * 2);

    for url in urls {
        let scraper = Arc::clone(&scraper);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();
        let allow_pdf = opts.allow_pdf;

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            let outcome = run_one(scraper.as_ref(), &url, allow_pdf).await;
            let _ = tx.send(FetchResult { url, outcome }).await;
        });
    }

    // Drop our copy of tx so rx closes when all spawned tasks finish
    drop(tx);
    rx
}

async fn run_one(scraper: &dyn Scrape, url: &str, allow_pdf: bool) -> FetchOutcome {
    let result = AssertUnwindSafe(scraper.scrape(url, allow_pdf))
        .catch_unwind()
        .await;

    match result {
        Ok(Ok(Some(article))) if article.is_retrieval_failure() => {
            FetchOutcome::Failed(FetchError::RetrievalFailed)
        }
        Ok(Ok(Some(article))) => FetchOutcome::Fetched(article),
        Ok(Ok(None)) => FetchOutcome::Empty,
        Ok(Err(e)) => FetchOutcome::Failed(e),
        Err(_) => FetchOutcome::Failed(FetchError::Panicked),
    }
}

/// Scrape every URL and keep the usable articles, in completion order.
///
/// A URL that errors, panics, returns nothing or returns the failure
/// sentinel is logged and dropped; it never aborts the batch.
pub async fn fetch_all(
    urls: Vec<String>,
    scraper: Arc<dyn Scrape>,
    opts: &FetchOptions,
) -> Vec<Article> {
    let total = urls.len();
    let mut rx = spawn_fetches(urls, scraper, opts);
    let mut articles = Vec::with_capacity(total);

    while let Some(FetchResult { url, outcome }) = rx.recv().await {
        match outcome {
            FetchOutcome::Fetched(article) => articles.push(article),
            FetchOutcome::Empty => debug!(%url, "Scrape returned nothing"),
            FetchOutcome::Failed(e) => warn!(%url, error = %e, "Fetch failed"),
        }
    }

    info!(total, fetched = articles.len(), "Fetch batch complete");
    articles
}
