use std::sync::{Arc, Mutex};

use article_ingest::scrape::domain_of;
use article_ingest::{
    Article, ArticleStore, ColumnSpec, ContentType, FetchError, IngestOptions, Scrape, Table,
};
use async_trait::async_trait;

/// Answers from a fixed page set; `broken-link` URLs fail.
#[derive(Default)]
struct FixtureScraper {
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl Scrape for FixtureScraper {
    async fn scrape(&self, url: &str, _allow_pdf: bool) -> Result<Option<Article>, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        if url.contains("broken-link") {
            return Err(FetchError::Status { status: 404 });
        }
        Ok(Some(Article {
            title: url.rsplit('/').next().unwrap_or_default().replace('-', " "),
            url: url.to_string(),
            authors: vec!["Staff".to_string()],
            publish_date: "2017-01-12".to_string(),
            domain: domain_of(url),
            content: format!("Full text of {}", url),
            content_type: ContentType::Html,
            language: String::new(),
        }))
    }
}

#[tokio::test]
async fn urls_then_labels_then_training_data() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArticleStore::open(dir.path().join("articles.sqlite")).unwrap();
    let scraper = Arc::new(FixtureScraper::default());
    let opts = IngestOptions {
        column: ColumnSpec::Detect,
        ..Default::default()
    };

    let report = store
        .ingest_urls(scraper.clone(), "tests/fixtures/urls.csv", &opts)
        .await
        .unwrap();
    assert_eq!(report.requested, 4);
    assert_eq!(report.stored, 3);
    assert_eq!(report.fetch_failures, 1);
    assert_eq!(store.count(Table::Articles).unwrap(), 3);

    let rec = store
        .get_article("http://example.org/news/storm-damage")
        .unwrap()
        .unwrap();
    assert_eq!(rec.title, "storm damage");
    assert_eq!(rec.domain, "example.org");

    // The failed URL is retried on the next run; stored ones are not.
    scraper.calls.lock().unwrap().clear();
    let rerun = store
        .ingest_urls(scraper.clone(), "tests/fixtures/urls.csv", &opts)
        .await
        .unwrap();
    assert_eq!(rerun.skipped_existing, 3);
    assert_eq!(
        *scraper.calls.lock().unwrap(),
        vec!["http://news.example.com/broken-link".to_string()]
    );
    assert_eq!(store.count(Table::Articles).unwrap(), 3);

    let labels = store
        .ingest_labels("tests/fixtures/labels.csv", "URL", "Tag")
        .unwrap();
    assert_eq!(labels.inserted, 3);

    let data = store.get_training_data().unwrap();
    assert_eq!(data.len(), 3);
    assert_eq!(data.texts.len(), data.labels.len());
    assert!(data
        .texts
        .contains(&"Full text of http://example.org/news/flood-displaces-thousands".to_string()));
    let mut categories = data.labels.clone();
    categories.sort();
    assert_eq!(categories, vec!["conflict", "disaster", "disaster"]);

    let out = dir.path().join("labels.csv");
    assert_eq!(store.export_table("Labels", &out).unwrap(), 3);
    let exported = std::fs::read_to_string(&out).unwrap();
    assert!(exported.starts_with("url,category\n"));
    assert_eq!(exported.lines().count(), 4);
}

#[tokio::test]
async fn set_language_enrichment() {
    let store = ArticleStore::open_in_memory().unwrap();
    let scraper = Arc::new(FixtureScraper::default());
    store
        .ingest_urls(
            scraper,
            "tests/fixtures/urls.csv",
            &IngestOptions {
                column: ColumnSpec::Name("URL".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(store.stats().unwrap().without_language, 3);

    let update = Article {
        url: "http://example.org/news/storm-damage".into(),
        language: "en".into(),
        ..Default::default()
    };
    assert!(matches!(
        store.update_article(&update),
        article_ingest::UpdateOutcome::Updated
    ));
    assert_eq!(store.stats().unwrap().without_language, 2);
}
