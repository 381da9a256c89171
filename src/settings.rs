use std::path::PathBuf;

use config::{Config, Environment, File};
use serde::Deserialize;

pub const DEFAULT_DB_PATH: &str = "data/articles.sqlite";
pub const DEFAULT_CONCURRENCY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Http,
    Spider,
}

/// How loudly a category of per-item outcome is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Loudness {
    Off,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoudnessSettings {
    pub skipped: Loudness,
    pub empty: Loudness,
    pub duplicate: Loudness,
    pub fetch_failure: Loudness,
    pub persistence_failure: Loudness,
}

impl Default for LoudnessSettings {
    fn default() -> Self {
        Self {
            skipped: Loudness::Debug,
            empty: Loudness::Info,
            duplicate: Loudness::Warn,
            fetch_failure: Loudness::Warn,
            persistence_failure: Loudness::Error,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub db_path: PathBuf,
    pub max_concurrency: usize,
    pub allow_pdf: bool,
    pub backend: Backend,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub loudness: LoudnessSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            max_concurrency: DEFAULT_CONCURRENCY,
            allow_pdf: true,
            backend: Backend::Http,
            user_agent: format!("article_ingest/{}", env!("CARGO_PKG_VERSION")),
            request_timeout_secs: 30,
            loudness: LoudnessSettings::default(),
        }
    }
}

impl Settings {
    /// Defaults, then `ingest.toml` if present, then `INGEST_*` env vars.
    pub fn load() -> Result<Self, config::ConfigError> {
        Config::builder()
            .add_source(File::with_name("ingest").required(false))
            .add_source(
                Environment::with_prefix("INGEST")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Settings>()
            .map(Settings::normalized)
    }

    fn normalized(mut self) -> Self {
        self.max_concurrency = self.max_concurrency.max(1);
        self
    }
}
