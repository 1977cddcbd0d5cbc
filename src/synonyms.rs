//! Geo synonym reference table: many spellings of a country name, one geo id.
//!
//! The canonical copy lives in the open-numbers repository and is fetched over
//! HTTP on every run. A local snapshot can be used instead via [`FileSynonyms`].

use std::path::PathBuf;
use std::time::Duration;

use indexmap::IndexMap;
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tokio::time::sleep;

pub const DEFAULT_SYNONYMS_URL: &str =
    "https://raw.githubusercontent.com/open-numbers/ddf--open_numbers/master/ddf--synonyms--geo.csv";

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum SynonymError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("synonym server returned status {status} for {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("failed to parse synonym table: {0}")]
    ParseError(#[from] csv::Error),

    #[error("failed to read synonym snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// Table
// ============================================================================

#[derive(Deserialize)]
struct SynonymRow {
    synonym: String,
    geo: String,
}

/// Index of synonym string → geo id.
///
/// Keys are unique; when the source lists a synonym twice the later row wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynonymTable {
    entries: IndexMap<String, String>,
}

impl SynonymTable {
    /// Parse a `synonym,geo` CSV document.
    pub fn from_csv(bytes: &[u8]) -> Result<Self, SynonymError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(bytes);

        let mut entries = IndexMap::new();
        for row in rdr.deserialize() {
            let row: SynonymRow = row?;
            entries.insert(row.synonym, row.geo);
        }
        Ok(Self { entries })
    }

    pub fn get(&self, synonym: &str) -> Option<&str> {
        self.entries.get(synonym).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>, G: Into<String>> FromIterator<(S, G)> for SynonymTable {
    fn from_iter<I: IntoIterator<Item = (S, G)>>(iter: I) -> Self {
        let entries = iter
            .into_iter()
            .map(|(s, g)| (s.into(), g.into()))
            .collect();
        Self { entries }
    }
}

/// Anything that can hand the pipeline a synonym table.
pub trait SynonymSource {
    fn fetch_synonyms(
        &self,
    ) -> impl std::future::Future<Output = Result<SynonymTable, SynonymError>>;
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Clone, Debug)]
pub struct SynonymClientConfig {
    /// Where the `synonym,geo` CSV is served from.
    pub url: String,
    /// Per-request timeout. Requests that exceed it are retried.
    pub request_timeout: Duration,
    /// Total attempts before the fetch is reported as failed.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for SynonymClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SYNONYMS_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            max_retries: 5,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(10),
        }
    }
}

// ============================================================================
// HTTP source
// ============================================================================

pub struct SynonymClient {
    client: Client,
    config: SynonymClientConfig,
}

impl SynonymClient {
    pub fn new(config: SynonymClientConfig) -> Result<Self, SynonymError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// A single GET, no retries.
    pub async fn fetch_once(&self) -> Result<SynonymTable, SynonymError> {
        tracing::debug!("Fetching synonym table from {}", self.config.url);

        let response = self.client.get(&self.config.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SynonymError::Status {
                url: self.config.url.clone(),
                status,
            });
        }

        let bytes = response.bytes().await?;
        SynonymTable::from_csv(&bytes)
    }
}

impl SynonymSource for SynonymClient {
    async fn fetch_synonyms(&self) -> Result<SynonymTable, SynonymError> {
        let max_retries = self.config.max_retries.max(1);
        let mut current_attempt = 0;
        let mut current_backoff = self.config.initial_backoff;

        loop {
            match self.fetch_once().await {
                Ok(table) => return Ok(table),
                Err(e) => {
                    current_attempt += 1;
                    if current_attempt >= max_retries {
                        tracing::error!(
                            "Failed to fetch synonym table after {} attempts: {}",
                            current_attempt,
                            e
                        );
                        return Err(e);
                    }

                    let jitter: f64 = rand::rng().random_range(0.5..1.5);
                    let jittered = current_backoff.mul_f64(jitter);

                    tracing::debug!(
                        "Synonym fetch failed (attempt {}/{}), retrying in {}ms: {}",
                        current_attempt,
                        max_retries,
                        jittered.as_millis(),
                        e
                    );
                    sleep(jittered).await;
                    current_backoff = std::cmp::min(current_backoff * 2, self.config.max_backoff);
                }
            }
        }
    }
}

// ============================================================================
// Local snapshot
// ============================================================================

/// Reads a previously downloaded copy of the synonym CSV.
pub struct FileSynonyms {
    pub path: PathBuf,
}

impl SynonymSource for FileSynonyms {
    async fn fetch_synonyms(&self) -> Result<SynonymTable, SynonymError> {
        let bytes = std::fs::read(&self.path).map_err(|source| SynonymError::Io {
            path: self.path.clone(),
            source,
        })?;
        SynonymTable::from_csv(&bytes)
    }
}

impl SynonymSource for SynonymTable {
    async fn fetch_synonyms(&self) -> Result<SynonymTable, SynonymError> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_last_write_wins() {
        let csv = b"synonym,geo\nAfghanistan,afg\nIran,irn\nAfghanistan,afg_dup\n";
        let table = SynonymTable::from_csv(csv).expect("parse failed");
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("Afghanistan"), Some("afg_dup"));
        assert_eq!(table.get("Iran"), Some("irn"));
        assert_eq!(table.get("Narnia"), None);
    }

    #[test]
    fn test_parse_quoted_synonyms() {
        let csv = b"synonym,geo\n\"Korea, Republic of\",kor\n";
        let table = SynonymTable::from_csv(csv).expect("parse failed");
        assert_eq!(table.get("Korea, Republic of"), Some("kor"));
    }

    #[test]
    fn test_parse_rejects_missing_geo_column() {
        let csv = b"synonym,name\nAfghanistan,Afghanistan\n";
        assert!(matches!(
            SynonymTable::from_csv(csv),
            Err(SynonymError::ParseError(_))
        ));
    }

    #[tokio::test]
    async fn test_file_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("synonyms.csv");
        std::fs::write(&path, "synonym,geo\nChad,tcd\n").unwrap();

        let table = FileSynonyms { path }.fetch_synonyms().await.unwrap();
        assert_eq!(table.get("Chad"), Some("tcd"));
    }

    #[tokio::test]
    async fn test_file_snapshot_missing() {
        let source = FileSynonyms {
            path: PathBuf::from("/nonexistent/synonyms.csv"),
        };
        assert!(matches!(
            source.fetch_synonyms().await,
            Err(SynonymError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server_gives_up() {
        let config = SynonymClientConfig {
            url: "http://127.0.0.1:9/synonyms.csv".to_string(),
            request_timeout: Duration::from_millis(500),
            max_retries: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        };
        let client = SynonymClient::new(config).unwrap();
        assert!(matches!(
            client.fetch_synonyms().await,
            Err(SynonymError::HttpError(_))
        ));
    }

    #[tokio::test]
    #[ignore] // requires network access
    async fn test_fetch_live() {
        let client = SynonymClient::new(SynonymClientConfig::default()).unwrap();
        let table = client.fetch_synonyms().await.expect("fetch failed");
        assert!(table.len() > 1000, "only {} synonyms", table.len());
        assert_eq!(table.get("Afghanistan"), Some("afg"));
    }
}
