//! Content-addressed conditional cache for outbound upstream GETs.
//!
//! Records live in a flat directory, one JSON file per URL named by the
//! base64-encoded URL. Freshness is delegated entirely to upstream
//! validators: a stored ETag is replayed as `If-None-Match`, a 304 serves
//! the stored bytes, a 200 replaces the record atomically, and transport
//! errors fall back to the stored record when one exists.

use crate::error::{RegistryError, Result};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use bytes::Bytes;
use chrono::Utc;
use dashmap::DashMap;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Flight outcomes are cloned to every waiter, so the error side carries
/// only what survives a clone: the message plus an optional HTTP status.
#[derive(Debug, Clone)]
struct FlightError {
    status: Option<u16>,
    message: String,
}

impl From<RegistryError> for FlightError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UpstreamStatus { status, message } => Self {
                status: Some(status),
                message,
            },
            other => Self {
                status: None,
                message: other.to_string(),
            },
        }
    }
}

impl From<FlightError> for RegistryError {
    fn from(err: FlightError) -> Self {
        match err.status {
            Some(status) => Self::UpstreamStatus {
                status,
                message: err.message,
            },
            None => Self::Upstream {
                message: err.message,
            },
        }
    }
}

type FlightResult = std::result::Result<Bytes, FlightError>;

#[derive(Debug, Serialize, Deserialize)]
struct CacheRecord {
    etag: Option<String>,
    /// Raw response body, base64-encoded so XML and JSON share one shape.
    data: String,
    timestamp: String,
}

impl CacheRecord {
    fn decode(&self) -> Result<Bytes> {
        let bytes = URL_SAFE_NO_PAD
            .decode(&self.data)
            .map_err(|e| RegistryError::Cache(format!("corrupt cache record: {e}")))?;
        Ok(Bytes::from(bytes))
    }
}

/// Conditional HTTP cache with per-URL single-flight.
pub struct HttpCache {
    dir: PathBuf,
    client: reqwest::Client,
    inflight: DashMap<String, Arc<OnceCell<FlightResult>>>,
}

impl HttpCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            client: reqwest::Client::new(),
            inflight: DashMap::new(),
        }
    }

    pub fn with_client(dir: impl Into<PathBuf>, client: reqwest::Client) -> Self {
        Self {
            dir: dir.into(),
            client,
            inflight: DashMap::new(),
        }
    }

    /// Fetches `url` through the cache with the default timeout.
    pub async fn get(&self, url: &str) -> Result<Bytes> {
        self.get_with(url, &[], DEFAULT_TIMEOUT).await
    }

    /// Fetches `url` and parses the body as JSON.
    pub async fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        let data = self.get(url).await?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Fetches `url` with extra request headers and a bounded timeout.
    ///
    /// At most one refresh per URL is in flight at any time: the first
    /// caller performs the fetch, concurrent callers for the same URL share
    /// its outcome without touching the upstream.
    pub async fn get_with(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<Bytes> {
        let flight = self
            .inflight
            .entry(url.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let outcome = flight
            .get_or_init(|| async {
                self.refresh(url, headers, timeout)
                    .await
                    .map_err(FlightError::from)
            })
            .await
            .clone();

        // Drop the completed flight so the next request revalidates afresh.
        self.inflight
            .remove_if(url, |_, cell| Arc::ptr_eq(cell, &flight));

        outcome.map_err(RegistryError::from)
    }

    async fn refresh(&self, url: &str, headers: &[(&str, &str)], timeout: Duration) -> Result<Bytes> {
        let path = self.record_path(url);
        let stored = read_record(&path).await;

        let mut request = self.client.get(url).timeout(timeout);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        if let Some(record) = &stored
            && let Some(etag) = &record.etag
        {
            request = request.header(reqwest::header::IF_NONE_MATCH, etag.as_str());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                // Transport fault: serve the stored record when we have one.
                if let Some(record) = &stored {
                    tracing::debug!(url, error = %err, "upstream unreachable, serving cached record");
                    return record.decode();
                }
                return Err(RegistryError::upstream(err.to_string()));
            }
        };

        match response.status() {
            StatusCode::NOT_MODIFIED => {
                let record = stored
                    .ok_or_else(|| RegistryError::Cache(format!("304 without record for {url}")))?;
                record.decode()
            }
            status if status.is_success() => {
                let etag = response
                    .headers()
                    .get(reqwest::header::ETAG)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let body = response.bytes().await?;
                let record = CacheRecord {
                    etag,
                    data: URL_SAFE_NO_PAD.encode(&body),
                    timestamp: Utc::now().to_rfc3339(),
                };
                write_record(&path, &record).await?;
                Ok(body)
            }
            status => {
                if let Some(record) = &stored {
                    tracing::debug!(url, %status, "upstream error, serving cached record");
                    return record.decode();
                }
                Err(RegistryError::UpstreamStatus {
                    status: status.as_u16(),
                    message: format!("GET {url} returned {status}"),
                })
            }
        }
    }

    fn record_path(&self, url: &str) -> PathBuf {
        self.dir.join(URL_SAFE_NO_PAD.encode(url))
    }
}

async fn read_record(path: &Path) -> Option<CacheRecord> {
    let data = tokio::fs::read(path).await.ok()?;
    serde_json::from_slice(&data).ok()
}

async fn write_record(path: &Path, record: &CacheRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    // Write-then-rename so readers never observe a partial record.
    let tmp = path.with_extension("tmp");
    let data = serde_json::to_vec(record)?;
    tokio::fs::write(&tmp, data).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
