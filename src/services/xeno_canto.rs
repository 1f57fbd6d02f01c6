//! Remote catalog client
//!
//! Two endpoints: the paged recordings query (JSON) and the per-id audio
//! download (opaque binary). Requests are rate limited client-side. The
//! `CatalogApi` trait is the seam the pipeline stages depend on, so tests
//! can drive them with an in-memory implementation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{Error, ItemError, Result};
use crate::types::CatalogPageResponse;

const USER_AGENT: &str = concat!("turdus/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;
const RATE_LIMIT_MS: u64 = 1000; // 1 request per second
const RECORDINGS_QUERY: &str = "nr:0-10000000";

/// Remote catalog operations
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Fetch one catalog page (1-based)
    async fn fetch_page(&self, page: u32) -> std::result::Result<CatalogPageResponse, ItemError>;

    /// Download the raw audio payload for a record id
    async fn download_audio(&self, id: u64) -> std::result::Result<Vec<u8>, ItemError>;
}

/// Rate limiter enforcing a minimum interval between requests
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    /// Wait if necessary to comply with rate limit
    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// HTTP client for the xeno-canto-style catalog service
pub struct XenoCantoClient {
    http_client: reqwest::Client,
    base_url: String,
    rate_limiter: Arc<RateLimiter>,
}

impl XenoCantoClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            rate_limiter: Arc::new(RateLimiter::new(RATE_LIMIT_MS)),
        })
    }
}

#[async_trait]
impl CatalogApi for XenoCantoClient {
    async fn fetch_page(&self, page: u32) -> std::result::Result<CatalogPageResponse, ItemError> {
        self.rate_limiter.wait().await;

        let url = format!(
            "{}/api/2/recordings?query={}&page={}",
            self.base_url, RECORDINGS_QUERY, page
        );
        tracing::debug!(page = page, url = %url, "Querying catalog");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| ItemError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ItemError::Network(format!(
                "status {} for page {}",
                status, page
            )));
        }

        response
            .json::<CatalogPageResponse>()
            .await
            .map_err(|e| ItemError::Decode(e.to_string()))
    }

    async fn download_audio(&self, id: u64) -> std::result::Result<Vec<u8>, ItemError> {
        self.rate_limiter.wait().await;

        let url = format!("{}/{}/download", self.base_url, id);
        tracing::debug!(id = id, url = %url, "Downloading audio");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| ItemError::Network(e.to_string()))?;

        let status = response.status();
        if status == 404 {
            return Err(ItemError::NotFound);
        }
        if !status.is_success() {
            return Err(ItemError::Network(format!("status {} for id {}", status, id)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ItemError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
