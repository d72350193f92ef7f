//! HTTP fetch pipeline for gallery and item pages.
//!
//! ### Page fetch primitive
//! - One GET per attempt; non-2xx is a failure
//! - Bodies larger than `max_bytes` are rejected
//! - A declared content type other than HTML is a parse failure
//! - Attempts are wrapped in a [`RetryPolicy`] (default: 3 attempts, linear backoff)
//! - Exhaustion surfaces as `Error::FetchExhausted`
//!
//! [`PageSource`] is the seam the indexer and reader consume, so tests can
//! serve canned HTML instead of the network.

pub mod retry;
pub mod url;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url, header};

pub use retry::{RetryError, RetryPolicy};
pub use url::{UrlError, canonicalize, gallery_base, gallery_id_from_url, page_url};

use pagewalk_core::{AppConfig, Error};

/// Anything that can turn a URL into an HTML document.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_html(&self, url: &Url) -> Result<String, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "pagewalk/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Attempts per document (default: 3)
    pub max_attempts: u32,

    /// Linear backoff step between attempts (default: 1s)
    pub retry_delay: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "pagewalk/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
            max_attempts: 3,
            retry_delay: Duration::from_millis(1000),
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout: config.timeout(),
            max_attempts: config.fetch_max_attempts,
            retry_delay: config.retry_delay(),
            ..Default::default()
        }
    }
}

/// Response from a single fetch attempt.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The URL requested
    pub url: Url,
    /// The final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response body, decoded lossily as UTF-8
    pub body: String,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

/// HTTP fetch client with bounded retries.
#[derive(Debug, Clone)]
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
    policy: RetryPolicy,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {}", e)))?;

        let policy = RetryPolicy::linear(config.max_attempts, config.retry_delay);

        Ok(Self { http, config, policy })
    }

    /// Fetch a URL once, returning the body and metadata.
    pub async fn fetch(&self, url: &Url) -> Result<FetchResponse, Error> {
        let start = Instant::now();

        let response = self
            .http
            .get(url.as_str())
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::FetchTimeout(format!("{url}: {e}"))
                } else {
                    Error::HttpError(format!("network error: {}", e))
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            return Err(Error::HttpError(format!("status {}", status.as_u16())));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::HttpError(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        if let Some(ct) = content_type.as_deref()
            && !is_html(ct)
        {
            return Err(Error::ParseFailed(format!("{url}: unexpected content type {ct}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::HttpError(format!("failed to read response: {}", e)))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::HttpError(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!("fetched {} -> {} in {}ms ({} bytes)", url, final_url, fetch_ms, bytes.len());

        Ok(FetchResponse {
            url: url.clone(),
            final_url,
            status,
            content_type,
            body: String::from_utf8_lossy(&bytes).into_owned(),
            fetch_ms,
        })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

fn is_html(content_type: &str) -> bool {
    let mime = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml"
}

#[async_trait]
impl PageSource for FetchClient {
    async fn fetch_html(&self, url: &Url) -> Result<String, Error> {
        self.policy
            .run(|_| self.fetch(url))
            .await
            .map(|response| response.body)
            .map_err(|e| {
                let attempts = e.attempts();
                let last = e.into_last();
                tracing::warn!(%url, attempts, error = %last, "fetch attempts exhausted");
                Error::FetchExhausted { url: url.to_string(), attempts, last: last.to_string() }
            })
    }
}
