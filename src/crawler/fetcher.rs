//! HTTP fetcher implementation
//!
//! This module handles every request the crawler makes, including:
//! - Building the HTTP client with the configured headers and timeout
//! - Routing requests through the rendering proxy when one is configured
//! - Reading `file://` URLs from disk
//! - Classifying failures into [`FetchError`]
//!
//! The fetcher does not retry; retries belong to the dispatcher.

use crate::config::{FetcherConfig, ScraperApiConfig};
use crate::crawler::rate_limiter::RateLimiter;
use crate::url::is_file_url;
use crate::{ConfigError, HarvestError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Maximum number of redirects followed for one request
pub const MAX_REDIRECTS: usize = 10;

/// Content retrieved for one URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// The URL that was requested
    pub url: String,

    /// The URL the content was served from after redirects
    pub final_url: String,

    /// Raw response body
    pub body: Vec<u8>,
}

impl FetchedPage {
    pub fn new(url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        let url = url.into();
        Self {
            final_url: url.clone(),
            url,
            body: body.into(),
        }
    }

    pub fn was_redirected(&self) -> bool {
        self.final_url != self.url
    }

    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Errors raised while fetching a single URL
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to read {url}: {source}")]
    File {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// The HTTP status, when the server answered with one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Source of page content
///
/// The crawl loop and the download workload are generic over this trait so
/// they can run against an in-memory fetcher.
pub trait Fetch: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<FetchedPage, FetchError>> + Send;
}

/// Builds an HTTP client with the configured headers and timeout
///
/// # Arguments
///
/// * `config` - The fetcher configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(HarvestError::Config)` - A configured header name or value is invalid
/// * `Err(HarvestError::Http)` - Failed to build the client
pub fn build_http_client(config: &FetcherConfig) -> Result<Client, HarvestError> {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            ConfigError::Validation(format!("Invalid header name '{}': {}", name, e))
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| {
            ConfigError::Validation(format!("Invalid value for header '{}': {}", name, e))
        })?;
        headers.insert(header_name, header_value);
    }

    let client = Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()?;

    Ok(client)
}

/// Fetches pages over HTTP, or from disk for `file://` URLs
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    limiter: Arc<RateLimiter>,
    scraper_api: Option<ScraperApiConfig>,
}

impl HttpFetcher {
    /// Creates a fetcher from configuration with its own rate limiter
    pub fn new(config: &FetcherConfig) -> Result<Self, HarvestError> {
        Ok(Self {
            client: build_http_client(config)?,
            limiter: Arc::new(RateLimiter::from_option(config.throttle_per_second)),
            scraper_api: config.scraper_api.clone(),
        })
    }

    async fn fetch_file(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let path = Url::parse(url)
            .ok()
            .and_then(|parsed| parsed.to_file_path().ok())
            .ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?;

        let body = tokio::fs::read(&path).await.map_err(|source| FetchError::File {
            url: url.to_string(),
            source,
        })?;

        Ok(FetchedPage::new(url, body))
    }

    async fn fetch_http(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };

        let request = match &self.scraper_api {
            Some(api) => self.client.get(&api.endpoint).query(&[
                ("api_key", api.key.as_str()),
                ("render", if api.render { "true" } else { "false" }),
                ("country_code", api.country_code.as_str()),
                ("url", url),
            ]),
            None => {
                Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
                self.client.get(url)
            }
        };

        self.limiter.wait().await;
        tracing::debug!(url = %url, "GET");

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        // Behind the proxy the response URL is the endpoint, not the page
        let final_url = match &self.scraper_api {
            Some(_) => url.to_string(),
            None => response.url().to_string(),
        };
        let body = response.bytes().await.map_err(transport)?;

        Ok(FetchedPage {
            url: url.to_string(),
            final_url,
            body: body.to_vec(),
        })
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        if is_file_url(url) {
            self.fetch_file(url).await
        } else {
            self.fetch_http(url).await
        }
    }
}
