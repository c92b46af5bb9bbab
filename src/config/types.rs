use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for Harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// URLs added to the frontier at the start of every run
    #[serde(default)]
    pub seeds: Vec<String>,

    #[serde(default)]
    pub frontier: FrontierConfig,

    #[serde(default)]
    pub crawler: CrawlerConfig,

    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Ordered handler list; the first pattern that matches a URL wins
    #[serde(default)]
    pub handlers: Vec<HandlerEntry>,
}

/// Frontier and checkpoint configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrontierConfig {
    /// Checkpoint file, relative to the config file's directory
    #[serde(rename = "state-file")]
    pub state_file: Option<String>,

    /// Crawl budget: maximum number of URLs popped across all runs
    #[serde(rename = "max-pages")]
    pub max_pages: Option<u64>,

    /// Priority patterns, anchored at the start of the URL, highest first
    #[serde(default)]
    pub priorities: Vec<String>,
}

/// Crawl loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of concurrent fetch+handle tasks (1 = sequential)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Artifact directory, relative to the config file's directory
    #[serde(rename = "dump-dir", default = "default_dump_dir")]
    pub dump_dir: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            dump_dir: default_dump_dir(),
        }
    }
}

fn default_concurrency() -> usize {
    1
}

fn default_dump_dir() -> String {
    "dump".to_string()
}

/// HTTP fetcher configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// Headers sent with every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Global request rate across all workers; absent means unthrottled
    #[serde(rename = "throttle-per-second")]
    pub throttle_per_second: Option<f64>,

    /// Upper bound for a single request, in seconds
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Route requests through a remote rendering/proxy service
    #[serde(rename = "scraper-api")]
    pub scraper_api: Option<ScraperApiConfig>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            headers: BTreeMap::new(),
            throttle_per_second: None,
            request_timeout_secs: default_request_timeout(),
            scraper_api: None,
        }
    }
}

fn default_request_timeout() -> u64 {
    30
}

/// Remote rendering/proxy service credentials
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperApiConfig {
    pub key: String,

    #[serde(default = "default_scraper_endpoint")]
    pub endpoint: String,

    #[serde(rename = "country-code", default = "default_country_code")]
    pub country_code: String,

    #[serde(default)]
    pub render: bool,
}

impl ScraperApiConfig {
    /// Credentials for the default endpoint with default options
    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            endpoint: default_scraper_endpoint(),
            country_code: default_country_code(),
            render: false,
        }
    }
}

fn default_scraper_endpoint() -> String {
    "http://api.scraperapi.com".to_string()
}

fn default_country_code() -> String {
    "us".to_string()
}

/// One entry of the handler list
#[derive(Debug, Clone, Deserialize)]
pub struct HandlerEntry {
    /// Regex searched (unanchored) in the URL
    pub pattern: String,

    #[serde(flatten)]
    pub kind: HandlerKind,
}

/// Built-in handler kinds and their parameters
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum HandlerKind {
    /// Sitemap index: emit the values selected by `xpath`
    Sitemap { xpath: String },

    /// Gzip-compressed product sitemap
    ProductsGz {
        xpath: String,
        #[serde(rename = "url-xpath")]
        url_xpath: String,
        #[serde(rename = "image-xpath")]
        image_xpath: Option<String>,
    },

    /// Store the raw response as an artifact; terminal
    Dump {
        #[serde(rename = "allow-redirects", default)]
        allow_redirects: bool,
    },

    /// Follow anchors under `base-url`, optionally storing the page
    Links {
        #[serde(rename = "base-url")]
        base_url: String,
        #[serde(default)]
        store: bool,
        #[serde(rename = "allow-redirects", default)]
        allow_redirects: bool,
    },
}
