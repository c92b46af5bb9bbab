use crate::config::types::{Config, CrawlerConfig, FetcherConfig, HandlerEntry, HandlerKind};
use crate::url::PriorityMatcher;
use crate::xml::XPath;
use crate::ConfigError;
use regex::Regex;
use std::time::Duration;
use url::Url;

/// Upper bound on the crawl worker pool
const MAX_CONCURRENCY: usize = 256;

/// Validates the entire configuration
///
/// Every pattern and path expression is compiled here so that a bad config
/// fails before the first request is made.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_seeds(&config.seeds)?;
    PriorityMatcher::new(&config.frontier.priorities)?;
    validate_crawler_config(&config.crawler)?;
    validate_fetcher_config(&config.fetcher)?;
    for entry in &config.handlers {
        validate_handler(entry)?;
    }
    Ok(())
}

fn validate_seeds(seeds: &[String]) -> Result<(), ConfigError> {
    for seed in seeds {
        if seed.trim().is_empty() {
            return Err(ConfigError::Validation(
                "seed URLs cannot be empty".to_string(),
            ));
        }
    }
    Ok(())
}

/// Validates crawl loop configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > MAX_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and {}, got {}",
            MAX_CONCURRENCY, config.concurrency
        )));
    }

    if config.dump_dir.is_empty() {
        return Err(ConfigError::Validation(
            "dump-dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates fetcher configuration
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if let Some(rate) = config.throttle_per_second {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "throttle-per-second must be a positive number, got {}",
                rate
            )));
        }
        if Duration::try_from_secs_f64(1.0 / rate).is_err() {
            return Err(ConfigError::Validation(format!(
                "throttle-per-second {} is too small to schedule",
                rate
            )));
        }
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    if let Some(api) = &config.scraper_api {
        if api.key.is_empty() {
            return Err(ConfigError::Validation(
                "scraper-api key cannot be empty".to_string(),
            ));
        }
        Url::parse(&api.endpoint).map_err(|e| {
            ConfigError::Validation(format!("Invalid scraper-api endpoint: {}", e))
        })?;
    }

    Ok(())
}

/// Validates one handler entry: its pattern and every path it carries
fn validate_handler(entry: &HandlerEntry) -> Result<(), ConfigError> {
    Regex::new(&entry.pattern).map_err(|source| ConfigError::InvalidPattern {
        pattern: entry.pattern.clone(),
        source,
    })?;

    match &entry.kind {
        HandlerKind::Sitemap { xpath } => {
            XPath::parse(xpath)?;
        }
        HandlerKind::ProductsGz {
            xpath,
            url_xpath,
            image_xpath,
        } => {
            XPath::parse(xpath)?;
            XPath::parse(url_xpath)?;
            if let Some(image_xpath) = image_xpath {
                XPath::parse(image_xpath)?;
            }
        }
        HandlerKind::Dump { .. } => {}
        HandlerKind::Links { base_url, .. } => {
            Url::parse(base_url).map_err(|e| {
                ConfigError::Validation(format!("Invalid base-url '{}': {}", base_url, e))
            })?;
        }
    }

    Ok(())
}
