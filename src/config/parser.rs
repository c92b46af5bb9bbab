use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;
use toml::{Table, Value};

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use harvester::config::load_config;
///
/// let config = load_config(Path::new("crawl.toml")).unwrap();
/// println!("Concurrency: {}", config.crawler.concurrency);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    load_config_with_overrides(path, &[])
}

/// Loads a configuration file and patches it with dotted-path overrides
///
/// Each override has the form `a.b.c=value`. The value is parsed as a TOML
/// literal (`10`, `true`, `["x"]`, `"quoted"`) and falls back to a plain
/// string. Missing intermediate tables are created; numeric segments index
/// into arrays (`handlers.0.xpath=...`). Overrides are applied before
/// validation, so an override can never bypass it.
pub fn load_config_with_overrides(
    path: &Path,
    overrides: &[String],
) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content, overrides)
}

/// Parses configuration text, applies overrides, and validates the result
pub fn parse_config(content: &str, overrides: &[String]) -> Result<Config, ConfigError> {
    let mut document: Table = toml::from_str(content)?;

    for raw in overrides {
        apply_override(&mut document, raw)?;
    }

    let config: Config = Value::Table(document).try_into()?;

    validate(&config)?;

    Ok(config)
}

/// Applies a single `dotted.key=value` override to a TOML document
fn apply_override(document: &mut Table, raw: &str) -> Result<(), ConfigError> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| ConfigError::Override(raw.to_string(), "expected key=value".into()))?;

    let segments: Vec<&str> = key.trim().split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(ConfigError::Override(
            raw.to_string(),
            "empty key segment".into(),
        ));
    }

    let value = parse_override_value(value.trim());
    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| ConfigError::Override(raw.to_string(), "empty key".into()))?;

    let mut current: &mut Value = document
        .entry(parents.first().copied().unwrap_or(last).to_string())
        .or_insert_with(|| Value::Table(Table::new()));

    if parents.is_empty() {
        *current = value;
        return Ok(());
    }

    for segment in &parents[1..] {
        current = descend(current, segment).map_err(|e| ConfigError::Override(raw.to_string(), e))?;
    }

    match current {
        Value::Table(table) => {
            table.insert(last.to_string(), value);
        }
        Value::Array(items) => {
            let slot = array_slot(items, last).map_err(|e| ConfigError::Override(raw.to_string(), e))?;
            *slot = value;
        }
        _ => {
            return Err(ConfigError::Override(
                raw.to_string(),
                format!("cannot set '{}' on a non-table value", last),
            ))
        }
    }

    Ok(())
}

/// Steps one segment deeper, creating a table when the key is missing
fn descend<'a>(current: &'a mut Value, segment: &str) -> Result<&'a mut Value, String> {
    match current {
        Value::Table(table) => Ok(table
            .entry(segment.to_string())
            .or_insert_with(|| Value::Table(Table::new()))),
        Value::Array(items) => array_slot(items, segment),
        _ => Err(format!("'{}' is not inside a table or array", segment)),
    }
}

fn array_slot<'a>(items: &'a mut [Value], segment: &str) -> Result<&'a mut Value, String> {
    let index: usize = segment
        .parse()
        .map_err(|_| format!("'{}' is not an array index", segment))?;
    let len = items.len();
    items
        .get_mut(index)
        .ok_or_else(|| format!("index {} out of bounds (len {})", index, len))
}

/// Parses an override value as a TOML literal, falling back to a string
fn parse_override_value(raw: &str) -> Value {
    toml::from_str::<Table>(&format!("value = {}", raw))
        .ok()
        .and_then(|mut table| table.remove("value"))
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

/// Computes a SHA-256 hash of the configuration file content
///
/// This is logged at startup so runs against different configs can be told
/// apart when resuming from the same checkpoint.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration with overrides and returns both the config and its file hash
pub fn load_config_with_hash(
    path: &Path,
    overrides: &[String],
) -> Result<(Config, String), ConfigError> {
    let config = load_config_with_overrides(path, overrides)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HandlerKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const VALID: &str = r#"
seeds = ["https://shop.example/sitemap.xml"]

[frontier]
state-file = "state.toml"
max-pages = 100
priorities = ["^https://shop\\.example/sitemap"]

[crawler]
concurrency = 4

[fetcher]
throttle-per-second = 2.0

[fetcher.headers]
User-Agent = "TestAgent/1.0"

[[handlers]]
pattern = "sitemap"
kind = "sitemap"
xpath = "//sm:sitemap/sm:loc/text()"

[[handlers]]
pattern = "\\.xml\\.gz$"
kind = "products-gz"
xpath = "//sm:url"
url-xpath = "sm:loc/text()"
image-xpath = "image:image/image:loc/text()"

[[handlers]]
pattern = "/products/"
kind = "dump"
"#;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let file = create_temp_config(VALID);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.seeds.len(), 1);
        assert_eq!(config.frontier.max_pages, Some(100));
        assert_eq!(config.frontier.state_file.as_deref(), Some("state.toml"));
        assert_eq!(config.crawler.concurrency, 4);
        assert_eq!(config.crawler.dump_dir, "dump");
        assert_eq!(config.fetcher.throttle_per_second, Some(2.0));
        assert_eq!(config.fetcher.request_timeout_secs, 30);
        assert_eq!(
            config.fetcher.headers.get("User-Agent").map(String::as_str),
            Some("TestAgent/1.0")
        );
        assert_eq!(config.handlers.len(), 3);
        assert_eq!(
            config.handlers[2].kind,
            HandlerKind::Dump {
                allow_redirects: false
            }
        );
        match &config.handlers[1].kind {
            HandlerKind::ProductsGz { image_xpath, .. } => assert!(image_xpath.is_some()),
            other => panic!("unexpected handler kind {:?}", other),
        }
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/crawl.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_handler_kind_is_rejected() {
        let content = r#"
[[handlers]]
pattern = ".*"
kind = "screenshot"
"#;
        let result = parse_config(content, &[]);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_override_nested_value() {
        let config = parse_config(VALID, &["frontier.max-pages=7".to_string()]).unwrap();
        assert_eq!(config.frontier.max_pages, Some(7));
    }

    #[test]
    fn test_override_creates_missing_tables() {
        let config = parse_config(
            "seeds = []",
            &["fetcher.scraper-api.key=secret".to_string()],
        )
        .unwrap();
        let api = config.fetcher.scraper_api.unwrap();
        assert_eq!(api.key, "secret");
        assert_eq!(api.endpoint, "http://api.scraperapi.com");
        assert_eq!(api.country_code, "us");
    }

    #[test]
    fn test_override_top_level_and_array_literal() {
        let config = parse_config(
            VALID,
            &[r#"seeds=["https://a.example/", "https://b.example/"]"#.to_string()],
        )
        .unwrap();
        assert_eq!(config.seeds.len(), 2);
    }

    #[test]
    fn test_override_array_index() {
        let config = parse_config(VALID, &["handlers.0.xpath=//sm:loc".to_string()]).unwrap();
        assert_eq!(
            config.handlers[0].kind,
            HandlerKind::Sitemap {
                xpath: "//sm:loc".to_string()
            }
        );
    }

    #[test]
    fn test_override_is_validated() {
        let result = parse_config(VALID, &["crawler.concurrency=0".to_string()]);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_tiny_throttle_is_rejected() {
        let result = parse_config("seeds = []\n[fetcher]\nthrottle-per-second = 1e-30\n", &[]);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_malformed_override() {
        assert!(matches!(
            parse_config(VALID, &["no-equals-sign".to_string()]),
            Err(ConfigError::Override(..))
        ));
        assert!(matches!(
            parse_config(VALID, &["handlers.9.xpath=x".to_string()]),
            Err(ConfigError::Override(..))
        ));
        assert!(matches!(
            parse_config(VALID, &["frontier..max-pages=1".to_string()]),
            Err(ConfigError::Override(..))
        ));
    }

    #[test]
    fn test_parse_override_value() {
        assert_eq!(parse_override_value("10"), Value::Integer(10));
        assert_eq!(parse_override_value("true"), Value::Boolean(true));
        assert_eq!(
            parse_override_value("plain text"),
            Value::String("plain text".to_string())
        );
        assert_eq!(
            parse_override_value("\"quoted\""),
            Value::String("quoted".to_string())
        );
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }
}
