use crate::ConfigError;
use regex::Regex;

/// Assigns priority classes to URLs from an ordered list of patterns
///
/// Each pattern is anchored at the start of the URL. The class of a URL is
/// the index of the first pattern that matches; URLs matching nothing fall
/// into the lowest-priority class, whose index equals the number of patterns.
#[derive(Debug, Clone)]
pub struct PriorityMatcher {
    patterns: Vec<Regex>,
}

impl PriorityMatcher {
    /// Compiles the priority patterns
    ///
    /// # Arguments
    ///
    /// * `patterns` - Regular expressions in priority order (highest first)
    ///
    /// # Returns
    ///
    /// * `Ok(PriorityMatcher)` - All patterns compiled
    /// * `Err(ConfigError::InvalidPattern)` - A pattern is not a valid regex
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ConfigError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                let p = p.as_ref();
                Regex::new(&format!("^(?:{})", p)).map_err(|source| ConfigError::InvalidPattern {
                    pattern: p.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { patterns })
    }

    /// A matcher with no patterns: every URL lands in class 0
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    /// Number of priority classes, including the catch-all class
    pub fn class_count(&self) -> usize {
        self.patterns.len() + 1
    }

    /// Returns the priority class of a URL (lower is more urgent)
    pub fn classify(&self, url: &str) -> usize {
        self.patterns
            .iter()
            .position(|re| re.is_match(url))
            .unwrap_or(self.patterns.len())
    }
}
