use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GuardError, Result};

/// Default maximum rule text size (1 MiB)
pub const DEFAULT_MAX_RULES_SIZE: usize = 1 << 20;

/// Default maximum URL length in bytes
pub const DEFAULT_MAX_URL_LENGTH: usize = 8192;

/// Default maximum number of parameters scanned per query
pub const DEFAULT_MAX_PARAMS: usize = 100;

/// Default number of compiled wildcard matchers cached per generation
pub const DEFAULT_MATCHER_CACHE_SIZE: usize = 1024;

/// Default number of pooled scratch buffers
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Engine limits. Every limit fails closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Rule text larger than this is rejected
    pub max_rules_size: usize,
    /// URLs (path plus query) longer than this are invalid
    pub max_url_length: usize,
    /// Queries with more parameters than this are invalid
    pub max_params: usize,
    /// Capacity of the per-generation wildcard matcher cache
    pub matcher_cache_size: usize,
    /// Scratch buffers kept for filtering
    pub pool_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_rules_size: DEFAULT_MAX_RULES_SIZE,
            max_url_length: DEFAULT_MAX_URL_LENGTH,
            max_params: DEFAULT_MAX_PARAMS,
            matcher_cache_size: DEFAULT_MATCHER_CACHE_SIZE,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

impl Config {
    /// Create a config with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum rule text size.
    pub fn with_max_rules_size(mut self, size: usize) -> Self {
        self.max_rules_size = size;
        self
    }

    /// Set the maximum URL length.
    pub fn with_max_url_length(mut self, len: usize) -> Self {
        self.max_url_length = len;
        self
    }

    /// Set the maximum parameter count per query.
    pub fn with_max_params(mut self, count: usize) -> Self {
        self.max_params = count;
        self
    }

    /// Set the wildcard matcher cache size.
    pub fn with_matcher_cache_size(mut self, size: usize) -> Self {
        self.matcher_cache_size = size;
        self
    }

    /// Set the scratch buffer pool size.
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Reject limits that would make the engine unusable.
    pub fn validate(&self) -> Result<()> {
        let limits = [
            ("max_rules_size", self.max_rules_size),
            ("max_url_length", self.max_url_length),
            ("max_params", self.max_params),
            ("matcher_cache_size", self.matcher_cache_size),
        ];
        for (name, value) in limits {
            if value == 0 {
                return Err(GuardError::Config(format!("{} must be greater than 0", name)));
            }
        }
        Ok(())
    }
}
