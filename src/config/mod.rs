//! Configuration loading and management

use crate::core::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Process-wide settings for the resolution engine
///
/// Loaded once at startup and shared (read-only) by every request.
///
/// # Example
/// ```yaml
/// concurrency: true
/// cache: true
/// cache_key_separator: "+"
/// default_page_size: 20
/// max_page_size: 100
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Resolve sibling sideloads on parallel tasks
    pub concurrency: bool,

    /// Compute a composite cache key for `Runtime::all`
    pub cache: bool,

    /// Separator used when joining cache key fragments
    pub cache_key_separator: String,

    /// Page size applied when a request asks for pagination without a size
    pub default_page_size: usize,

    /// Upper bound for any requested page size
    pub max_page_size: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            concurrency: false,
            cache: false,
            cache_key_separator: "+".to_string(),
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

impl ResolverConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Load {
            message: format!("{}: {}", path, e),
        })?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::Load {
            message: e.to_string(),
        })
    }

    /// Builder-style toggle for concurrent sideload resolution
    pub fn with_concurrency(mut self, concurrency: bool) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Builder-style toggle for cache key computation in `Runtime::all`
    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }
}
