//! Configuration module for photofeed

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::feed::FeedConfig;
use crate::images::ImageCacheConfig;
use crate::paths;

/// Environment variable overriding `api_base_url`
pub const BASE_URL_ENV: &str = "PHOTOFEED_BASE_URL";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Root of the photo list API (required)
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// Number of photos to fetch per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Extra attempts for a page fetch that fails in transport
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Width rows are laid out at, in pixels
    #[serde(default = "default_display_width")]
    pub display_width: u32,

    /// Quiet period before a search query is applied, in milliseconds
    #[serde(default = "default_search_debounce")]
    pub search_debounce_ms: u64,

    /// Maximum decoded size of cached thumbnails, in bytes
    #[serde(default = "default_cache_max_cost")]
    pub cache_max_cost_bytes: usize,

    /// Maximum number of cached thumbnails
    #[serde(default = "default_cache_max_count")]
    pub cache_max_count: usize,

    /// Maximum simultaneous thumbnail downloads
    #[serde(default = "default_max_concurrent_downloads")]
    pub max_concurrent_downloads: usize,
}

fn default_page_size() -> u32 {
    100
}

fn default_max_retries() -> u32 {
    2
}

fn default_request_timeout() -> u64 {
    30
}

fn default_display_width() -> u32 {
    390
}

fn default_search_debounce() -> u64 {
    500
}

fn default_cache_max_cost() -> usize {
    120 * 1024 * 1024
}

fn default_cache_max_count() -> usize {
    200
}

fn default_max_concurrent_downloads() -> usize {
    4
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: None,
            page_size: default_page_size(),
            max_retries: default_max_retries(),
            request_timeout_secs: default_request_timeout(),
            display_width: default_display_width(),
            search_debounce_ms: default_search_debounce(),
            cache_max_cost_bytes: default_cache_max_cost(),
            cache_max_count: default_cache_max_count(),
            max_concurrent_downloads: default_max_concurrent_downloads(),
        }
    }
}

impl Config {
    /// Load config from the default path, then apply environment overrides
    pub fn load() -> Result<Self> {
        let path = paths::config_path()?;
        let mut config = Self::load_from(&path)?;
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            config.api_base_url = Some(url);
        }
        Ok(config)
    }

    /// Load config from a specific path, or defaults when it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// The API base URL; startup cannot proceed without one
    pub fn base_url(&self) -> Result<&str> {
        match self.api_base_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(url),
            _ => bail!("api_base_url is not configured (set it in config.toml or {BASE_URL_ENV})"),
        }
    }

    /// HTTP request timeout
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Feed settings
    pub const fn feed(&self) -> FeedConfig {
        FeedConfig {
            page_size: self.page_size,
            max_retries: self.max_retries,
            debounce: Duration::from_millis(self.search_debounce_ms),
        }
    }

    /// Thumbnail cache settings
    pub const fn image_cache(&self) -> ImageCacheConfig {
        ImageCacheConfig {
            max_total_cost: self.cache_max_cost_bytes,
            max_count: self.cache_max_count,
            max_concurrent_downloads: self.max_concurrent_downloads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert!(config.base_url().is_err());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "api_base_url = \"https://picsum.photos\"\npage_size = 30\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.base_url().unwrap(), "https://picsum.photos");
        assert_eq!(config.page_size, 30);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.feed().debounce, Duration::from_millis(500));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            api_base_url: Some("http://localhost:8080".to_string()),
            cache_max_count: 12,
            ..Config::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_blank_base_url_rejected() {
        let config = Config {
            api_base_url: Some("   ".to_string()),
            ..Config::default()
        };
        assert!(config.base_url().is_err());
    }
}
