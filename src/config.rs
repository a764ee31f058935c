//! Configuration types for episode-dl

use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

use crate::error::{Error, Result};

/// Download behavior configuration (output location, concurrency, container format)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Root directory episodes are written under (default: ".")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Number of concurrent page fetches (default: 4)
    ///
    /// Also the capacity of the work queue, so traversal pauses once this many
    /// pages are waiting for a worker.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// File extension of episode containers, without the dot (default: "cbz")
    #[serde(default = "default_archive_extension")]
    pub archive_extension: String,

    /// Capacity of the event broadcast channel (default: 1024)
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            concurrency: default_concurrency(),
            archive_extension: default_archive_extension(),
            event_buffer: default_event_buffer(),
        }
    }
}

/// Remote site addressing and HTTP client settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Base address all locators and assets are resolved against
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path between the base address and the locator segments (default: "comics/album")
    #[serde(default = "default_album_path")]
    pub album_path: String,

    /// Replacement for the size fragment of asset addresses (default: "fl", full size)
    #[serde(default = "default_asset_size_segment")]
    pub asset_size_segment: String,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Limit on connecting, on waiting for a response, and on reading a body (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            album_path: default_album_path(),
            asset_size_segment: default_asset_size_segment(),
            user_agent: default_user_agent(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// CSS selectors used to pull links out of remote documents
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Element that holds the listing; only the first match is searched (default: ".gallery")
    #[serde(default = "default_container_selector")]
    pub container_selector: String,

    /// Child resource links on artist and album pages (default: "a")
    #[serde(default = "default_child_selector")]
    pub child_selector: String,

    /// Attribute holding the child link (default: "href")
    #[serde(default = "default_child_attribute")]
    pub child_attribute: String,

    /// Page images on episode pages (default: ".image img")
    #[serde(default = "default_asset_selector")]
    pub asset_selector: String,

    /// Attribute holding the image address (default: "data-src")
    #[serde(default = "default_asset_attribute")]
    pub asset_attribute: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            container_selector: default_container_selector(),
            child_selector: default_child_selector(),
            child_attribute: default_child_attribute(),
            asset_selector: default_asset_selector(),
            asset_attribute: default_asset_attribute(),
        }
    }
}

/// Main configuration for the download pipeline
///
/// Sub-configs are flattened for serialization, so a JSON config file is a
/// single flat object:
///
/// ```json
/// { "output_dir": "comics", "concurrency": 8, "base_url": "https://example.com" }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Output and concurrency settings
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// Remote addressing and HTTP client settings
    #[serde(flatten)]
    pub site: SiteConfig,

    /// Document selectors
    #[serde(flatten)]
    pub extraction: ExtractionConfig,
}

impl Config {
    /// Load a configuration from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Check the settings the pipeline cannot run without.
    pub fn validate(&self) -> Result<()> {
        if self.download.concurrency == 0 {
            return Err(config_error("concurrency must be at least 1", "concurrency"));
        }
        if self.download.archive_extension.trim_matches('.').is_empty() {
            return Err(config_error(
                "archive extension must not be empty",
                "archive_extension",
            ));
        }
        if url::Url::parse(&self.site.base_url).is_err() {
            return Err(config_error(
                format!("base URL {:?} is not a valid URL", self.site.base_url),
                "base_url",
            ));
        }
        if self.site.asset_size_segment.is_empty() || self.site.asset_size_segment.contains('/')
        {
            return Err(config_error(
                "asset size segment must be a single path fragment",
                "asset_size_segment",
            ));
        }

        let selectors = [
            ("container_selector", &self.extraction.container_selector),
            ("child_selector", &self.extraction.child_selector),
            ("asset_selector", &self.extraction.asset_selector),
        ];
        for (key, selector) in selectors {
            if scraper::Selector::parse(selector).is_err() {
                return Err(config_error(
                    format!("{:?} is not a valid CSS selector", selector),
                    key,
                ));
            }
        }
        Ok(())
    }

    /// Output root directory
    pub fn output_dir(&self) -> &PathBuf {
        &self.download.output_dir
    }
}

fn config_error(message: impl Into<String>, key: &str) -> Error {
    Error::Config {
        message: message.into(),
        key: Some(key.to_string()),
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_concurrency() -> usize {
    4
}

fn default_archive_extension() -> String {
    "cbz".to_string()
}

fn default_event_buffer() -> usize {
    1024
}

fn default_base_url() -> String {
    "https://comics.8muses.com".to_string()
}

fn default_album_path() -> String {
    "comics/album".to_string()
}

fn default_asset_size_segment() -> String {
    "fl".to_string()
}

fn default_user_agent() -> String {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_container_selector() -> String {
    ".gallery".to_string()
}

fn default_child_selector() -> String {
    "a".to_string()
}

fn default_child_attribute() -> String {
    "href".to_string()
}

fn default_asset_selector() -> String {
    ".image img".to_string()
}

fn default_asset_attribute() -> String {
    "data-src".to_string()
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = Config::default();

        assert_eq!(config.download.concurrency, 4);
        assert_eq!(config.download.archive_extension, "cbz");
        assert_eq!(config.output_dir(), &PathBuf::from("."));
        assert_eq!(config.site.album_path, "comics/album");
        assert_eq!(config.site.asset_size_segment, "fl");
        assert_eq!(config.site.request_timeout, Duration::from_secs(30));
        assert_eq!(config.extraction.asset_attribute, "data-src");
        config.validate().expect("default config must be valid");
    }

    #[test]
    fn test_flat_json_fills_nested_configs_and_defaults() {
        let json = r#"{"output_dir":"out","concurrency":8,"base_url":"http://localhost:9000","request_timeout":5}"#;

        let config: Config = serde_json::from_str(json).expect("deserialize failed");

        assert_eq!(config.download.output_dir, PathBuf::from("out"));
        assert_eq!(config.download.concurrency, 8);
        assert_eq!(config.site.base_url, "http://localhost:9000");
        assert_eq!(config.site.request_timeout, Duration::from_secs(5));
        assert_eq!(
            config.extraction.container_selector, ".gallery",
            "unspecified fields must take their defaults"
        );
    }

    #[test]
    fn test_request_timeout_serializes_as_seconds() {
        let config = Config::default();

        let json = serde_json::to_value(&config).expect("serialize failed");

        assert_eq!(json["request_timeout"], 30);
        assert_eq!(json["archive_extension"], "cbz");
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let mut config = Config::default();
        config.download.concurrency = 0;

        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("concurrency")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_base_url_and_selector_are_rejected() {
        let mut config = Config::default();
        config.site.base_url = "not a url".into();
        assert!(matches!(
            config.validate(),
            Err(Error::Config { key: Some(k), .. }) if k == "base_url"
        ));

        let mut config = Config::default();
        config.extraction.asset_selector = "img[".into();
        assert!(matches!(
            config.validate(),
            Err(Error::Config { key: Some(k), .. }) if k == "asset_selector"
        ));
    }

    #[test]
    fn test_loads_config_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"concurrency":2,"archive_extension":"zip"}"#).unwrap();

        let config = Config::from_json_file(&path).unwrap();

        assert_eq!(config.download.concurrency, 2);
        assert_eq!(config.download.archive_extension, "zip");
    }

    #[test]
    fn test_missing_config_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();

        let result = Config::from_json_file(&dir.path().join("absent.json"));

        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
