//! Configuration file parser for ~/.config/eventpoll/config.toml.
//!
//! The config file is optional — a missing file yields `Config::default()`
//! (no sources; the CLI then needs `--url`). Unknown keys are accepted but
//! logged as warnings.
use crate::feed::{FeedPayload, PayloadError};
use crate::scheduler::FetchSource;
use crate::util::{validate_endpoint, UrlValidationError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid source URL '{url}': {source}")]
    InvalidSource {
        url: String,
        #[source]
        source: UrlValidationError,
    },

    #[error("Failed to load fallback data '{}': {source}", path.display())]
    Fallback {
        path: PathBuf,
        #[source]
        source: PayloadError,
    },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upper bound for a whole request, body included.
    pub request_timeout_secs: u64,

    /// Whether loopback/private hosts are valid endpoints.
    pub allow_private_hosts: bool,

    pub sources: Vec<SourceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            allow_private_hosts: true,
            sources: Vec::new(),
        }
    }
}

/// One `[[sources]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceConfig {
    pub url: String,

    /// Milliseconds between cycles; values under 1000 are raised to 1000.
    #[serde(default = "SourceConfig::default_reload_interval_ms")]
    pub reload_interval_ms: u64,

    /// JSON array of centers served when the endpoint refuses connections.
    /// Relative paths resolve against the working directory.
    #[serde(default)]
    pub fallback_file: Option<PathBuf>,
}

impl SourceConfig {
    pub const DEFAULT_RELOAD_INTERVAL_MS: u64 = 5 * 60 * 1000;

    fn default_reload_interval_ms() -> u64 {
        Self::DEFAULT_RELOAD_INTERVAL_MS
    }

    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reload_interval_ms: Self::DEFAULT_RELOAD_INTERVAL_MS,
            fallback_file: None,
        }
    }

    pub fn fetch_source(&self) -> FetchSource {
        FetchSource::new(&self.url, Duration::from_millis(self.reload_interval_ms))
    }

    pub fn load_fallback(&self) -> Result<Option<FeedPayload>, ConfigError> {
        let Some(path) = &self.fallback_file else {
            return Ok(None);
        };
        FeedPayload::from_file(path)
            .map(Some)
            .map_err(|source| ConfigError::Fallback {
                path: path.clone(),
                source,
            })
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 3] = ["request_timeout_secs", "allow_private_hosts", "sources"];

    const SOURCE_KEYS: [&'static str; 3] = ["url", "reload_interval_ms", "fallback_file"];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in Self::unknown_keys(&raw) {
                tracing::warn!(key = %key, "Unknown key in config file, ignoring");
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            sources = config.sources.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Keys serde would silently drop, top-level and per `[[sources]]` entry.
    fn unknown_keys(raw: &toml::Table) -> Vec<String> {
        let mut unknown: Vec<String> = raw
            .keys()
            .filter(|key| !Self::KNOWN_KEYS.contains(&key.as_str()))
            .cloned()
            .collect();

        if let Some(sources) = raw.get("sources").and_then(toml::Value::as_array) {
            for (i, source) in sources.iter().enumerate() {
                let Some(table) = source.as_table() else {
                    continue;
                };
                unknown.extend(
                    table
                        .keys()
                        .filter(|key| !Self::SOURCE_KEYS.contains(&key.as_str()))
                        .map(|key| format!("sources[{i}].{key}")),
                );
            }
        }
        unknown
    }

    /// Checks every source URL against the host policy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for source in &self.sources {
            validate_endpoint(&source.url, self.allow_private_hosts).map_err(|e| {
                ConfigError::InvalidSource {
                    url: source.url.clone(),
                    source: e,
                }
            })?;
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_config(name: &str, content: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("eventpoll_config_test_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.request_timeout_secs, 30);
        assert!(config.allow_private_hosts);
        assert!(config.sources.is_empty());
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/eventpoll_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert!(config.sources.is_empty());
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let (dir, path) = write_config("whitespace", "   \n  \n  ");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.request_timeout_secs, 30);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let content = r#"
request_timeout_secs = 10
allow_private_hosts = false

[[sources]]
url = "https://events.example.com/api"
reload_interval_ms = 60000
fallback_file = "data.json"

[[sources]]
url = "https://other.example.com/api"
"#;
        let (dir, path) = write_config("full", content);

        let config = Config::load(&path).unwrap();
        assert_eq!(config.request_timeout_secs, 10);
        assert!(!config.allow_private_hosts);
        assert_eq!(
            config.sources,
            vec![
                SourceConfig {
                    url: "https://events.example.com/api".into(),
                    reload_interval_ms: 60000,
                    fallback_file: Some(PathBuf::from("data.json")),
                },
                SourceConfig::new("https://other.example.com/api"),
            ]
        );
        assert!(config.validate().is_ok());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (dir, path) = write_config("invalid", "this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_source_without_url_is_error() {
        let (dir, path) = write_config("no_url", "[[sources]]\nreload_interval_ms = 5000\n");
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let (dir, path) = write_config("unknown", "request_timeout_secs = 5\ntheme = \"dark\"\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.request_timeout_secs, 5);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_misspelled_source_key_keeps_default() {
        let content = "[[sources]]\nurl = \"http://feed\"\nreload_interval = 5000\n";
        let (dir, path) = write_config("misspelled_source_key", content);

        let config = Config::load(&path).unwrap();
        assert_eq!(config.sources, vec![SourceConfig::new("http://feed")]);

        let raw: toml::Table = content.parse().unwrap();
        assert_eq!(
            Config::unknown_keys(&raw),
            vec!["sources[0].reload_interval".to_string()]
        );
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_reports_both_levels() {
        let raw: toml::Table = r#"
theme = "dark"
request_timeout_secs = 5

[[sources]]
url = "http://a"

[[sources]]
url = "http://b"
fallback = "data.json"
"#
        .parse()
        .unwrap();
        assert_eq!(
            Config::unknown_keys(&raw),
            vec!["theme".to_string(), "sources[1].fallback".to_string()]
        );
    }

    #[test]
    fn test_too_large_file_rejected() {
        let (dir, path) = write_config("too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_validate_rejects_bad_scheme() {
        let config = Config {
            sources: vec![SourceConfig::new("ftp://events.example.com")],
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSource { .. }));
        assert!(err.to_string().contains("ftp://events.example.com"));
    }

    #[test]
    fn test_validate_applies_private_host_policy() {
        let mut config = Config {
            sources: vec![SourceConfig::new("http://localhost:8080/events")],
            ..Config::default()
        };
        assert!(config.validate().is_ok());
        config.allow_private_hosts = false;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fetch_source_clamps_interval() {
        let source = SourceConfig {
            reload_interval_ms: 10,
            ..SourceConfig::new("http://feed")
        };
        let fetch_source = source.fetch_source();
        assert_eq!(fetch_source.url(), "http://feed");
        assert_eq!(fetch_source.reload_interval(), Duration::from_millis(1000));
    }

    #[test]
    fn test_load_fallback() {
        let dir = std::env::temp_dir().join("eventpoll_config_test_fallback");
        std::fs::create_dir_all(&dir).unwrap();
        let data = dir.join("data.json");
        std::fs::write(&data, r#"[{"center_city": "X", "center_name": "Y"}]"#).unwrap();

        let mut source = SourceConfig::new("http://feed");
        assert!(source.load_fallback().unwrap().is_none());

        source.fallback_file = Some(data);
        let payload = source.load_fallback().unwrap().unwrap();
        assert_eq!(payload.centers.len(), 1);

        source.fallback_file = Some(dir.join("missing.json"));
        assert!(matches!(
            source.load_fallback(),
            Err(ConfigError::Fallback { .. })
        ));

        std::fs::remove_dir_all(&dir).ok();
    }
}
