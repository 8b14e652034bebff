//! Settings file parser (`feedhub.toml` by default).
//!
//! The settings file is optional: a missing or empty file yields
//! `Settings::default()`, and any subset of keys may be given.
//! Unknown keys are accepted but logged, since they are usually typos.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::feed::{RetryPolicy, DEFAULT_USER_AGENT};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in settings file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Settings file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Settings Structs
// ============================================================================

/// Top-level settings passed by reference through the pipeline.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub site_title: String,
    pub site_description: String,
    pub site_link: String,
    pub generator: String,
    /// Minimum hours between two runs; also shown on the dashboard
    pub update_interval_hours: u64,
    /// JSON file recording when the last successful run finished
    pub last_run_file: String,
    pub output_files: OutputFiles,
    pub max_entries: MaxEntries,
    pub fetch: FetchSettings,
    pub ui: UiSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            site_title: "feedhub".to_string(),
            site_description: "Latest posts from my subscriptions".to_string(),
            site_link: String::new(),
            generator: concat!("feedhub/", env!("CARGO_PKG_VERSION")).to_string(),
            update_interval_hours: 6,
            last_run_file: "last_run.json".to_string(),
            output_files: OutputFiles::default(),
            max_entries: MaxEntries::default(),
            fetch: FetchSettings::default(),
            ui: UiSettings::default(),
        }
    }
}

/// Output path of each generated artifact, relative to the output directory.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutputFiles {
    /// Merged latest-posts RSS feed
    pub rss: String,
    /// Feed directory RSS feed
    pub feeds: String,
    /// JSON Feed of latest posts
    pub json: String,
    /// HTML dashboard
    pub html: String,
}

impl Default for OutputFiles {
    fn default() -> Self {
        Self {
            rss: "latest.xml".to_string(),
            feeds: "feeds.xml".to_string(),
            json: "latest.json".to_string(),
            html: "index.html".to_string(),
        }
    }
}

/// Per-artifact caps on the number of entries emitted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MaxEntries {
    pub rss: usize,
    pub json: usize,
    pub html: usize,
}

impl Default for MaxEntries {
    fn default() -> Self {
        Self {
            rss: 50,
            json: 50,
            html: 100,
        }
    }
}

/// Network behaviour of the fetcher.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub timeout_secs: u64,
    pub max_attempts: u32,
    /// Delay before the first retry, doubled per further retry. 0 disables.
    pub retry_backoff_ms: u64,
    /// Feeds fetched at once. Output order does not depend on it.
    pub concurrency: usize,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_attempts: 3,
            retry_backoff_ms: 500,
            concurrency: 4,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl FetchSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_secs(self.timeout_secs),
            max_attempts: self.max_attempts,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    /// Category navigation as a horizontal bar instead of a sidebar
    pub horizontal_menu: bool,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            horizontal_menu: true,
        }
    }
}

impl Settings {
    /// Maximum settings file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 10] = [
        "site_title",
        "site_description",
        "site_link",
        "generator",
        "update_interval_hours",
        "last_run_file",
        "output_files",
        "max_entries",
        "fetch",
        "ui",
    ];

    /// Load settings from a TOML file.
    ///
    /// - Missing file → `Ok(Settings::default())`
    /// - Empty file → `Ok(Settings::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown top-level keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Settings file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No settings file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Settings file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::from_toml_str(&content)
    }

    /// Parses settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!("Settings file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in settings file, ignoring");
                }
            }
        }

        let settings: Settings = toml::from_str(content)?;
        tracing::debug!(site_title = %settings.site_title, "Loaded settings");
        Ok(settings)
    }

    /// Raw OPML download link for sites hosted on GitHub, else `None`.
    ///
    /// `https://github.com/me/feeds` maps to
    /// `https://raw.githubusercontent.com/me/feeds/main/feeds.opml`.
    pub fn opml_export_url(&self) -> Option<String> {
        if !self.site_link.contains("github.com") {
            return None;
        }
        let raw = self
            .site_link
            .trim_end_matches('/')
            .replace("github.com", "raw.githubusercontent.com");
        Some(format!("{raw}/main/feeds.opml"))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.update_interval_hours, 6);
        assert_eq!(settings.output_files.rss, "latest.xml");
        assert_eq!(settings.max_entries.rss, 50);
        assert_eq!(settings.fetch.max_attempts, 3);
        assert!(settings.ui.horizontal_menu);
        assert!(settings.fetch.user_agent.starts_with("feedhub/"));
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/feedhub_test_nonexistent_settings.toml");
        let settings = Settings::load(path).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_empty_and_whitespace_return_default() {
        assert_eq!(Settings::from_toml_str("").unwrap(), Settings::default());
        assert_eq!(
            Settings::from_toml_str("   \n  \n  ").unwrap(),
            Settings::default()
        );
    }

    #[test]
    fn test_partial_settings_use_defaults_for_missing() {
        let settings = Settings::from_toml_str(
            r#"
site_title = "My Hub"

[max_entries]
rss = 10
"#,
        )
        .unwrap();
        assert_eq!(settings.site_title, "My Hub");
        assert_eq!(settings.max_entries.rss, 10);
        assert_eq!(settings.max_entries.html, 100); // default
        assert_eq!(settings.output_files, OutputFiles::default());
    }

    #[test]
    fn test_full_settings() {
        let content = r#"
site_title = "Test Site"
site_description = "Test Description"
site_link = "http://example.com"
generator = "TestGenerator/1.0"
update_interval_hours = 12
last_run_file = "state/last.json"

[output_files]
rss = "test_rss.xml"
feeds = "test_feeds.xml"
json = "test_posts.json"
html = "test_index.html"

[max_entries]
rss = 1
json = 1
html = 1

[fetch]
timeout_secs = 20
max_attempts = 5
retry_backoff_ms = 0
concurrency = 1
user_agent = "custom/1.0"

[ui]
horizontal_menu = false
"#;
        let settings = Settings::from_toml_str(content).unwrap();
        assert_eq!(settings.site_title, "Test Site");
        assert_eq!(settings.generator, "TestGenerator/1.0");
        assert_eq!(settings.update_interval_hours, 12);
        assert_eq!(settings.last_run_file, "state/last.json");
        assert_eq!(settings.output_files.html, "test_index.html");
        assert_eq!(settings.max_entries.json, 1);
        assert_eq!(settings.fetch.user_agent, "custom/1.0");
        assert!(!settings.ui.horizontal_menu);

        let policy = settings.fetch.retry_policy();
        assert_eq!(policy.timeout, Duration::from_secs(20));
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.backoff, Duration::ZERO);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let err = Settings::from_toml_str("this is not [valid toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_wrong_type_returns_error() {
        assert!(Settings::from_toml_str("site_title = 42\n").is_err());
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let settings =
            Settings::from_toml_str("site_title = \"x\"\ntotally_fake_key = 1\n").unwrap();
        assert_eq!(settings.site_title, "x");
    }

    #[test]
    fn test_load_from_file() {
        let dir = std::env::temp_dir().join("feedhub_settings_test_load");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("feedhub.toml");
        std::fs::write(&path, "site_title = \"From File\"\n").unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.site_title, "From File");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("feedhub_settings_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("feedhub.toml");
        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = Settings::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_opml_export_url() {
        let mut settings = Settings::default();
        assert_eq!(settings.opml_export_url(), None);

        settings.site_link = "https://github.com/me/feeds".to_string();
        assert_eq!(
            settings.opml_export_url().as_deref(),
            Some("https://raw.githubusercontent.com/me/feeds/main/feeds.opml")
        );
    }
}
