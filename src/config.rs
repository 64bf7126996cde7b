//! Configuration file parser for ~/.config/feedtree/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde, but we log a warning for each so typos
//! do not go unnoticed.
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::model::{MessageHighlighter, DEFAULT_AUTO_UPDATE_INTERVAL};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Whether feeds on the default policy are updated automatically.
    pub auto_update_enabled: bool,

    /// Global auto-update interval, in timer ticks.
    pub auto_update_interval: i64,

    /// Length of one timer tick in seconds.
    pub auto_update_tick_seconds: u64,

    /// Whether message dates use `custom_date_format`.
    pub use_custom_date: bool,

    /// strftime pattern for message dates, e.g. `"%d.%m.%Y %H:%M"`.
    pub custom_date_format: String,

    /// Which messages are drawn highlighted: "none", "important" or "unread".
    pub message_highlight: MessageHighlighter,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auto_update_enabled: false,
            auto_update_interval: DEFAULT_AUTO_UPDATE_INTERVAL,
            auto_update_tick_seconds: 60,
            use_custom_date: false,
            custom_date_format: String::new(),
            message_highlight: MessageHighlighter::NoHighlighting,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 6] = [
        "auto_update_enabled",
        "auto_update_interval",
        "auto_update_tick_seconds",
        "use_custom_date",
        "custom_date_format",
        "message_highlight",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check the size before reading so a huge file is never loaded
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
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            auto_update = config.auto_update_enabled,
            "Loaded configuration"
        );
        Ok(config)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(name: &str, content: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(name);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    fn cleanup(path: &Path) {
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.auto_update_enabled);
        assert_eq!(config.auto_update_interval, 15);
        assert_eq!(config.auto_update_tick_seconds, 60);
        assert!(!config.use_custom_date);
        assert_eq!(config.message_highlight, MessageHighlighter::NoHighlighting);
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/feedtree_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.auto_update_interval, 15);
    }

    #[test]
    fn test_empty_file_returns_default() {
        let path = write_config("feedtree_config_test_empty", "   \n  \n");
        let config = Config::load(&path).unwrap();
        assert!(!config.auto_update_enabled);
        cleanup(&path);
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let path = write_config("feedtree_config_test_partial", "auto_update_enabled = true\n");
        let config = Config::load(&path).unwrap();
        assert!(config.auto_update_enabled);
        assert_eq!(config.auto_update_interval, 15);
        cleanup(&path);
    }

    #[test]
    fn test_full_config() {
        let content = r#"
auto_update_enabled = true
auto_update_interval = 30
auto_update_tick_seconds = 10
use_custom_date = true
custom_date_format = "%d.%m.%Y"
message_highlight = "important"
"#;
        let path = write_config("feedtree_config_test_full", content);

        let config = Config::load(&path).unwrap();
        assert!(config.auto_update_enabled);
        assert_eq!(config.auto_update_interval, 30);
        assert_eq!(config.auto_update_tick_seconds, 10);
        assert!(config.use_custom_date);
        assert_eq!(config.custom_date_format, "%d.%m.%Y");
        assert_eq!(config.message_highlight, MessageHighlighter::HighlightImportant);
        cleanup(&path);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let path = write_config("feedtree_config_test_invalid", "this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
        cleanup(&path);
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let path = write_config(
            "feedtree_config_test_unknown",
            "auto_update_enabled = true\ntotally_fake_key = 42\n",
        );
        let config = Config::load(&path).unwrap();
        assert!(config.auto_update_enabled);
        cleanup(&path);
    }

    #[test]
    fn test_unknown_highlight_mode_rejected() {
        let path = write_config(
            "feedtree_config_test_highlight",
            "message_highlight = \"sparkly\"\n",
        );
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
        cleanup(&path);
    }

    #[test]
    fn test_too_large_file_rejected() {
        let path = write_config("feedtree_config_test_too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
        cleanup(&path);
    }
}
