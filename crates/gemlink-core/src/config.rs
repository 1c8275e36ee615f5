//! Configuration management for gemlink.
//!
//! Loads configuration from ${GEMLINK_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::relay::{DEFAULT_BASE_URL, RelayConfig};

const DEFAULT_CONFIG_TEMPLATE: &str = r#"# gemlink configuration

# Model used when a command does not pass --model
model = "gemini-2.5-flash"

# Page opened by the status panel's manual sign-in control
manual_login_url = "https://aistudio.google.com/"

[relay]
# API root (GEMINI_BASE_URL overrides this)
# base_url = "https://generativelanguage.googleapis.com/v1beta"

# API key (falls back to GEMINI_API_KEY)
# api_key = ""

# Client-side request timeout in seconds (0 disables)
timeout_secs = 0

[log]
# Also write logs to this file
# file = "/tmp/gemlink.log"

# Filter used when RUST_LOG is unset
# filter = "gemlink=info"
"#;

pub mod paths {
    //! Path resolution for gemlink configuration.
    //!
    //! GEMLINK_HOME resolution order:
    //! 1. GEMLINK_HOME environment variable (if set)
    //! 2. ~/.config/gemlink (default)

    use std::path::PathBuf;

    /// Returns the gemlink home directory.
    ///
    /// Checks GEMLINK_HOME env var first, falls back to ~/.config/gemlink,
    /// then to ./.gemlink when no home directory is known.
    pub fn gemlink_home() -> PathBuf {
        if let Ok(home) = std::env::var("GEMLINK_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".gemlink"),
            |h| h.join(".config").join("gemlink"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        gemlink_home().join("config.toml")
    }
}

/// Relay section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySection {
    /// API root override
    pub base_url: Option<String>,
    /// API key (falls back to `GEMINI_API_KEY`)
    pub api_key: Option<String>,
    /// Client-side timeout in seconds (0 disables)
    pub timeout_secs: u64,
}

/// Logging section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Optional log file, in addition to stderr
    pub file: Option<PathBuf>,
    /// Filter directive used when `RUST_LOG` is unset
    pub filter: Option<String>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default model (relay target)
    pub model: String,
    /// Page opened by the manual recovery action
    pub manual_login_url: String,
    pub relay: RelaySection,
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: Self::DEFAULT_MODEL.to_string(),
            manual_login_url: Self::DEFAULT_MANUAL_LOGIN_URL.to_string(),
            relay: RelaySection::default(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    pub const DEFAULT_MODEL: &'static str = "gemini-2.5-flash";
    pub const DEFAULT_MANUAL_LOGIN_URL: &'static str = "https://aistudio.google.com/";

    /// Loads configuration from the default path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Writes the default template to `path`, creating parent directories.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, DEFAULT_CONFIG_TEMPLATE)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Builds the relay configuration.
    ///
    /// Base URL precedence: `GEMINI_BASE_URL` > config > default.
    ///
    /// # Errors
    /// Returns an error if the chosen base URL is not a valid URL.
    pub fn relay_config(&self) -> Result<RelayConfig> {
        let base_url = resolve_base_url(
            self.relay.base_url.as_deref(),
            "GEMINI_BASE_URL",
            DEFAULT_BASE_URL,
        )?;
        let timeout =
            (self.relay.timeout_secs > 0).then(|| Duration::from_secs(self.relay.timeout_secs));
        Ok(RelayConfig { base_url, timeout })
    }
}

/// Resolves a base URL with precedence: env > config > default.
///
/// # Errors
/// Returns an error if the env or config value is not a valid URL.
pub fn resolve_base_url(
    config_base_url: Option<&str>,
    env_var: &str,
    default_url: &str,
) -> Result<String> {
    if let Ok(env_url) = std::env::var(env_var) {
        let trimmed = env_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed)?;
            return Ok(trimmed.to_string());
        }
    }

    if let Some(config_url) = config_base_url {
        let trimmed = config_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed)?;
            return Ok(trimmed.to_string());
        }
    }

    Ok(default_url.to_string())
}

fn validate_url(url: &str) -> Result<()> {
    url::Url::parse(url).with_context(|| format!("Invalid relay base URL: {url}"))?;
    Ok(())
}
