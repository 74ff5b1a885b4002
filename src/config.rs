//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub site: SiteConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Hosted backend connection
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_url")]
    pub url: String,

    /// Anonymous (public) API key sent with every request
    #[serde(default)]
    pub anon_key: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_backend_url() -> String {
    "http://localhost:54321".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            anon_key: String::new(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Media upload settings
#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Bucket holding recorded voice answers
    #[serde(default = "default_voice_bucket")]
    pub voice_bucket: String,

    #[serde(default = "default_cache_control")]
    pub cache_control_secs: u64,

    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,

    #[serde(default = "default_max_audio_bytes")]
    pub max_audio_bytes: u64,

    /// Inline media as data URLs when the bucket is unavailable
    #[serde(default)]
    pub inline_fallback: bool,
}

fn default_bucket() -> String {
    "media".to_string()
}

fn default_voice_bucket() -> String {
    "audio-answers".to_string()
}

fn default_cache_control() -> u64 {
    3600
}

fn default_max_image_bytes() -> u64 {
    5 * 1024 * 1024 // 5 MB
}

fn default_max_audio_bytes() -> u64 {
    10 * 1024 * 1024 // 10 MB
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            voice_bucket: default_voice_bucket(),
            cache_control_secs: default_cache_control(),
            max_image_bytes: default_max_image_bytes(),
            max_audio_bytes: default_max_audio_bytes(),
            inline_fallback: false,
        }
    }
}

/// Client-local persistent storage
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("rytup").to_string_lossy().to_string())
        .unwrap_or_else(|| "./rytup_data".to_string())
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Public site settings used for share links and page metadata
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_site_url")]
    pub base_url: String,

    #[serde(default = "default_site_image")]
    pub default_image: String,
}

fn default_site_url() -> String {
    "https://rytup.vercel.app".to_string()
}

fn default_site_image() -> String {
    "https://rytup.vercel.app/og-image.png".to_string()
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_site_url(),
            default_image: default_site_image(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("rytup").join("config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::debug!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Path of the client-local key/value file
    pub fn local_storage_path(&self) -> PathBuf {
        PathBuf::from(&self.identity.data_dir).join("local_storage.json")
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("RYTUP_BACKEND_URL") {
            self.backend.url = url;
        }
        if let Ok(key) = std::env::var("RYTUP_ANON_KEY") {
            self.backend.anon_key = key;
        }

        if let Ok(data_dir) = std::env::var("RYTUP_DATA_DIR") {
            self.identity.data_dir = data_dir;
        }

        if let Ok(site) = std::env::var("RYTUP_SITE_URL") {
            self.site.base_url = site;
        }

        if let Ok(level) = std::env::var("RYTUP_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("RYTUP_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# RytUp Configuration
#
# Environment variables override these settings:
# - RYTUP_BACKEND_URL
# - RYTUP_ANON_KEY
# - RYTUP_DATA_DIR
# - RYTUP_SITE_URL
# - RYTUP_LOG_LEVEL
# - RYTUP_LOG_FORMAT

[backend]
# Project URL of the hosted backend
url = "http://localhost:54321"

# Anonymous public API key
anon_key = ""

# Request timeout in seconds
request_timeout_secs = 30

[media]
# Bucket for post images and audio
bucket = "media"

# Bucket for recorded voice answers
voice_bucket = "audio-answers"

# Cache-Control max-age for uploaded objects (seconds)
cache_control_secs = 3600

# Client-side size limits (bytes)
max_image_bytes = 5242880
max_audio_bytes = 10485760

# Store media inline as data URLs when the bucket is unavailable
inline_fallback = false

[identity]
# Directory holding the local key/value store (nickname)
# Defaults to the platform data directory, e.g. ~/.local/share/rytup
# data_dir = "/var/lib/rytup"

[site]
# Public site used for share links and link previews
base_url = "https://rytup.vercel.app"
default_image = "https://rytup.vercel.app/og-image.png"

[logging]
# Log level: trace, debug, info, warn, error
level = "warn"

# Log format: pretty or json
format = "pretty"
"#
    .to_string()
}
