//! Configuration management for Westline
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::chat::quota::QuotaLimits;
use crate::error::{Result, WestlineError};
use crate::models::Aura;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for Westline
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// AI gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Storage location
    #[serde(default)]
    pub storage: StorageConfig,

    /// Session behavior
    #[serde(default)]
    pub session: SessionConfig,

    /// Image usage limits and gallery size
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Premium unlock settings
    #[serde(default)]
    pub premium: PremiumConfig,

    /// Chat behavior
    #[serde(default)]
    pub chat: ChatConfig,

    /// Logging output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// AI gateway configuration
///
/// Specifies which gateway to use and its settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Type of gateway to use
    #[serde(rename = "type", default = "default_gateway_type")]
    pub gateway_type: String,

    /// Gemini API configuration
    #[serde(default)]
    pub gemini: GeminiConfig,
}

fn default_gateway_type() -> String {
    "gemini".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            gateway_type: default_gateway_type(),
            gemini: GeminiConfig::default(),
        }
    }
}

/// Gemini API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API base URL (overridable for tests and proxies)
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// API key; when absent the environment and OS keyring are consulted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Chat model for standard accounts
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Chat model for premium accounts
    #[serde(default = "default_premium_chat_model")]
    pub premium_chat_model: String,

    /// Model for titles and prompt suggestions
    #[serde(default = "default_utility_model")]
    pub utility_model: String,

    /// Image generation and editing model
    #[serde(default = "default_image_model")]
    pub image_model: String,

    /// Text-to-speech model
    #[serde(default = "default_speech_model")]
    pub speech_model: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_chat_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_premium_chat_model() -> String {
    "gemini-3-pro-preview".to_string()
}

fn default_utility_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_image_model() -> String {
    "gemini-2.5-flash-image".to_string()
}

fn default_speech_model() -> String {
    "gemini-2.5-flash-preview-tts".to_string()
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: None,
            chat_model: default_chat_model(),
            premium_chat_model: default_premium_chat_model(),
            utility_model: default_utility_model(),
            image_model: default_image_model(),
            speech_model: default_speech_model(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Database file; defaults to the user data directory
    #[serde(default)]
    pub path: Option<String>,
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How long the splash screen is shown before routing (milliseconds)
    #[serde(default = "default_splash_delay_ms")]
    pub splash_delay_ms: u64,
}

fn default_splash_delay_ms() -> u64 {
    2000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            splash_delay_ms: default_splash_delay_ms(),
        }
    }
}

/// Image usage limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Generations (and, separately, edits) allowed per window
    #[serde(default = "default_max_actions")]
    pub max_actions_per_window: u32,

    /// Window length in hours
    #[serde(default = "default_window_hours")]
    pub window_hours: u32,

    /// Images kept per gallery
    #[serde(default = "default_gallery_capacity")]
    pub gallery_capacity: usize,
}

fn default_max_actions() -> u32 {
    crate::chat::quota::DEFAULT_MAX_PER_WINDOW
}

fn default_window_hours() -> u32 {
    crate::chat::quota::DEFAULT_WINDOW_HOURS as u32
}

fn default_gallery_capacity() -> usize {
    crate::chat::gallery::DEFAULT_GALLERY_CAPACITY
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_actions_per_window: default_max_actions(),
            window_hours: default_window_hours(),
            gallery_capacity: default_gallery_capacity(),
        }
    }
}

impl LimitsConfig {
    /// Quota limits for the usage limiter
    pub fn quota_limits(&self) -> QuotaLimits {
        QuotaLimits {
            max_per_window: self.max_actions_per_window,
            window: chrono::Duration::hours(i64::from(self.window_hours)),
        }
    }
}

/// Premium unlock configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PremiumConfig {
    /// Access code that unlocks premium
    #[serde(default = "default_access_code")]
    pub access_code: String,
}

fn default_access_code() -> String {
    "WESTLINEPRO".to_string()
}

impl Default for PremiumConfig {
    fn default() -> Self {
        Self {
            access_code: default_access_code(),
        }
    }
}

/// Chat behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Aura applied at startup
    #[serde(default)]
    pub default_aura: Aura,

    /// Non-premium sends suggest premium once history is longer than this
    #[serde(default = "default_premium_nudge_after")]
    pub premium_nudge_after: usize,
}

fn default_premium_nudge_after() -> usize {
    2
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_aura: Aura::Off,
            premium_nudge_after: default_premium_nudge_after(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of human-readable ones
    #[serde(default)]
    pub json: bool,
}

impl Config {
    /// Load configuration from file with environment variable overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded configuration
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| WestlineError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| WestlineError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(gateway_type) = std::env::var("WESTLINE_GATEWAY") {
            self.gateway.gateway_type = gateway_type;
        }

        if let Ok(api_base) = std::env::var("WESTLINE_API_BASE") {
            self.gateway.gemini.api_base = api_base;
        }

        if let Ok(model) = std::env::var("WESTLINE_CHAT_MODEL") {
            self.gateway.gemini.chat_model = model;
        }

        if let Ok(model) = std::env::var("WESTLINE_PREMIUM_CHAT_MODEL") {
            self.gateway.gemini.premium_chat_model = model;
        }

        if let Ok(model) = std::env::var("WESTLINE_IMAGE_MODEL") {
            self.gateway.gemini.image_model = model;
        }

        if let Ok(model) = std::env::var("WESTLINE_SPEECH_MODEL") {
            self.gateway.gemini.speech_model = model;
        }

        if let Ok(timeout) = std::env::var("WESTLINE_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.gateway.gemini.request_timeout_seconds = value;
            } else {
                tracing::warn!("Invalid WESTLINE_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(delay) = std::env::var("WESTLINE_SPLASH_DELAY_MS") {
            if let Ok(value) = delay.parse() {
                self.session.splash_delay_ms = value;
            } else {
                tracing::warn!("Invalid WESTLINE_SPLASH_DELAY_MS: {}", delay);
            }
        }

        if let Ok(max) = std::env::var("WESTLINE_MAX_ACTIONS_PER_WINDOW") {
            if let Ok(value) = max.parse() {
                self.limits.max_actions_per_window = value;
            } else {
                tracing::warn!("Invalid WESTLINE_MAX_ACTIONS_PER_WINDOW: {}", max);
            }
        }

        if let Ok(hours) = std::env::var("WESTLINE_WINDOW_HOURS") {
            if let Ok(value) = hours.parse() {
                self.limits.window_hours = value;
            } else {
                tracing::warn!("Invalid WESTLINE_WINDOW_HOURS: {}", hours);
            }
        }

        if let Ok(aura) = std::env::var("WESTLINE_DEFAULT_AURA") {
            match Aura::parse_str(&aura) {
                Ok(value) => self.chat.default_aura = value,
                Err(_) => tracing::warn!("Invalid WESTLINE_DEFAULT_AURA: {}, using default", aura),
            }
        }

        if let Ok(json_logs) = std::env::var("WESTLINE_LOG_JSON") {
            match json_logs.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.logging.json = true,
                "0" | "false" | "no" => self.logging.json = false,
                _ => tracing::warn!("Invalid value for WESTLINE_LOG_JSON: {}", json_logs),
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(path) = &cli.storage_path {
            self.storage.path = Some(path.clone());
        }
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }
    }

    /// Validate the configuration
    ///
    /// Ensures all configuration values are within acceptable ranges
    /// and that required fields are properly set.
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        let valid_gateways = ["gemini"];
        if !valid_gateways.contains(&self.gateway.gateway_type.as_str()) {
            return Err(WestlineError::Config(format!(
                "Invalid gateway type: {}. Must be one of: {}",
                self.gateway.gateway_type,
                valid_gateways.join(", ")
            ))
            .into());
        }

        let gemini = &self.gateway.gemini;
        let base = url::Url::parse(&gemini.api_base).map_err(|e| {
            WestlineError::Config(format!("Invalid api_base {}: {}", gemini.api_base, e))
        })?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(WestlineError::Config(format!(
                "api_base must use http or https, got {}",
                base.scheme()
            ))
            .into());
        }

        for (name, model) in [
            ("chat_model", &gemini.chat_model),
            ("premium_chat_model", &gemini.premium_chat_model),
            ("utility_model", &gemini.utility_model),
            ("image_model", &gemini.image_model),
            ("speech_model", &gemini.speech_model),
        ] {
            if model.trim().is_empty() {
                return Err(WestlineError::Config(format!("{} cannot be empty", name)).into());
            }
        }

        if gemini.request_timeout_seconds == 0 {
            return Err(WestlineError::Config(
                "request_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.session.splash_delay_ms > 10_000 {
            return Err(WestlineError::Config(
                "session.splash_delay_ms must be less than or equal to 10000".to_string(),
            )
            .into());
        }

        if self.limits.max_actions_per_window == 0 {
            return Err(WestlineError::Config(
                "limits.max_actions_per_window must be greater than 0".to_string(),
            )
            .into());
        }

        if self.limits.window_hours == 0 || self.limits.window_hours > 24 * 7 {
            return Err(WestlineError::Config(
                "limits.window_hours must be between 1 and 168".to_string(),
            )
            .into());
        }

        if self.limits.gallery_capacity == 0 || self.limits.gallery_capacity > 500 {
            return Err(WestlineError::Config(
                "limits.gallery_capacity must be between 1 and 500".to_string(),
            )
            .into());
        }

        if self.premium.access_code.trim().is_empty() {
            return Err(
                WestlineError::Config("premium.access_code cannot be empty".to_string()).into(),
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.gateway.gateway_type, "gemini");
        assert_eq!(config.gateway.gemini.chat_model, "gemini-2.5-flash");
        assert_eq!(
            config.gateway.gemini.premium_chat_model,
            "gemini-3-pro-preview"
        );
        assert_eq!(config.session.splash_delay_ms, 2000);
        assert_eq!(config.limits.max_actions_per_window, 6);
        assert_eq!(config.limits.window_hours, 6);
        assert_eq!(config.limits.gallery_capacity, 50);
        assert_eq!(config.premium.access_code, "WESTLINEPRO");
    }

    #[test]
    fn test_config_validation_success() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_gateway() {
        let mut config = Config::default();
        config.gateway.gateway_type = "openai".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bad_api_base() {
        let mut config = Config::default();
        config.gateway.gemini.api_base = "not a url".to_string();
        assert!(config.validate().is_err());

        config.gateway.gemini.api_base = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_empty_model() {
        let mut config = Config::default();
        config.gateway.gemini.image_model = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_limits() {
        let mut config = Config::default();
        config.limits.max_actions_per_window = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.limits.window_hours = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.limits.gallery_capacity = 501;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_partial_yaml_fills_defaults() {
        let yaml = r#"
gateway:
  type: gemini
  gemini:
    chat_model: custom-model
limits:
  max_actions_per_window: 3
chat:
  default_aura: Ice Drip
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.gateway.gemini.chat_model, "custom-model");
        assert_eq!(config.gateway.gemini.image_model, "gemini-2.5-flash-image");
        assert_eq!(config.limits.max_actions_per_window, 3);
        assert_eq!(config.limits.window_hours, 6);
        assert_eq!(config.chat.default_aura, Aura::IceDrip);
    }

    #[test]
    fn test_quota_limits_from_config() {
        let mut limits = LimitsConfig::default();
        limits.window_hours = 2;
        limits.max_actions_per_window = 4;
        let quota = limits.quota_limits();
        assert_eq!(quota.max_per_window, 4);
        assert_eq!(quota.window, chrono::Duration::hours(2));
    }

    #[test]
    #[serial]
    fn test_load_missing_file_uses_defaults_and_cli_storage() {
        let cli = crate::cli::Cli {
            storage_path: Some("/tmp/westline-test.db".to_string()),
            ..Default::default()
        };
        let config = Config::load("/nonexistent/westline.yaml", &cli).unwrap();
        assert_eq!(config.storage.path.as_deref(), Some("/tmp/westline-test.db"));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var("WESTLINE_CHAT_MODEL", "env-model");
        std::env::set_var("WESTLINE_WINDOW_HOURS", "not-a-number");
        std::env::set_var("WESTLINE_DEFAULT_AURA", "rain");

        let config = Config::load("/nonexistent/westline.yaml", &crate::cli::Cli::default()).unwrap();
        assert_eq!(config.gateway.gemini.chat_model, "env-model");
        assert_eq!(config.limits.window_hours, 6);
        assert_eq!(config.chat.default_aura, Aura::Rain);

        std::env::remove_var("WESTLINE_CHAT_MODEL");
        std::env::remove_var("WESTLINE_WINDOW_HOURS");
        std::env::remove_var("WESTLINE_DEFAULT_AURA");
    }

    #[test]
    fn test_from_file_rejects_invalid_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "gateway: [unclosed").unwrap();
        let result = Config::load(path.to_str().unwrap(), &crate::cli::Cli::default());
        assert!(result.is_err());
    }
}
