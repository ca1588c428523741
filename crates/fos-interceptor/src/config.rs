//! Interceptor configuration.

use fos_network::{HttpClientConfig, DEFAULT_ANTI_PHISHING_ENDPOINT, DEFAULT_FORGET_MODE_FILTER};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Lookup client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Whole-request timeout in seconds
    pub timeout_secs: u64,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// User-Agent string
    pub user_agent: String,
    /// Maximum blocklist response size in bytes
    pub max_body_size: usize,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        let defaults = HttpClientConfig::default();
        Self {
            timeout_secs: defaults.timeout.as_secs(),
            connect_timeout_secs: defaults.connect_timeout.as_secs(),
            user_agent: defaults.user_agent,
            max_body_size: defaults.max_body_size,
        }
    }
}

impl NetworkSettings {
    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            user_agent: self.user_agent.clone(),
            max_body_size: self.max_body_size,
        }
    }
}

/// Which policies run and where their data comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterceptorConfig {
    /// Check navigations against the phishing blocklist
    pub anti_phishing_enabled: bool,
    /// Detect sensitive-content domains (user preference)
    pub automatic_forget_mode_enabled: bool,
    /// Bundled forget-mode filter asset
    pub forget_mode_filter_path: PathBuf,
    /// Blocklist endpoint; the digest prefix is appended
    pub anti_phishing_endpoint: String,
    /// Lookup client settings
    pub network: NetworkSettings,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            anti_phishing_enabled: true,
            automatic_forget_mode_enabled: false,
            forget_mode_filter_path: PathBuf::from(DEFAULT_FORGET_MODE_FILTER),
            anti_phishing_endpoint: DEFAULT_ANTI_PHISHING_ENDPOINT.to_string(),
            network: NetworkSettings::default(),
        }
    }
}

impl InterceptorConfig {
    /// Parse a JSON config; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = InterceptorConfig::default();

        assert!(config.anti_phishing_enabled);
        assert!(!config.automatic_forget_mode_enabled);
        assert_eq!(config.forget_mode_filter_path, PathBuf::from("assets/adult-domains.bin"));
        assert_eq!(
            config.anti_phishing_endpoint,
            "https://antiphishing.cliqz.com/api/bwlist?md5="
        );
        assert_eq!(config.network.http_client_config().timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_partial_json() {
        let config = InterceptorConfig::from_json(
            r#"{"automatic_forget_mode_enabled": true, "network": {"timeout_secs": 3}}"#,
        )
        .unwrap();

        assert!(config.anti_phishing_enabled);
        assert!(config.automatic_forget_mode_enabled);
        assert_eq!(config.network.timeout_secs, 3);
        assert_eq!(config.network.connect_timeout_secs, 5);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("interceptor.json");
        let mut config = InterceptorConfig::default();
        config.anti_phishing_enabled = false;
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        assert_eq!(InterceptorConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            InterceptorConfig::from_json("{\"anti_phishing_enabled\": 1}"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            InterceptorConfig::from_file("/nonexistent/interceptor.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
