use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::auth::DEFAULT_MAX_AGE_SECS;
use crate::error::{AppError, Result};

/// Environment variable holding the Telegram bot token.
///
/// The token is deliberately not part of [`AppConfig`]: it must never end up
/// in a config file on disk, in logs, or in a serialized config dump. It is
/// read once at startup and passed explicitly to the verifier.
pub const BOT_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// API server configuration
    pub api: ApiConfig,

    /// Authentication configuration
    pub auth: AuthConfig,

    /// Profile store configuration
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Listen address in "IP:port" form
    pub listen_addr: String,

    /// Origins allowed by CORS (empty = allow any, for local development)
    pub allowed_origins: Vec<String>,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Replay window for init-data `auth_date`, in seconds
    pub max_age_secs: i64,
}

/// Profile store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the SQLite database; `None` selects the in-memory store
    pub database_path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level when RUST_LOG is not set
    pub level: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            allowed_origins: Vec::new(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            max_age_secs: DEFAULT_MAX_AGE_SECS,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: Some(PathBuf::from("./data/aurasync.db")),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load config from a TOML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file_content = fs::read_to_string(path).await.map_err(|e| {
            AppError::Configuration(format!("Failed to read config file: {}", e))
        })?;

        let config: Self = toml::from_str(&file_content)
            .map_err(|e| AppError::Configuration(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate config values
    pub fn validate(&self) -> Result<()> {
        if self.auth.max_age_secs <= 0 {
            return Err(AppError::Configuration(
                "auth.max_age_secs must be positive".to_string(),
            ));
        }
        if self.api.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(AppError::Configuration(format!(
                "Invalid listen address: {}",
                self.api.listen_addr
            )));
        }
        Ok(())
    }

    /// Create the database parent directory if needed
    pub async fn ensure_directories(&self) -> Result<()> {
        if let Some(db_path) = &self.storage.database_path {
            if let Some(parent) = db_path.parent() {
                if !parent.exists() {
                    fs::create_dir_all(parent).await.map_err(|e| {
                        AppError::Configuration(format!("Failed to create data directory: {}", e))
                    })?;
                }
            }
        }
        Ok(())
    }
}

/// Read the bot token from the environment.
pub fn bot_token_from_env() -> Result<String> {
    env::var(BOT_TOKEN_ENV).map_err(|_| {
        AppError::Configuration(format!("{} environment variable is not set", BOT_TOKEN_ENV))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_nonpositive_replay_window() {
        let mut config = AppConfig::default();
        config.auth.max_age_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_listen_address() {
        let mut config = AppConfig::default();
        config.api.listen_addr = "not-an-addr".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: AppConfig = toml::from_str(
            "[auth]\nmax_age_secs = 600\n",
        )
        .unwrap();
        assert_eq!(config.auth.max_age_secs, 600);
        assert_eq!(config.api.listen_addr, "0.0.0.0:3000");
    }
}
