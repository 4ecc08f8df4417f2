//! Application configuration
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;

use crate::fine::DEFAULT_FINE_PER_DAY;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Path to the embedded database file
    pub database_path: String,
    /// Shared secret expected in the `Authorization` header on `/api` routes.
    /// `None` disables the check.
    pub api_secret: Option<String>,
    /// Fine rate applied on approval when the librarian gives none
    pub default_fine_per_day: u32,
    /// tracing-subscriber filter directive
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_path: "library.db".to_string(),
            api_secret: None,
            default_fine_per_day: DEFAULT_FINE_PER_DAY,
            log_filter: "bookdesk=debug,tower_http=debug".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let port = match env::var("PORT") {
            Ok(p) => p
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("PORT must be a port number, got {p:?}")))?,
            Err(_) => defaults.port,
        };

        let default_fine_per_day = match env::var("DEFAULT_FINE_PER_DAY") {
            Ok(v) => v.parse().map_err(|_| {
                ConfigError::Invalid(format!(
                    "DEFAULT_FINE_PER_DAY must be a non-negative integer, got {v:?}"
                ))
            })?,
            Err(_) => defaults.default_fine_per_day,
        };

        Ok(Config {
            host: env::var("HOST").unwrap_or(defaults.host),
            port,
            database_path: env::var("DATABASE_URL").unwrap_or(defaults.database_path),
            api_secret: env::var("API_SECRET").ok().filter(|s| !s.is_empty()),
            default_fine_per_day,
            log_filter: env::var("RUST_LOG").unwrap_or(defaults.log_filter),
        })
    }

    /// Get the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
