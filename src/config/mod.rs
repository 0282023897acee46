//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Origins allowed when `CLIENT_ORIGIN` is not set
pub const DEFAULT_CLIENT_ORIGINS: &str =
    "https://tranquil-capybara-ae8915.netlify.app,http://localhost:3000";

const DEFAULT_PORT: u16 = 10000;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Origins allowed to talk to the server cross-origin
    pub allowed_origins: Vec<String>,
    /// Directory holding the client bundle
    pub static_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup (the process environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Render provides PORT env var, fall back to SERVER_ADDR or the default port
        let server_addr = match lookup("PORT") {
            Some(port) => {
                let port: u16 = port.trim().parse().map_err(|_| ConfigError::InvalidPort)?;
                SocketAddr::from(([0, 0, 0, 0], port))
            }
            None => match lookup("SERVER_ADDR") {
                Some(addr) => addr.parse().map_err(|_| ConfigError::InvalidAddress)?,
                None => SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            },
        };

        let origins = lookup("CLIENT_ORIGIN").unwrap_or_else(|| DEFAULT_CLIENT_ORIGINS.to_string());

        Ok(Self {
            server_addr,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            allowed_origins: parse_origins(&origins)?,
            static_dir: lookup("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("public")),
        })
    }
}

/// Split a comma-separated origin list, dropping blanks and trailing slashes.
/// Entries must be concrete origins; `*` and non-header-safe text are rejected.
fn parse_origins(raw: &str) -> Result<Vec<String>, ConfigError> {
    raw.split(',')
        .map(|s| s.trim().trim_end_matches('/'))
        .filter(|s| !s.is_empty())
        .map(|s| {
            if s == "*" || !s.bytes().all(|b| b.is_ascii_graphic()) {
                Err(ConfigError::InvalidOrigin(s.to_string()))
            } else {
                Ok(s.to_string())
            }
        })
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid client origin: {0}")]
    InvalidOrigin(String),
}
