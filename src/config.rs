//! Configuration module for sharegate.

use serde::Deserialize;
use std::path::Path;

use crate::{Result, SharegateError};

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Runtime worker threads. 0 selects `2 * cores + 1`.
    #[serde(default)]
    pub worker_threads: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl ServerConfig {
    /// Number of runtime worker threads to start.
    pub fn effective_worker_threads(&self) -> usize {
        if self.worker_threads > 0 {
            return self.worker_threads;
        }
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        cores * 2 + 1
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            worker_threads: 0,
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Maximum pooled connections.
    #[serde(default = "default_db_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "data/sharegate.db".to_string()
}

fn default_db_max_connections() -> u32 {
    8
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_db_max_connections(),
        }
    }
}

/// Blob storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FilesConfig {
    /// Path to the blob storage directory.
    #[serde(default = "default_storage_path")]
    pub storage_path: String,
    /// Maximum upload size in megabytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_mb: u64,
}

fn default_storage_path() -> String {
    "data/files".to_string()
}

fn default_max_upload_size() -> u64 {
    50
}

impl FilesConfig {
    /// Upload ceiling in bytes.
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_size_mb * 1024 * 1024
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            max_upload_size_mb: default_max_upload_size(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/sharegate.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Web API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// JWT secret key.
    #[serde(default)]
    pub jwt_secret: String,
    /// Access token expiry in seconds.
    #[serde(default = "default_jwt_access_expiry")]
    pub jwt_access_token_expiry_secs: u64,
    /// Refresh token expiry in days.
    #[serde(default = "default_jwt_refresh_expiry")]
    pub jwt_refresh_token_expiry_days: u64,
    /// Rate limit for auth endpoints (requests per minute per client).
    #[serde(default = "default_auth_rate_limit")]
    pub auth_rate_limit: u32,
    /// Rate limit for share downloads (requests per minute per client).
    #[serde(default = "default_download_rate_limit")]
    pub download_rate_limit: u32,
}

fn default_jwt_access_expiry() -> u64 {
    900 // 15 minutes
}

fn default_jwt_refresh_expiry() -> u64 {
    7
}

fn default_auth_rate_limit() -> u32 {
    10
}

fn default_download_rate_limit() -> u32 {
    60
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            cors_origins: vec![],
            jwt_secret: String::new(),
            jwt_access_token_expiry_secs: default_jwt_access_expiry(),
            jwt_refresh_token_expiry_days: default_jwt_refresh_expiry(),
            auth_rate_limit: default_auth_rate_limit(),
            download_rate_limit: default_download_rate_limit(),
        }
    }
}

/// Share link configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ShareConfig {
    /// Externally reachable base URL used to build `share_url`.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Lifetime applied when a share request names none.
    #[serde(default = "default_ttl_days")]
    pub default_ttl_days: u32,
}

fn default_public_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_ttl_days() -> u32 {
    7
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            public_base_url: default_public_base_url(),
            default_ttl_days: default_ttl_days(),
        }
    }
}

/// Outbound notification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsConfig {
    /// Whether mails are dispatched at all.
    #[serde(default = "default_notifications_enabled")]
    pub enabled: bool,
    /// Sender address.
    #[serde(default = "default_from_address")]
    pub from_address: String,
    /// Frontend base URL used in verification links.
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
    /// Staff addresses notified after every upload.
    #[serde(default)]
    pub upload_recipients: Vec<String>,
    /// Retries after the first failed attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Fixed delay between attempts.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_secs: u64,
}

fn default_notifications_enabled() -> bool {
    true
}

fn default_from_address() -> String {
    "noreply@localhost".to_string()
}

fn default_frontend_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    300
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: default_notifications_enabled(),
            from_address: default_from_address(),
            frontend_url: default_frontend_url(),
            upload_recipients: vec![],
            max_retries: default_max_retries(),
            retry_backoff_secs: default_retry_backoff(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Blob storage configuration.
    #[serde(default)]
    pub files: FilesConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Web API configuration.
    #[serde(default)]
    pub web: WebConfig,
    /// Share link configuration.
    #[serde(default)]
    pub share: ShareConfig,
    /// Notification configuration.
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(SharegateError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| SharegateError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `SHAREGATE_JWT_SECRET`: Override the JWT secret key
    /// - `SHAREGATE_DATABASE_PATH`: Override the database file path
    pub fn apply_env_overrides(&mut self) {
        if let Ok(jwt_secret) = std::env::var("SHAREGATE_JWT_SECRET") {
            if !jwt_secret.is_empty() {
                self.web.jwt_secret = jwt_secret;
            }
        }
        if let Ok(path) = std::env::var("SHAREGATE_DATABASE_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }
    }

    /// Validate the configuration before serving.
    pub fn validate(&self) -> Result<()> {
        if self.web.jwt_secret.is_empty() {
            return Err(SharegateError::Config(
                "jwt_secret is not set. \
                 Set it in config.toml or via SHAREGATE_JWT_SECRET environment variable."
                    .to_string(),
            ));
        }
        if self.files.max_upload_size_mb == 0 {
            return Err(SharegateError::Config(
                "files.max_upload_size_mb must be positive".to_string(),
            ));
        }
        if self.share.default_ttl_days == 0 {
            return Err(SharegateError::Config(
                "share.default_ttl_days must be positive".to_string(),
            ));
        }
        url::Url::parse(&self.share.public_base_url).map_err(|e| {
            SharegateError::Config(format!("share.public_base_url is not a URL: {e}"))
        })?;
        url::Url::parse(&self.notifications.frontend_url).map_err(|e| {
            SharegateError::Config(format!("notifications.frontend_url is not a URL: {e}"))
        })?;
        Ok(())
    }
}
