//! Configuration management
//!
//! This module handles loading and parsing configuration for the iYKELib server.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables prefixed with `IYKELIB_` (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Authentication configuration (JWT + bcrypt)
    #[serde(default)]
    pub auth: AuthConfig,
    /// Upload configuration
    #[serde(default)]
    pub upload: UploadConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (the SPA dev server by default)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
    /// Reverse proxies whose `X-Forwarded-For` / `X-Real-IP` headers are honoured.
    /// Empty means the socket peer is the client.
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
            trusted_proxies: Vec::new(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (mysql or sqlite)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Maximum pool connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_url() -> String {
    "mysql://root@localhost/iykelib".to_string()
}

fn default_max_connections() -> u32 {
    20
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// MySQL (default)
    #[default]
    Mysql,
    /// SQLite (tests and single-file deployments)
    Sqlite,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Default cache TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    /// Maximum number of cached entries
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
    /// Window in seconds during which repeated views from one viewer count once
    #[serde(default = "default_view_dedup")]
    pub view_dedup_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            max_capacity: default_max_capacity(),
            view_dedup_seconds: default_view_dedup(),
        }
    }
}

fn default_ttl() -> u64 {
    600
}

fn default_max_capacity() -> u64 {
    10_000
}

fn default_view_dedup() -> u64 {
    30 * 60
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to sign JWTs; must be set before the server starts
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Token lifetime in hours
    #[serde(default = "default_jwt_expires_hours")]
    pub jwt_expires_hours: i64,
    /// bcrypt work factor
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            jwt_expires_hours: default_jwt_expires_hours(),
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

fn default_jwt_secret() -> String {
    String::new()
}

fn default_jwt_expires_hours() -> i64 {
    24
}

fn default_bcrypt_cost() -> u32 {
    10
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Upload directory path
    #[serde(default = "default_upload_path")]
    pub path: PathBuf,
    /// Public URL prefix the upload directory is served under
    #[serde(default = "default_public_prefix")]
    pub public_prefix: String,
    /// Maximum raw (multipart) file size in bytes (default: 50MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Maximum decoded size of a base64 payload in bytes (default: 5MB)
    #[serde(default = "default_max_base64_size")]
    pub max_base64_size: u64,
    /// Allowed MIME types
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
    /// Image served when a cover or thumbnail is missing
    #[serde(default = "default_placeholder_image")]
    pub placeholder_image: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            path: default_upload_path(),
            public_prefix: default_public_prefix(),
            max_file_size: default_max_file_size(),
            max_base64_size: default_max_base64_size(),
            allowed_types: default_allowed_types(),
            placeholder_image: default_placeholder_image(),
        }
    }
}

fn default_upload_path() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_public_prefix() -> String {
    "/uploads".to_string()
}

fn default_max_file_size() -> u64 {
    50 * 1024 * 1024 // 50MB
}

fn default_max_base64_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

fn default_allowed_types() -> Vec<String> {
    vec![
        "image/jpeg".to_string(),
        "image/png".to_string(),
        "image/gif".to_string(),
        "image/webp".to_string(),
        "application/pdf".to_string(),
        "application/epub+zip".to_string(),
    ]
}

fn default_placeholder_image() -> String {
    "/uploads/placeholder.png".to_string()
}

impl UploadConfig {
    /// Check if a MIME type is allowed
    pub fn is_type_allowed(&self, mime_type: &str) -> bool {
        self.allowed_types.iter().any(|t| t == mime_type)
    }

    /// Get file extension for a MIME type
    pub fn get_extension(&self, mime_type: &str) -> &'static str {
        match mime_type {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/svg+xml" => "svg",
            "application/pdf" => "pdf",
            "application/epub+zip" => "epub",
            _ => "bin",
        }
    }
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern `IYKELIB_<SECTION>_<KEY>`, e.g.
    /// `IYKELIB_DATABASE_URL` or `IYKELIB_AUTH_JWT_SECRET`.
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Reject configurations the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "auth.jwt_secret must not be empty (set IYKELIB_AUTH_JWT_SECRET)".to_string(),
            ));
        }
        if self.auth.jwt_expires_hours <= 0 {
            return Err(ConfigError::ValidationError(
                "auth.jwt_expires_hours must be positive".to_string(),
            ));
        }
        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            return Err(ConfigError::ValidationError(format!(
                "auth.bcrypt_cost must be between 4 and 31, got {}",
                self.auth.bcrypt_cost
            )));
        }
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "database.url must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        // Server
        if let Ok(host) = std::env::var("IYKELIB_SERVER_HOST") {
            self.server.host = host;
        }
        override_parsed("IYKELIB_SERVER_PORT", &mut self.server.port);
        if let Ok(cors_origin) = std::env::var("IYKELIB_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }
        if let Ok(proxies) = std::env::var("IYKELIB_SERVER_TRUSTED_PROXIES") {
            if let Ok(parsed) = proxies
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::parse::<IpAddr>)
                .collect::<Result<Vec<_>, _>>()
            {
                self.server.trusted_proxies = parsed;
            }
        }

        // Database
        if let Ok(driver) = std::env::var("IYKELIB_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("IYKELIB_DATABASE_URL") {
            self.database.url = url;
        }
        override_parsed(
            "IYKELIB_DATABASE_MAX_CONNECTIONS",
            &mut self.database.max_connections,
        );

        // Cache
        override_parsed("IYKELIB_CACHE_TTL_SECONDS", &mut self.cache.ttl_seconds);
        override_parsed("IYKELIB_CACHE_MAX_CAPACITY", &mut self.cache.max_capacity);

        // Auth
        if let Ok(secret) = std::env::var("IYKELIB_AUTH_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        override_parsed(
            "IYKELIB_AUTH_JWT_EXPIRES_HOURS",
            &mut self.auth.jwt_expires_hours,
        );
        override_parsed("IYKELIB_AUTH_BCRYPT_COST", &mut self.auth.bcrypt_cost);

        // Upload
        if let Ok(path) = std::env::var("IYKELIB_UPLOAD_PATH") {
            self.upload.path = PathBuf::from(path);
        }
        override_parsed("IYKELIB_UPLOAD_MAX_FILE_SIZE", &mut self.upload.max_file_size);
        override_parsed(
            "IYKELIB_UPLOAD_MAX_BASE64_SIZE",
            &mut self.upload.max_base64_size,
        );
    }
}

/// Overwrite `target` with the parsed env value, keeping it when the value is invalid
fn override_parsed<T: std::str::FromStr>(key: &str, target: &mut T) {
    if let Ok(raw) = std::env::var(key) {
        if let Ok(value) = raw.trim().parse::<T>() {
            *target = value;
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for all config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ALL_ENV_KEYS: &[&str] = &[
    "IYKELIB_SERVER_HOST",
    "IYKELIB_SERVER_PORT",
    "IYKELIB_SERVER_CORS_ORIGIN",
    "IYKELIB_SERVER_TRUSTED_PROXIES",
    "IYKELIB_DATABASE_DRIVER",
    "IYKELIB_DATABASE_URL",
    "IYKELIB_DATABASE_MAX_CONNECTIONS",
    "IYKELIB_CACHE_TTL_SECONDS",
    "IYKELIB_CACHE_MAX_CAPACITY",
    "IYKELIB_AUTH_JWT_SECRET",
    "IYKELIB_AUTH_JWT_EXPIRES_HOURS",
    "IYKELIB_AUTH_BCRYPT_COST",
    "IYKELIB_UPLOAD_PATH",
    "IYKELIB_UPLOAD_MAX_FILE_SIZE",
    "IYKELIB_UPLOAD_MAX_BASE64_SIZE",
];

#[cfg(test)]
fn clear_env() {
    for key in ALL_ENV_KEYS {
        std::env::remove_var(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        super::CONFIG_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let path = std::path::Path::new("nonexistent_config.yml");
        let config = Config::load(path).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.database.driver, DatabaseDriver::Mysql);
        assert_eq!(config.database.url, "mysql://root@localhost/iykelib");
        assert_eq!(config.cache.ttl_seconds, 600);
        assert_eq!(config.auth.jwt_expires_hours, 24);
        assert_eq!(config.auth.bcrypt_cost, 10);
        assert_eq!(config.upload.path, PathBuf::from("uploads"));
        assert_eq!(config.upload.max_base64_size, 5 * 1024 * 1024);
    }

    #[test]
    fn test_load_empty_file_returns_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "").unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.server.port, 5000);
        assert!(config.auth.jwt_secret.is_empty());
    }

    #[test]
    fn test_load_partial_config_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  port: 3001\nauth:\n  bcrypt_cost: 12\n").unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.server.port, 3001);
        assert_eq!(config.auth.bcrypt_cost, 12);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.auth.jwt_expires_hours, 24);
        assert_eq!(config.database.driver, DatabaseDriver::Mysql);
    }

    #[test]
    fn test_load_full_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"
server:
  host: "127.0.0.1"
  port: 9000
  cors_origin: "https://library.example.com"
database:
  driver: sqlite
  url: ":memory:"
  max_connections: 5
cache:
  ttl_seconds: 120
  max_capacity: 500
  view_dedup_seconds: 60
auth:
  jwt_secret: "s3cret"
  jwt_expires_hours: 48
  bcrypt_cost: 8
upload:
  path: "/var/lib/iykelib/uploads"
  max_file_size: 1024
  max_base64_size: 512
"#).unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.cors_origin, "https://library.example.com");
        assert_eq!(config.database.driver, DatabaseDriver::Sqlite);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.cache.ttl_seconds, 120);
        assert_eq!(config.cache.view_dedup_seconds, 60);
        assert_eq!(config.auth.jwt_secret, "s3cret");
        assert_eq!(config.auth.jwt_expires_hours, 48);
        assert_eq!(config.auth.bcrypt_cost, 8);
        assert_eq!(config.upload.path, PathBuf::from("/var/lib/iykelib/uploads"));
        assert_eq!(config.upload.max_file_size, 1024);
        assert_eq!(config.upload.max_base64_size, 512);
    }

    #[test]
    fn test_load_invalid_yaml_returns_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  port: not_a_number\n").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("parse"));
    }

    #[test]
    fn test_load_unknown_driver_returns_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "database:\n  driver: postgres\n").unwrap();

        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_secret() {
        let mut config = Config::default();
        config.auth.jwt_secret = "   ".to_string();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("jwt_secret"));
    }

    #[test]
    fn test_default_config_requires_secret() {
        let err = Config::default().validate().unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        assert!(err.to_string().contains("IYKELIB_AUTH_JWT_SECRET"));
    }

    #[test]
    fn test_validate_rejects_bad_bcrypt_cost() {
        let mut config = Config::default();
        config.auth.jwt_secret = "s3cret".to_string();
        config.auth.bcrypt_cost = 2;

        assert!(config.validate().is_err());
        config.auth.bcrypt_cost = 4;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_upload_type_checks() {
        let upload = UploadConfig::default();
        assert!(upload.is_type_allowed("application/pdf"));
        assert!(upload.is_type_allowed("image/png"));
        assert!(!upload.is_type_allowed("application/x-msdownload"));
        assert_eq!(upload.get_extension("application/epub+zip"), "epub");
        assert_eq!(upload.get_extension("text/plain"), "bin");
    }

    #[test]
    fn test_env_override_server_and_auth() {
        let _guard = lock_env();
        clear_env();

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  port: 8080\n").unwrap();

        std::env::set_var("IYKELIB_SERVER_HOST", "192.168.1.1");
        std::env::set_var("IYKELIB_SERVER_PORT", "4000");
        std::env::set_var("IYKELIB_AUTH_JWT_SECRET", "from-env");
        std::env::set_var("IYKELIB_AUTH_BCRYPT_COST", "6");
        std::env::set_var("IYKELIB_SERVER_TRUSTED_PROXIES", "10.0.0.1, ::1");

        let config = Config::load_with_env(file.path()).unwrap();

        assert_eq!(config.server.host, "192.168.1.1");
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.auth.jwt_secret, "from-env");
        assert_eq!(config.auth.bcrypt_cost, 6);
        let expected: Vec<IpAddr> = vec!["10.0.0.1".parse().unwrap(), "::1".parse().unwrap()];
        assert_eq!(config.server.trusted_proxies, expected);

        std::env::set_var("IYKELIB_SERVER_TRUSTED_PROXIES", "10.0.0.1, proxy.local");
        let config = Config::load_with_env(file.path()).unwrap();
        assert!(config.server.trusted_proxies.is_empty());

        clear_env();
    }

    #[test]
    fn test_env_override_database_config() {
        let _guard = lock_env();
        clear_env();

        let file = NamedTempFile::new().unwrap();

        std::env::set_var("IYKELIB_DATABASE_DRIVER", "sqlite");
        std::env::set_var("IYKELIB_DATABASE_URL", "data/library.db");

        let config = Config::load_with_env(file.path()).unwrap();

        assert_eq!(config.database.driver, DatabaseDriver::Sqlite);
        assert_eq!(config.database.url, "data/library.db");

        clear_env();
    }

    #[test]
    fn test_env_override_invalid_values_ignored() {
        let _guard = lock_env();
        clear_env();

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  port: 8080\ndatabase:\n  driver: sqlite\n").unwrap();

        std::env::set_var("IYKELIB_SERVER_PORT", "not_a_number");
        std::env::set_var("IYKELIB_DATABASE_DRIVER", "oracle");
        std::env::set_var("IYKELIB_AUTH_JWT_EXPIRES_HOURS", "soon");

        let config = Config::load_with_env(file.path()).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.driver, DatabaseDriver::Sqlite);
        assert_eq!(config.auth.jwt_expires_hours, 24);

        clear_env();
    }
}
