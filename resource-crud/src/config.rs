//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: `CRUD_`, nested keys separated by `__`,
//!    e.g. `CRUD_PAGINATION__DEFAULT_LIMIT=50`)
//! 2. Current working directory: ./config.toml
//! 3. XDG config directory: ~/.config/resource-crud/{service_name}/config.toml
//! 4. System directory: /etc/resource-crud/{service_name}/config.toml
//! 5. Default values

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "CRUD_";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    pub service: ServiceConfig,

    /// List endpoint paging defaults
    #[serde(default)]
    pub pagination: PaginationConfig,

    /// Message templates and base vocabulary
    #[serde(default)]
    pub messages: MessagesConfig,

    /// Database configuration (optional)
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    pub name: String,

    /// Log level (trace, debug, info, warn, error) or a full `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Environment (dev, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,
}

/// Paging behaviour of list endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationConfig {
    /// Page size used when the request carries no `limit`
    #[serde(default = "default_limit")]
    pub default_limit: u32,

    /// Largest page size a client may request
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,

    /// Externally visible origin (e.g. `https://api.example.com`) used when
    /// building `next`/`prev` links. Falls back to the request `Host` header.
    #[serde(default)]
    pub public_url: Option<String>,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            public_url: None,
        }
    }
}

/// Message facility configuration
///
/// Entries here are merged over the built-in CRUD messages when the
/// [`MessageRegistry`](crate::messages::MessageRegistry) is built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessagesConfig {
    /// Text used when a message key is unknown everywhere
    #[serde(default = "default_fallback_message")]
    pub fallback: String,

    /// Message key to template
    #[serde(default)]
    pub templates: BTreeMap<String, String>,

    /// System-wide base vocabulary
    #[serde(default)]
    pub vocabulary: BTreeMap<String, String>,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            fallback: default_fallback_message(),
            templates: BTreeMap::new(),
            vocabulary: BTreeMap::new(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum idle connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// Maximum retry attempts for establishing database connection
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay between retry attempts in seconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

impl DatabaseConfig {
    /// Get connection timeout as Duration
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Get the base retry delay as Duration
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_limit() -> u32 {
    25
}

fn default_max_limit() -> u32 {
    100
}

fn default_fallback_message() -> String {
    "Request could not be completed".to_string()
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    2
}

fn default_connection_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1
}

impl Config {
    /// Load configuration from all sources
    ///
    /// The service name is inferred from the running binary.
    pub fn load() -> Result<Self> {
        let service_name = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "resource-crud".to_string());

        Self::load_for_service(&service_name)
    }

    /// Load configuration for a specific service name
    pub fn load_for_service(service_name: &str) -> Result<Self> {
        let config_paths = Self::find_config_paths(service_name);

        tracing::debug!("Searching for config files in order:");
        for path in &config_paths {
            tracing::debug!("  - {}", path.display());
        }

        let mut defaults = Config::default();
        defaults.service.name = service_name.to_string();

        let mut figment = Figment::new().merge(Serialized::defaults(defaults));

        // Lowest priority first so higher priority files override
        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config = figment.extract()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// This bypasses XDG directories and loads directly from the given path.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }

    /// Candidate config file paths, highest priority first
    fn find_config_paths(service_name: &str) -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        let xdg_dirs = xdg::BaseDirectories::with_prefix("resource-crud");
        let config_file_path = Path::new(service_name).join("config.toml");
        if let Some(path) = xdg_dirs.find_config_file(&config_file_path) {
            paths.push(path);
        }

        paths.push(
            PathBuf::from("/etc/resource-crud")
                .join(service_name)
                .join("config.toml"),
        );

        paths
    }

    /// Get database URL
    pub fn database_url(&self) -> Option<&str> {
        self.database.as_ref().map(|db| db.url.as_str())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                name: "resource-crud".to_string(),
                log_level: default_log_level(),
                environment: default_environment(),
            },
            pagination: PaginationConfig::default(),
            messages: MessagesConfig::default(),
            database: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service.log_level, "info");
        assert_eq!(config.pagination.default_limit, 25);
        assert_eq!(config.pagination.max_limit, 100);
        assert!(config.pagination.public_url.is_none());
        assert!(config.database_url().is_none());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[service]
name = "orders"

[pagination]
default_limit = 10
public_url = "https://api.example.com"

[messages.vocabulary]
resource = "Order"

[database]
url = "postgres://localhost/orders"
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.service.name, "orders");
        assert_eq!(config.service.log_level, "info");
        assert_eq!(config.pagination.default_limit, 10);
        assert_eq!(config.pagination.max_limit, 100);
        assert_eq!(
            config.pagination.public_url.as_deref(),
            Some("https://api.example.com")
        );
        assert_eq!(
            config.messages.vocabulary.get("resource").map(String::as_str),
            Some("Order")
        );
        assert_eq!(config.database_url(), Some("postgres://localhost/orders"));
        let db = config.database.unwrap();
        assert_eq!(db.max_retries, 3);
        assert_eq!(db.connection_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.service.name, "resource-crud");
        assert_eq!(config.messages, MessagesConfig::default());
    }
}
