use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_ENV: &str = "development";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_UPLOADS_DIR: &str = "uploads";
const CONFIG_DIR: &str = "config";

/// Application configuration, layered from optional `config/*.toml`
/// files and `APP_*` environment variables.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    /// Database connection URL (postgres or sqlite)
    pub database_url: String,

    /// Server bind host
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment (development, production, test)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging filter, e.g. "info" or "storefront_api=debug"
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether to run migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// Whether internal error detail is exposed in responses
    #[serde(default)]
    pub debug: bool,

    /// Root directory of the image file store
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: String,

    /// Maximum number of pooled database connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// Minimum number of pooled database connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_uploads_dir() -> String {
    DEFAULT_UPLOADS_DIR.to_string()
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}

impl AppConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Load configuration: `config/default.toml` (optional), then
/// `config/{environment}.toml` (optional), then `APP_*` environment
/// variables, highest priority last.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let environment = env::var("APP_ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let cfg = Config::builder()
        .add_source(File::with_name(&format!("{CONFIG_DIR}/default")).required(false))
        .add_source(File::with_name(&format!("{CONFIG_DIR}/{environment}")).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .set_default("environment", environment)?
        .build()?;

    cfg.try_deserialize()
}

/// Initialize the global tracing subscriber with an env-filter built
/// from `RUST_LOG` or the configured log level.
pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied() {
        let cfg: AppConfig = serde_json::from_value(serde_json::json!({
            "database_url": "sqlite::memory:"
        }))
        .unwrap();
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.host, DEFAULT_HOST);
        assert_eq!(cfg.environment, DEFAULT_ENV);
        assert!(!cfg.auto_migrate);
        assert!(!cfg.debug);
        assert_eq!(cfg.db_max_connections, 10);
    }

    #[test]
    fn bind_addr_joins_host_and_port() {
        let cfg: AppConfig = serde_json::from_value(serde_json::json!({
            "database_url": "sqlite::memory:",
            "host": "127.0.0.1",
            "port": 9000
        }))
        .unwrap();
        assert_eq!(cfg.bind_addr(), "127.0.0.1:9000");
    }
}
