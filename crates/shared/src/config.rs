//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Ledger engine tuning.
    #[serde(default)]
    pub ledger: LedgerSettings,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Run pending migrations on server start.
    #[serde(default)]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Ledger engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LedgerSettings {
    /// How many times a unit of work is replayed after a version conflict.
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,
    /// Apply unconsumed credit to newly issued debits.
    #[serde(default = "default_auto_apply_credit")]
    pub auto_apply_credit: bool,
    /// Page size used when a list request does not specify one.
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            max_conflict_retries: default_max_conflict_retries(),
            auto_apply_credit: default_auto_apply_credit(),
            default_page_size: default_page_size(),
        }
    }
}

fn default_max_conflict_retries() -> u32 {
    3
}

fn default_auto_apply_credit() -> bool {
    true
}

fn default_page_size() -> u32 {
    50
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("CLUBLEDGER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_environment_with_defaults() {
        temp_env::with_vars(
            [
                (
                    "CLUBLEDGER__DATABASE__URL",
                    Some("postgres://localhost/clubledger_test"),
                ),
                ("CLUBLEDGER__SERVER__PORT", None),
                ("CLUBLEDGER__LEDGER__MAX_CONFLICT_RETRIES", None),
                ("CLUBLEDGER__LEDGER__AUTO_APPLY_CREDIT", None),
                ("RUN_MODE", Some("test-defaults")),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.database.url, "postgres://localhost/clubledger_test");
                assert_eq!(config.database.max_connections, 10);
                assert_eq!(config.server.port, 8080);
                assert_eq!(config.ledger, LedgerSettings::default());
            },
        );
    }

    #[test]
    fn test_load_ledger_overrides() {
        temp_env::with_vars(
            [
                ("CLUBLEDGER__DATABASE__URL", Some("postgres://db/ledger")),
                ("CLUBLEDGER__LEDGER__MAX_CONFLICT_RETRIES", Some("7")),
                ("CLUBLEDGER__LEDGER__AUTO_APPLY_CREDIT", Some("false")),
                ("RUN_MODE", Some("test-overrides")),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.ledger.max_conflict_retries, 7);
                assert!(!config.ledger.auto_apply_credit);
                assert_eq!(config.ledger.default_page_size, 50);
            },
        );
    }

    #[test]
    fn test_missing_database_url_fails() {
        temp_env::with_vars(
            [
                ("CLUBLEDGER__DATABASE__URL", None::<&str>),
                ("RUN_MODE", Some("test-missing")),
            ],
            || {
                assert!(AppConfig::load().is_err());
            },
        );
    }
}
