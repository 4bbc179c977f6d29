//! Application configuration module
//!
//! Handles loading and validating configuration from environment variables.

use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;
use tokio_postgres::config::{Host, SslMode};

pub const DEFAULT_MIGRATIONS_DIR: &str = "migrations";
pub const DEFAULT_MODELS_PATH: &str = "models.json";
pub const DEFAULT_MIGRATION_NAME: &str = "noname";
pub const DEFAULT_HISTORY_TABLE: &str = "schemaflow_meta_migrations";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_pool_size: usize,
    /// Connect over TLS (`sslmode=require`)
    #[serde(default)]
    pub tls: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            database: "postgres".to_string(),
            max_pool_size: 10,
            tls: false,
        }
    }
}

/// Options handed to the writer and the pipeline for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrateOptions {
    /// Directory receiving migration artifacts; must already exist
    pub out_dir: PathBuf,
    /// Render only, write nothing
    pub preview: bool,
    /// Report failures with full detail
    pub debug: bool,
    pub name: String,
    pub comment: String,
}

impl Default for MigrateOptions {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from(DEFAULT_MIGRATIONS_DIR),
            preview: false,
            debug: false,
            name: DEFAULT_MIGRATION_NAME.to_string(),
            comment: String::new(),
        }
    }
}

/// Complete application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub migrate: MigrateOptions,
    /// Model declaration file read by the extractor
    pub models_path: PathBuf,
    /// Migration history table name
    pub history_table: String,
}

impl Settings {
    /// Load settings from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // A missing .env file is fine
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup (the process environment in `load`)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_pool_size = lookup("DB_MAX_CONNECTIONS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        // Try DATABASE_URL first, fall back to individual vars
        let database = if let Some(database_url) = lookup("DATABASE_URL") {
            Self::parse_database_url(&database_url, max_pool_size)?
        } else {
            DatabaseConfig {
                host: lookup("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
                port: lookup("DB_PORT")
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(5432),
                user: lookup("DB_USER").unwrap_or_else(|| "postgres".to_string()),
                password: lookup("DB_PASSWORD").unwrap_or_default(),
                database: lookup("DB_NAME").unwrap_or_else(|| "postgres".to_string()),
                max_pool_size,
                tls: lookup("DB_SSLMODE").is_some_and(|mode| mode.eq_ignore_ascii_case("require")),
            }
        };

        let name = lookup("MIGRATION_NAME")
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_MIGRATION_NAME.to_string());

        let migrate = MigrateOptions {
            out_dir: lookup("MIGRATIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MIGRATIONS_DIR)),
            preview: parse_flag("MIGRATION_PREVIEW", lookup("MIGRATION_PREVIEW"))?,
            debug: parse_flag("MIGRATION_DEBUG", lookup("MIGRATION_DEBUG"))?,
            name,
            comment: lookup("MIGRATION_COMMENT").unwrap_or_default(),
        };

        let history_table = lookup("MIGRATIONS_TABLE")
            .unwrap_or_else(|| DEFAULT_HISTORY_TABLE.to_string());
        if !is_identifier(&history_table) {
            return Err(ConfigError::InvalidValue(format!(
                "MIGRATIONS_TABLE '{}' is not a valid table name",
                history_table
            )));
        }

        Ok(Self {
            database,
            migrate,
            models_path: lookup("MODELS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODELS_PATH)),
            history_table,
        })
    }

    /// Parse a DATABASE_URL connection string (postgresql://...)
    ///
    /// User and password come back percent-decoded.
    fn parse_database_url(url: &str, max_pool_size: usize) -> Result<DatabaseConfig, ConfigError> {
        let parsed = url.parse::<tokio_postgres::Config>().map_err(|e| {
            ConfigError::InvalidValue(format!(
                "Invalid DATABASE_URL format (expected postgresql://...): {}",
                e
            ))
        })?;

        let host = match parsed.get_hosts().first() {
            Some(Host::Tcp(host)) => host.clone(),
            #[cfg(unix)]
            Some(Host::Unix(_)) => {
                return Err(ConfigError::InvalidValue(
                    "Unix socket connections are not supported".to_string(),
                ))
            }
            None => {
                return Err(ConfigError::InvalidValue("Missing host in DATABASE_URL".to_string()))
            }
        };

        let database = parsed
            .get_dbname()
            .filter(|db| !db.is_empty())
            .ok_or_else(|| ConfigError::MissingVar("database name in DATABASE_URL".to_string()))?
            .to_string();

        let tls = parsed.get_ssl_mode() == SslMode::Require || host.contains("neon.tech");

        Ok(DatabaseConfig {
            port: parsed.get_ports().first().copied().unwrap_or(5432),
            user: parsed.get_user().unwrap_or("postgres").to_string(),
            password: parsed
                .get_password()
                .map(|p| String::from_utf8_lossy(p).into_owned())
                .unwrap_or_default(),
            host,
            database,
            max_pool_size,
            tls,
        })
    }
}

fn parse_flag(key: &str, value: Option<String>) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
