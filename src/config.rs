use std::path::Path;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use thiserror::Error;
use walletdb_core::{Dialect, UnknownDialect};

#[derive(Parser, Debug)]
#[command(name = "walletdb", about = "walletdb - wallet and payment ledger storage")]
pub struct CliArgs {
    /// Path to config file
    #[arg(short, long, default_value = "walletdb.toml", global = true)]
    pub config: String,

    /// Log level (overrides config file)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Database file or connection string (overrides config file and DATABASE_URL)
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create the ledger tables if they do not exist
    Init,
    /// Print row counts per table
    Stats,
    /// Print one record
    Show {
        #[arg(value_enum)]
        kind: EntityKind,
        id: String,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    User,
    Wallet,
    Transaction,
    Notification,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    UnknownDialect(#[from] UnknownDialect),
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub dialect: Dialect,
    pub url: String,
    /// SQLite only.
    pub enforce_foreign_keys: bool,
}

/// The file as written. The dialect stays a string here so an unknown value
/// surfaces as `ConfigError::UnknownDialect` rather than a parse error.
#[derive(Debug, Deserialize)]
struct FileConfig {
    #[serde(default = "default_file_database")]
    database: FileDatabaseConfig,

    #[serde(default = "default_logging")]
    logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
struct FileDatabaseConfig {
    #[serde(default = "default_dialect_name")]
    dialect: String,

    #[serde(default = "default_url")]
    url: String,

    #[serde(default = "default_enforce_foreign_keys")]
    enforce_foreign_keys: bool,
}

impl TryFrom<FileConfig> for Config {
    type Error = ConfigError;

    fn try_from(file: FileConfig) -> Result<Self, Self::Error> {
        Ok(Config {
            database: DatabaseConfig {
                dialect: file.database.dialect.parse()?,
                url: file.database.url,
                enforce_foreign_keys: file.database.enforce_foreign_keys,
            },
            logging: file.logging,
        })
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

fn default_file_database() -> FileDatabaseConfig {
    FileDatabaseConfig {
        dialect: default_dialect_name(),
        url: default_url(),
        enforce_foreign_keys: default_enforce_foreign_keys(),
    }
}

fn default_database() -> DatabaseConfig {
    DatabaseConfig {
        dialect: default_dialect(),
        url: default_url(),
        enforce_foreign_keys: default_enforce_foreign_keys(),
    }
}

fn default_logging() -> LoggingConfig {
    LoggingConfig {
        level: default_log_level(),
        json: false,
    }
}

fn default_dialect() -> Dialect {
    Dialect::Sqlite
}

fn default_dialect_name() -> String {
    default_dialect().as_str().to_string()
}

fn default_url() -> String {
    "walletdb.sqlite3".to_string()
}

fn default_enforce_foreign_keys() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database: default_database(),
            logging: default_logging(),
        }
    }
}

impl Config {
    /// File, then `DB_TYPE` / `DATABASE_URL`, then CLI flags.
    ///
    /// A missing or malformed file falls back to defaults. An unrecognized
    /// dialect, in the file or in `DB_TYPE`, is an error.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let mut config = match Config::from_file(&cli.config) {
            Ok(config) => config,
            Err(e @ ConfigError::UnknownDialect(_)) => return Err(e),
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(e) => {
                eprintln!("Warning: {}", e);
                Config::default()
            }
        };

        let db_type = std::env::var("DB_TYPE").ok();
        config.apply_env(db_type.as_deref(), std::env::var("DATABASE_URL").ok())?;

        // CLI overrides
        if let Some(ref level) = cli.log_level {
            config.logging.level = level.clone();
        }
        if let Some(ref url) = cli.database_url {
            config.database.url = url.clone();
        }

        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let file: FileConfig = toml::from_str(&contents)?;
        Config::try_from(file)
    }

    pub fn apply_env(&mut self, db_type: Option<&str>, database_url: Option<String>) -> Result<(), ConfigError> {
        if let Some(db_type) = db_type {
            self.database.dialect = db_type.parse()?;
        }
        if let Some(url) = database_url {
            self.database.url = url;
        }
        Ok(())
    }
}
