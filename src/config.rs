//! Database settings loaded from `config/tidemark.toml` and `DB_*` environment variables.

use crate::connection::ConnectionConfig;
use ::config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Default location of the optional settings file
pub const DEFAULT_CONFIG_FILE: &str = "config/tidemark.toml";

/// Connection settings as read from file and environment
///
/// Environment variables use the `DB_` prefix: `DB_HOST`, `DB_PORT`,
/// `DB_NAME`, `DB_USER`, `DB_PASSWORD`. They override the `[database]`
/// section of the settings file.
#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

impl DatabaseConfig {
    /// Load from [`DEFAULT_CONFIG_FILE`] (optional) and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Load from `path` (optional) and the environment.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("database.host", default_host())?
            .set_default("database.port", i64::from(default_port()))?
            .add_source(File::from(path).required(false))
            .build()?;

        let mut db_config: DatabaseConfig = settings.get("database").map_err(|e| {
            ConfigError::Message(format!(
                "Database configuration in {} is invalid: {}",
                path.display(),
                e
            ))
        })?;

        // `DB_*` variables are flat, so they are read as their own layer.
        let env = Config::builder()
            .add_source(Environment::with_prefix("DB"))
            .build()?;
        db_config.apply_env(&env)?;

        Ok(db_config)
    }

    fn apply_env(&mut self, env: &Config) -> Result<(), ConfigError> {
        if let Some(host) = optional_string(env, "host")? {
            self.host = host;
        }
        if let Some(port) = optional_string(env, "port")? {
            self.port = port
                .parse()
                .map_err(|e| ConfigError::Message(format!("DB_PORT '{port}' is not a valid port: {e}")))?;
        }
        if let Some(name) = optional_string(env, "name")? {
            self.name = Some(name);
        }
        if let Some(user) = optional_string(env, "user")? {
            self.user = Some(user);
        }
        if let Some(password) = optional_string(env, "password")? {
            self.password = Some(password);
        }
        Ok(())
    }

    /// Resolve into connection parameters, failing on the first missing required value
    pub fn into_connection_config(self) -> Result<ConnectionConfig, ConfigError> {
        let database = self.name.filter(|v| !v.is_empty()).ok_or_else(|| {
            ConfigError::Message("Database name is required (use --database or DB_NAME env var)".to_string())
        })?;
        let user = self.user.filter(|v| !v.is_empty()).ok_or_else(|| {
            ConfigError::Message("Database user is required (use --user or DB_USER env var)".to_string())
        })?;
        let password = self.password.filter(|v| !v.is_empty()).ok_or_else(|| {
            ConfigError::Message(
                "Database password is required (use --password or DB_PASSWORD env var)".to_string(),
            )
        })?;

        Ok(ConnectionConfig {
            host: self.host,
            port: self.port,
            database,
            user,
            password,
        })
    }
}

fn optional_string(config: &Config, key: &str) -> Result<Option<String>, ConfigError> {
    match config.get_string(key) {
        Ok(value) => Ok(Some(value)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
