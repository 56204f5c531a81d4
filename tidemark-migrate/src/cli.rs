//! Command-line arguments and how they merge with file/environment settings

use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;
use tidemark::config::DEFAULT_CONFIG_FILE;
use tidemark::migration::{Migrator, TemplateVars};
use tidemark::{ConnectionConfig, DatabaseConfig};

#[derive(Parser, Debug)]
#[command(name = "tidemark-migrate")]
#[command(about = "PostgreSQL migration tool with Flyway-like features")]
#[command(version)]
#[command(after_help = "\
Environment Variables:
  DB_HOST       Database host (default: localhost)
  DB_PORT       Database port (default: 5432)
  DB_NAME       Database name (required)
  DB_USER       Database user (required)
  DB_PASSWORD   Database password (required)

Every environment variable is also a template variable: ${NAME} in a
migration, seed or afterMigrate script is replaced with its value.")]
pub struct Cli {
    /// Database host
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Database port
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Database name
    #[arg(long, global = true)]
    pub database: Option<String>,

    /// Database user
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Database password
    #[arg(long, global = true)]
    pub password: Option<String>,

    /// Settings file with a [database] section
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Migrations directory path
    #[arg(long, global = true, default_value = "migrations")]
    pub migrations_dir: PathBuf,

    /// afterMigrate scripts directory
    #[arg(long, global = true, default_value = "afterMigrate")]
    pub after_migrate_dir: PathBuf,

    /// Seeds directory
    #[arg(long, global = true, default_value = "seeds")]
    pub seeds_dir: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Apply pending migrations, then afterMigrate scripts
    Migrate {
        /// Preview migrations without applying them
        #[arg(long)]
        dry_run: bool,
    },

    /// Run every seed script
    Seed {
        /// Preview seed data without loading it
        #[arg(long)]
        dry_run: bool,
    },

    /// Show migration status (applied vs pending)
    Info {
        /// Accepted for symmetry; `info` never changes anything
        #[arg(long)]
        dry_run: bool,
    },
}

/// Invalid invocation, detected before any database work
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(String),

    #[error("Migrations directory not found: {}", .0.display())]
    MigrationsDirNotFound(PathBuf),
}

impl Cli {
    /// `env_logger` default filter for the requested verbosity
    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            "error"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Apply connection flags on top of file/environment settings
    pub fn merge_into(&self, mut settings: DatabaseConfig) -> DatabaseConfig {
        if let Some(host) = &self.host {
            settings.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        if self.database.is_some() {
            settings.name = self.database.clone();
        }
        if self.user.is_some() {
            settings.user = self.user.clone();
        }
        if self.password.is_some() {
            settings.password = self.password.clone();
        }
        settings
    }

    /// Load settings from `--config` and `DB_*`, then apply flags
    pub fn connection_config(&self) -> Result<ConnectionConfig, CliError> {
        let settings =
            DatabaseConfig::load_from(&self.config).map_err(|e| CliError::Config(e.to_string()))?;
        self.merge_into(settings)
            .into_connection_config()
            .map_err(|e| CliError::Config(e.to_string()))
    }

    /// Migrator for this invocation; scripts are recorded as run by `user`
    pub fn migrator(&self, user: &str, template_vars: TemplateVars) -> Result<Migrator, CliError> {
        if !self.migrations_dir.is_dir() {
            return Err(CliError::MigrationsDirNotFound(self.migrations_dir.clone()));
        }
        Ok(Migrator::new(&self.migrations_dir)
            .with_after_migrate_dir(&self.after_migrate_dir)
            .with_seeds_dir(&self.seeds_dir)
            .with_template_vars(template_vars)
            .applied_by(user))
    }
}

/// Template variables: the whole process environment
///
/// Variables whose name or value is not valid Unicode are skipped.
pub fn template_vars_from_env() -> TemplateVars {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect::<BTreeMap<_, _>>()
}
