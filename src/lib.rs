//! # Tidemark
//!
//! Versioned SQL migrations for PostgreSQL over `may_postgres`.
//!
//! Scripts in a migrations directory are applied once each, in file-name
//! order, and recorded in the `schema_migrations` history ledger. Seed scripts
//! and afterMigrate callbacks run alongside. See [`migration`] for the engine
//! and the `tidemark-migrate` binary for the command-line front end.

pub mod config;
pub mod connection;
pub mod executor;
pub mod migration;
pub mod transaction;

pub use crate::config::DatabaseConfig;
pub use connection::{connect, ConnectionConfig, ConnectionError, Connector, PgConnector};
pub use executor::{PgExecutor, SqlExecutor, TideError};
pub use migration::{MigrateReport, MigrationError, MigrationStatus, Migrator, SeedReport};
pub use transaction::Transaction;
