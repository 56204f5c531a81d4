//! Migration system for Tidemark
//!
//! Versioned SQL scripts applied in file-name order and recorded in an
//! append-only history ledger:
//! - discovery and checksums of `.sql` files
//! - `${NAME}` template rendering
//! - the `schema_migrations` ledger
//! - `migrate`, `seed` and `info`, plus afterMigrate callbacks
//!
//! # Example
//!
//! ```rust,no_run
//! use tidemark::migration::{Migrator, TemplateVars};
//! use tidemark::{ConnectionConfig, PgConnector};
//!
//! let connector = PgConnector::new(ConnectionConfig {
//!     host: "localhost".to_string(),
//!     port: 5432,
//!     database: "app".to_string(),
//!     user: "postgres".to_string(),
//!     password: "secret".to_string(),
//! });
//!
//! let migrator = Migrator::new("migrations")
//!     .with_after_migrate_dir("afterMigrate")
//!     .with_template_vars(TemplateVars::from([("SCHEMA".to_string(), "app".to_string())]))
//!     .applied_by("postgres");
//!
//! let report = migrator.migrate(&connector, false)?;
//! println!("applied {} migration(s)", report.applied_count());
//! # Ok::<(), tidemark::migration::MigrationError>(())
//! ```

pub mod callback;
pub mod checksum;
pub mod error;
pub mod file;
pub mod ledger;
pub mod migrator;
pub mod record;
pub mod report;
mod script;
mod seed;
pub mod status;
pub mod template;

#[cfg(test)]
pub(crate) mod testing;

pub use checksum::{calculate_checksum, checksum_bytes, checksums_match};
pub use error::MigrationError;
pub use file::{discover_migrations, MigrationDescriptor};
pub use ledger::{HistoryLedger, SCHEMA_TABLE};
pub use migrator::{plan_migrations, MigrationPlan, Migrator};
pub use record::{LedgerEntry, NewLedgerEntry};
pub use report::{
    AppliedMigration, CallbackOutcome, ChecksumDrift, ExecutedSeed, MigrateReport, ScriptPreview,
    SeedReport,
};
pub use status::MigrationStatus;
pub use template::{render, Preview, TemplateVars, PREVIEW_CHARS};
