//! Migration-specific error types

use crate::connection::ConnectionError;
use crate::executor::TideError;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal conditions of a `migrate`, `seed` or `info` command
///
/// Non-fatal conditions (checksum drift, failed afterMigrate scripts) are not
/// errors: they are reported in [`crate::migration::MigrateReport`] and logged.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Migration file name does not end in `.sql`
    #[error("Invalid migration filename: {0}. Expected .sql extension")]
    InvalidFilename(String),

    /// Scripts directory is missing or not a directory
    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// Reading a script from disk failed
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Migration file changed between discovery and execution
    #[error(
        "Migration '{script}' changed on disk while the run was in progress \
         (checksum {expected} at discovery, {actual} at execution)"
    )]
    ModifiedDuringRun {
        script: String,
        expected: String,
        actual: String,
    },

    /// Could not reach or provision the target database
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Ledger or transaction-control failure outside a script body
    #[error("Database error: {0}")]
    Database(#[from] TideError),

    /// A migration script failed; later migrations were not attempted
    #[error("Migration '{script}' failed ({applied} migration(s) applied before it in this run): {source}")]
    ExecutionFailed {
        script: String,
        applied: usize,
        #[source]
        source: TideError,
    },

    /// A seed script failed; later seeds were not attempted
    #[error("Seed '{script}' failed ({executed} seed file(s) committed before it): {source}")]
    SeedFailed {
        script: String,
        executed: usize,
        #[source]
        source: TideError,
    },
}

impl MigrationError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MigrationError::Io {
            path: path.into(),
            source,
        }
    }
}
