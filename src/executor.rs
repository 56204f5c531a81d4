//! Executor Module
//!
//! Provides the [`SqlExecutor`] trait that abstracts script execution and
//! transaction control over `may_postgres`.
//!
//! Migration, seed and callback scripts are opaque to this crate: each file is
//! sent to the server as a single simple-query batch. Parameterized queries are
//! only used by the history ledger (see [`crate::migration::ledger`]).

use may_postgres::types::ToSql;
use may_postgres::{Client, Error as PostgresError, Row};
use std::time::Instant;
use thiserror::Error;

#[cfg(feature = "tracing")]
use tracing::debug_span;

/// Transport-level error type
#[derive(Debug, Error)]
pub enum TideError {
    /// `PostgreSQL` error from `may_postgres`
    #[error("PostgreSQL error: {0}")]
    PostgresError(#[from] PostgresError),
    /// Query execution error
    #[error("Query error: {0}")]
    QueryError(String),
    /// Row parsing/conversion error
    #[error("Parse error: {0}")]
    ParseError(String),
    /// Other execution errors
    #[error("Execution error: {0}")]
    Other(String),
}

/// Trait for executing scripts and controlling transactions
///
/// This is the slice of the database transport the runner needs: execute an
/// opaque script, and begin/commit/roll back the surrounding transaction.
/// Closing is handled by dropping the implementor.
pub trait SqlExecutor {
    /// Execute one or more statements as a single batch, without parameters
    ///
    /// # Errors
    ///
    /// Returns `TideError` if any statement in the batch fails. Statements run
    /// before the failing one are only undone if a transaction is open.
    fn batch_execute(&self, script: &str) -> Result<(), TideError>;

    /// Open a transaction
    fn begin(&self) -> Result<(), TideError>;

    /// Commit the open transaction
    fn commit(&self) -> Result<(), TideError>;

    /// Roll back the open transaction
    fn rollback(&self) -> Result<(), TideError>;
}

/// Implementation of `SqlExecutor` for `may_postgres::Client`
///
/// The executor exclusively owns its client; dropping it closes the connection.
pub struct PgExecutor {
    client: Client,
}

impl PgExecutor {
    /// Create a new executor from a `may_postgres::Client`
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Execute a parameterized statement and return the number of rows affected
    ///
    /// # Errors
    ///
    /// Returns `TideError` if the statement fails.
    pub fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, TideError> {
        #[cfg(feature = "tracing")]
        let _span = debug_span!("tidemark.execute", statement = %first_line(query)).entered();

        let start = Instant::now();
        let result = self.client.execute(query, params).map_err(TideError::from);
        log::trace!("execute took {:?}", start.elapsed());
        result
    }

    /// Execute a parameterized query and return all rows
    ///
    /// # Errors
    ///
    /// Returns `TideError` if the query fails.
    pub fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, TideError> {
        #[cfg(feature = "tracing")]
        let _span = debug_span!("tidemark.query", statement = %first_line(query)).entered();

        let start = Instant::now();
        let result = self.client.query(query, params).map_err(TideError::from);
        log::trace!("query took {:?}", start.elapsed());
        result
    }
}

impl SqlExecutor for PgExecutor {
    fn batch_execute(&self, script: &str) -> Result<(), TideError> {
        #[cfg(feature = "tracing")]
        let _span = debug_span!("tidemark.batch_execute", bytes = script.len()).entered();

        self.client.batch_execute(script).map_err(TideError::from)
    }

    fn begin(&self) -> Result<(), TideError> {
        self.execute("BEGIN", &[]).map(|_| ())
    }

    fn commit(&self) -> Result<(), TideError> {
        self.execute("COMMIT", &[]).map(|_| ())
    }

    fn rollback(&self) -> Result<(), TideError> {
        self.execute("ROLLBACK", &[]).map(|_| ())
    }
}

#[cfg(feature = "tracing")]
fn first_line(query: &str) -> &str {
    query.trim_start().lines().next().unwrap_or_default()
}
