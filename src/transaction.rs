//! Transaction Module
//!
//! Scoped transaction over any [`SqlExecutor`]. Every migration, seed and
//! callback script runs inside one of these.
//!
//! A transaction that is dropped without an explicit [`Transaction::commit`]
//! or [`Transaction::rollback`] is rolled back, so an early return or `?`
//! never leaves a half-applied script open on the connection.

use crate::executor::{SqlExecutor, TideError};

/// A database transaction bound to one executor
///
/// # Examples
///
/// ```no_run
/// use tidemark::{connect, PgExecutor, SqlExecutor, Transaction, TideError};
///
/// # fn main() -> Result<(), TideError> {
/// let client = connect("host=localhost user=postgres password=secret dbname=mydb")
///     .map_err(|e| TideError::Other(format!("Connection error: {e}")))?;
/// let executor = PgExecutor::new(client);
///
/// let tx = Transaction::begin(&executor)?;
/// tx.batch_execute("CREATE TABLE t (id INT); INSERT INTO t VALUES (1);")?;
/// tx.commit()?;
/// # Ok(())
/// # }
/// ```
pub struct Transaction<'a, E: SqlExecutor + ?Sized> {
    executor: &'a E,
    closed: bool,
}

impl<'a, E: SqlExecutor + ?Sized> Transaction<'a, E> {
    /// Start a new transaction on `executor`
    ///
    /// # Errors
    ///
    /// Returns `TideError` if `BEGIN` fails.
    pub fn begin(executor: &'a E) -> Result<Self, TideError> {
        executor.begin()?;
        Ok(Self {
            executor,
            closed: false,
        })
    }

    /// Execute a script inside this transaction
    ///
    /// # Errors
    ///
    /// Returns `TideError` if the script fails. The transaction stays open and
    /// must be rolled back (explicitly or by drop).
    pub fn batch_execute(&self, script: &str) -> Result<(), TideError> {
        self.executor.batch_execute(script)
    }

    /// The executor this transaction runs on, for ledger writes that must share it
    pub fn executor(&self) -> &'a E {
        self.executor
    }

    /// Commit the transaction
    ///
    /// # Errors
    ///
    /// Returns `TideError` if `COMMIT` fails.
    pub fn commit(mut self) -> Result<(), TideError> {
        self.closed = true;
        self.executor.commit()
    }

    /// Roll back the transaction
    ///
    /// # Errors
    ///
    /// Returns `TideError` if `ROLLBACK` fails.
    pub fn rollback(mut self) -> Result<(), TideError> {
        self.closed = true;
        self.executor.rollback()
    }
}

impl<E: SqlExecutor + ?Sized> Drop for Transaction<'_, E> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.executor.rollback() {
                log::warn!("Rollback of abandoned transaction failed: {e}");
            }
        }
    }
}
