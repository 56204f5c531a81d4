//! Running one rendered script in its own transaction

use crate::executor::{SqlExecutor, TideError};
use crate::transaction::Transaction;
use std::time::Instant;

/// Milliseconds since `start`, saturating at `i32::MAX` (the ledger column type)
pub(crate) fn elapsed_millis(start: Instant) -> i32 {
    i32::try_from(start.elapsed().as_millis()).unwrap_or(i32::MAX)
}

/// Execute `sql` inside a fresh transaction: commit on success, roll back on failure
///
/// Returns the execution time in milliseconds. Used for seeds and afterMigrate
/// scripts; migrations need the ledger write inside the same transaction and
/// drive [`Transaction`] themselves.
pub(crate) fn execute_transactional<E>(executor: &E, sql: &str) -> Result<i32, TideError>
where
    E: SqlExecutor + ?Sized,
{
    let start = Instant::now();
    let tx = Transaction::begin(executor)?;
    match tx.batch_execute(sql) {
        Ok(()) => {
            let millis = elapsed_millis(start);
            tx.commit()?;
            Ok(millis)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback() {
                log::error!("Rollback failed after script error: {rollback_err}");
            }
            Err(e)
        }
    }
}
