//! History ledger: the `schema_migrations` table
//!
//! Only the migrator reads or writes the ledger. There is no
//! update or delete: a row, once written, is the audit record of that attempt.

use crate::executor::{PgExecutor, TideError};
use crate::migration::record::{LedgerEntry, NewLedgerEntry};

#[cfg(feature = "tracing")]
use tracing::debug_span;

/// Name of the ledger table
pub const SCHEMA_TABLE: &str = "schema_migrations";

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS schema_migrations (
        installed_rank SERIAL PRIMARY KEY,
        script VARCHAR(1000) NOT NULL UNIQUE,
        description VARCHAR(200) NOT NULL,
        checksum VARCHAR(32) NOT NULL,
        installed_by VARCHAR(100) NOT NULL,
        installed_on TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        execution_time INTEGER NOT NULL,
        success BOOLEAN NOT NULL
    )
"#;

const EXISTS_SQL: &str = r#"
    SELECT EXISTS (
        SELECT FROM information_schema.tables
        WHERE table_schema = current_schema()
        AND table_name::text = $1
    )
"#;

const LIST_SQL: &str = r#"
    SELECT installed_rank, script, description, checksum, installed_by,
           to_char(installed_on, 'YYYY-MM-DD HH24:MI:SS.US'), execution_time, success
    FROM schema_migrations
    ORDER BY installed_rank ASC
"#;

const INSERT_SQL: &str = r#"
    INSERT INTO schema_migrations
        (script, description, checksum, installed_by, execution_time, success)
    VALUES ($1, $2, $3, $4, $5, $6)
"#;

/// Persistent, append-only record of migration attempts
///
/// Implemented by the working connection so ledger writes share the
/// connection (and the open transaction) of the script they describe.
pub trait HistoryLedger {
    /// Create the ledger table if it is absent; safe to call on every run
    fn ensure_schema(&self) -> Result<(), TideError>;

    /// Whether the ledger table exists, without creating it
    fn ledger_exists(&self) -> Result<bool, TideError>;

    /// All entries, ordered by rank ascending
    fn list_applied(&self) -> Result<Vec<LedgerEntry>, TideError>;

    /// Insert exactly one row for an apply attempt
    fn record_attempt(&self, entry: &NewLedgerEntry) -> Result<(), TideError>;
}

impl HistoryLedger for PgExecutor {
    fn ensure_schema(&self) -> Result<(), TideError> {
        self.execute(CREATE_TABLE_SQL, &[])?;
        Ok(())
    }

    fn ledger_exists(&self) -> Result<bool, TideError> {
        let rows = self.query_all(EXISTS_SQL, &[&SCHEMA_TABLE])?;
        match rows.first() {
            Some(row) => row
                .try_get(0)
                .map_err(|e| TideError::ParseError(format!("ledger existence check: {e}"))),
            None => Ok(false),
        }
    }

    fn list_applied(&self) -> Result<Vec<LedgerEntry>, TideError> {
        let rows = self.query_all(LIST_SQL, &[])?;
        log::debug!("Loaded {} ledger row(s) from {}", rows.len(), SCHEMA_TABLE);
        rows.iter().map(LedgerEntry::from_row).collect()
    }

    fn record_attempt(&self, entry: &NewLedgerEntry) -> Result<(), TideError> {
        #[cfg(feature = "tracing")]
        let _span = debug_span!("tidemark.ledger.record", script = %entry.script, success = entry.success).entered();

        self.execute(
            INSERT_SQL,
            &[
                &entry.script,
                &entry.description,
                &entry.checksum,
                &entry.applied_by,
                &entry.duration_millis,
                &entry.success,
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_target_ledger_table() {
        for sql in [CREATE_TABLE_SQL, LIST_SQL, INSERT_SQL] {
            assert!(sql.contains(SCHEMA_TABLE), "{sql}");
        }
    }

    #[test]
    fn test_create_table_is_idempotent_and_keyed() {
        assert!(CREATE_TABLE_SQL.contains("IF NOT EXISTS"));
        assert!(CREATE_TABLE_SQL.contains("script VARCHAR(1000) NOT NULL UNIQUE"));
        assert!(CREATE_TABLE_SQL.contains("installed_rank SERIAL PRIMARY KEY"));
    }

    #[test]
    fn test_list_orders_by_rank() {
        assert!(LIST_SQL.contains("ORDER BY installed_rank ASC"));
    }

    #[test]
    fn test_insert_binds_six_parameters() {
        assert!(INSERT_SQL.contains("$6"));
        assert!(!INSERT_SQL.contains("$7"));
    }
}
