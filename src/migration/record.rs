//! `LedgerEntry` - Represents rows of the `schema_migrations` ledger table

use crate::executor::TideError;
use crate::migration::MigrationDescriptor;
use chrono::NaiveDateTime;

/// One apply attempt recorded in the ledger
///
/// Rows are append-only: created by the migrator's apply step, never updated
/// or deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Ledger-assigned, monotonically increasing; the authoritative apply order
    pub rank: i32,

    /// Script file name (unique across the ledger)
    pub script: String,

    pub description: String,

    /// MD5 of the script at apply time
    pub checksum: String,

    /// Database user that applied the script
    pub applied_by: String,

    /// When the row was inserted (database clock)
    pub applied_at: NaiveDateTime,

    /// Wall-clock execution time of the script
    pub duration_millis: i32,

    /// Whether the script committed without error
    pub success: bool,
}

/// The caller-supplied part of a ledger row; rank and timestamp come from the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub script: String,
    pub description: String,
    pub checksum: String,
    pub applied_by: String,
    pub duration_millis: i32,
    pub success: bool,
}

impl NewLedgerEntry {
    /// Entry for an attempt to apply `migration`
    #[must_use]
    pub fn attempt(
        migration: &MigrationDescriptor,
        applied_by: &str,
        duration_millis: i32,
        success: bool,
    ) -> Self {
        Self {
            script: migration.name.clone(),
            description: migration.description.clone(),
            checksum: migration.checksum.clone(),
            applied_by: applied_by.to_string(),
            duration_millis,
            success,
        }
    }
}

impl LedgerEntry {
    /// Create a `LedgerEntry` from a ledger row
    ///
    /// Expected column order: `installed_rank`, `script`, `description`,
    /// `checksum`, `installed_by`, `installed_on` (as text), `execution_time`,
    /// `success`
    ///
    /// # Errors
    ///
    /// Returns `TideError::ParseError` if a column has an unexpected type or the
    /// timestamp text cannot be parsed.
    pub fn from_row(row: &may_postgres::Row) -> Result<Self, TideError> {
        let applied_at_str: String = get(row, 5)?;
        Ok(Self {
            rank: get(row, 0)?,
            script: get(row, 1)?,
            description: get(row, 2)?,
            checksum: get(row, 3)?,
            applied_by: get(row, 4)?,
            applied_at: parse_timestamp(&applied_at_str)?,
            duration_millis: get(row, 6)?,
            success: get(row, 7)?,
        })
    }
}

fn get<'a, T>(row: &'a may_postgres::Row, idx: usize) -> Result<T, TideError>
where
    T: may_postgres::types::FromSql<'a>,
{
    row.try_get(idx)
        .map_err(|e| TideError::ParseError(format!("ledger column {idx}: {e}")))
}

/// Parse a ledger timestamp rendered as text
pub(crate) fn parse_timestamp(value: &str) -> Result<NaiveDateTime, TideError> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .ok_or_else(|| {
            TideError::ParseError(format!("Failed to parse timestamp '{value}': unrecognized format"))
        })
}
