//! Migration status as reported by `info`

use crate::migration::{ChecksumDrift, LedgerEntry, MigrationDescriptor};

/// Applied vs pending migrations for one database
#[derive(Debug, Clone, Default)]
pub struct MigrationStatus {
    /// Every ledger row, ordered by rank (failed attempts included)
    pub applied: Vec<LedgerEntry>,

    /// On-disk migrations with no ledger row, in application order
    pub pending: Vec<MigrationDescriptor>,

    /// Applied migrations whose file changed since
    pub drifted: Vec<ChecksumDrift>,

    /// Ledger rows whose file is no longer on disk
    pub orphaned: Vec<String>,
}

impl MigrationStatus {
    #[must_use]
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Check if all migrations are applied
    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }

    /// Ledger rows recording a failed attempt
    pub fn failed(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.applied.iter().filter(|e| !e.success)
    }

    /// The most recently applied entry (highest rank)
    #[must_use]
    pub fn latest_applied(&self) -> Option<&LedgerEntry> {
        self.applied.iter().max_by_key(|e| e.rank)
    }

    /// The next migration `migrate` would apply
    #[must_use]
    pub fn next_pending(&self) -> Option<&MigrationDescriptor> {
        self.pending.first()
    }
}
