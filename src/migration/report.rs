//! Outcomes of `migrate` and `seed` runs

use crate::migration::template::Preview;

/// An already-applied migration whose file no longer matches the ledger
///
/// Drift is a warning: the migration stays applied and is not re-executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumDrift {
    pub script: String,
    /// Checksum recorded when the migration was applied
    pub applied_checksum: String,
    /// Checksum of the file on disk now
    pub current_checksum: String,
}

/// A migration applied and committed by this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub script: String,
    pub description: String,
    pub duration_millis: i32,
}

/// Rendered script shown instead of executed during a dry run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptPreview {
    pub script: String,
    pub preview: Preview,
}

/// Result of one afterMigrate script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Succeeded { script: String, duration_millis: i32 },
    /// Rolled back; does not fail the run
    Failed { script: String, error: String },
}

impl CallbackOutcome {
    pub fn script(&self) -> &str {
        match self {
            CallbackOutcome::Succeeded { script, .. } | CallbackOutcome::Failed { script, .. } => script,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CallbackOutcome::Succeeded { .. })
    }
}

/// Everything a successful `migrate` did (or, in dry-run mode, would do)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrateReport {
    pub dry_run: bool,
    /// Target database was created by this run
    pub database_created: bool,
    pub applied: Vec<AppliedMigration>,
    /// Already applied with a matching checksum
    pub skipped: Vec<String>,
    pub drifted: Vec<ChecksumDrift>,
    /// In the ledger with `success = false`; never retried automatically
    pub previously_failed: Vec<String>,
    /// Dry run only: pending migrations, rendered
    pub previews: Vec<ScriptPreview>,
    /// Dry run only: afterMigrate scripts that would run, rendered
    pub callback_previews: Vec<ScriptPreview>,
    pub callbacks: Vec<CallbackOutcome>,
}

impl MigrateReport {
    pub(crate) fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    /// Number of migrations applied, or previewed in a dry run
    pub fn applied_count(&self) -> usize {
        if self.dry_run {
            self.previews.len()
        } else {
            self.applied.len()
        }
    }

    pub fn is_up_to_date(&self) -> bool {
        self.applied_count() == 0
    }
}

/// A seed script committed by this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedSeed {
    pub script: String,
    pub duration_millis: i32,
}

/// Everything a successful `seed` did (or, in dry-run mode, would do)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub dry_run: bool,
    pub executed: Vec<ExecutedSeed>,
    pub previews: Vec<ScriptPreview>,
}
