//! Migrator - Core migration execution engine

use crate::connection::Connector;
use crate::executor::SqlExecutor;
use crate::migration::callback::{discover_callbacks, run_callbacks};
use crate::migration::checksum::checksums_match;
use crate::migration::file::{discover_migrations, read_script, script_name};
use crate::migration::ledger::HistoryLedger;
use crate::migration::script::elapsed_millis;
use crate::migration::template::{preview, render, TemplateVars, PREVIEW_CHARS};
use crate::migration::{
    AppliedMigration, ChecksumDrift, LedgerEntry, MigrateReport, MigrationDescriptor,
    MigrationError, MigrationStatus, NewLedgerEntry, ScriptPreview,
};
use crate::transaction::Transaction;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[cfg(feature = "tracing")]
use tracing::info_span;

/// Core migration execution engine
///
/// The `Migrator` owns no connection. Each command (`migrate`, `seed`, `info`)
/// obtains one from a [`Connector`], uses it exclusively, and drops it before
/// returning, on success and on every error path.
#[derive(Debug, Clone)]
pub struct Migrator {
    migrations_dir: PathBuf,
    after_migrate_dir: Option<PathBuf>,
    seeds_dir: Option<PathBuf>,
    template_vars: TemplateVars,
    applied_by: Option<String>,
}

/// Classification of on-disk migrations against the ledger
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationPlan {
    /// Not in the ledger, in application order
    pub pending: Vec<MigrationDescriptor>,
    /// In the ledger with a matching checksum
    pub skipped: Vec<String>,
    /// In the ledger (applied or failed) with a different checksum; never re-applied
    pub drifted: Vec<ChecksumDrift>,
    /// In the ledger as a failed attempt
    pub previously_failed: Vec<String>,
    /// In the ledger but missing on disk
    pub orphaned: Vec<String>,
}

/// Split `migrations` (already in file-name order) into pending and applied
///
/// Pending is exactly the on-disk migrations whose name has no ledger row.
pub fn plan_migrations(migrations: Vec<MigrationDescriptor>, applied: &[LedgerEntry]) -> MigrationPlan {
    let by_script: HashMap<&str, &LedgerEntry> =
        applied.iter().map(|e| (e.script.as_str(), e)).collect();

    let mut plan = MigrationPlan::default();
    for migration in &migrations {
        let Some(entry) = by_script.get(migration.name.as_str()) else {
            continue;
        };
        let unchanged = checksums_match(&entry.checksum, &migration.checksum);
        if !unchanged {
            plan.drifted.push(ChecksumDrift {
                script: migration.name.clone(),
                applied_checksum: entry.checksum.clone(),
                current_checksum: migration.checksum.clone(),
            });
        }
        if !entry.success {
            plan.previously_failed.push(migration.name.clone());
        } else if unchanged {
            plan.skipped.push(migration.name.clone());
        }
    }

    let on_disk: HashSet<&str> =
        migrations.iter().map(|m| m.name.as_str()).collect();
    plan.orphaned = applied
        .iter()
        .filter(|e| !on_disk.contains(e.script.as_str()))
        .map(|e| e.script.clone())
        .collect();

    plan.pending = migrations
        .into_iter()
        .filter(|m| !by_script.contains_key(m.name.as_str()))
        .collect();

    plan
}

impl Migrator {
    /// Create a new Migrator with the specified migrations directory
    pub fn new(migrations_dir: impl AsRef<Path>) -> Self {
        Self {
            migrations_dir: migrations_dir.as_ref().to_path_buf(),
            after_migrate_dir: None,
            seeds_dir: None,
            template_vars: TemplateVars::new(),
            applied_by: None,
        }
    }

    /// Directory of afterMigrate callback scripts
    #[must_use]
    pub fn with_after_migrate_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.after_migrate_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Directory of seed scripts
    #[must_use]
    pub fn with_seeds_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.seeds_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Variables substituted into `${NAME}` placeholders
    #[must_use]
    pub fn with_template_vars(mut self, vars: TemplateVars) -> Self {
        self.template_vars = vars;
        self
    }

    /// Identity recorded as `installed_by` in the ledger
    ///
    /// Defaults to the role the connector logs in as.
    #[must_use]
    pub fn applied_by(mut self, identity: impl Into<String>) -> Self {
        self.applied_by = Some(identity.into());
        self
    }

    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    pub(crate) fn seeds_dir(&self) -> Option<&Path> {
        self.seeds_dir.as_deref()
    }

    pub(crate) fn template_vars(&self) -> &TemplateVars {
        &self.template_vars
    }

    /// Discover all migration files in the migrations directory
    pub fn discover_migrations(&self) -> Result<Vec<MigrationDescriptor>, MigrationError> {
        discover_migrations(&self.migrations_dir)
    }

    /// Apply pending migrations, then afterMigrate callbacks
    ///
    /// In dry-run mode nothing is created, executed or recorded: pending
    /// migrations and the callbacks that would follow are rendered into the
    /// report instead.
    ///
    /// # Errors
    ///
    /// - `Connection` if the server cannot be reached; nothing has been changed.
    /// - `ExecutionFailed` if a migration fails. It has been rolled back and
    ///   recorded as a failed attempt, and no later migration was attempted.
    /// - `Database` if the ledger cannot be read or written.
    pub fn migrate<C: Connector>(&self, connector: &C, dry_run: bool) -> Result<MigrateReport, MigrationError> {
        log::info!(
            "Starting migration from {}{}",
            self.migrations_dir.display(),
            if dry_run { " (dry run)" } else { "" }
        );
        let migrations = self.discover_migrations()?;
        let mut report = MigrateReport::new(dry_run);

        if dry_run {
            if !connector.database_exists()? {
                log::info!("Target database does not exist yet; every migration is pending");
                let plan = plan_migrations(migrations, &[]);
                self.preview_run(&plan, true, &mut report)?;
                return Ok(report);
            }
        } else {
            report.database_created = connector.ensure_database()?;
        }

        let conn = connector.connect()?;
        let applied = if dry_run {
            if conn.ledger_exists()? {
                conn.list_applied()?
            } else {
                Vec::new()
            }
        } else {
            conn.ensure_schema()?;
            conn.list_applied()?
        };

        let plan = plan_migrations(migrations, &applied);
        log_plan(&plan);
        report.skipped = plan.skipped.clone();
        report.drifted = plan.drifted.clone();
        report.previously_failed = plan.previously_failed.clone();

        if dry_run {
            self.preview_run(&plan, false, &mut report)?;
            return Ok(report);
        }

        if plan.pending.is_empty() {
            log::info!("No pending migrations. Database is up to date");
        } else {
            log::info!("Found {} pending migration(s)", plan.pending.len());
        }

        let applied_by = self.applied_by.as_deref().unwrap_or(connector.user());
        for migration in &plan.pending {
            let done = self.apply_migration(&conn, migration, applied_by, report.applied.len())?;
            report.applied.push(done);
        }

        if should_run_callbacks(report.applied.len(), report.database_created) {
            // Migrations are committed at this point; a broken callback
            // directory is reported like a failing callback.
            match discover_callbacks(self.after_migrate_dir.as_deref()) {
                Ok(scripts) => {
                    report.callbacks = run_callbacks(&conn, &scripts, &self.template_vars);
                }
                Err(e) => log::error!("Skipping afterMigrate scripts: {e}"),
            }
        }

        log::info!("Successfully applied {} migration(s)", report.applied.len());
        Ok(report)
    }

    /// Fill dry-run previews for `plan` and the callbacks that would follow it
    fn preview_run(
        &self,
        plan: &MigrationPlan,
        database_would_be_created: bool,
        report: &mut MigrateReport,
    ) -> Result<(), MigrationError> {
        for migration in &plan.pending {
            let sql = migration.read_verified_sql()?;
            log::info!("[DRY RUN] Would apply {}", migration.name);
            report.previews.push(self.preview_script(&migration.name, &sql));
        }

        if should_run_callbacks(plan.pending.len(), database_would_be_created) {
            for path in discover_callbacks(self.after_migrate_dir.as_deref())? {
                let script = script_name(&path)?;
                let sql = read_script(&path)?;
                log::info!("[DRY RUN] Would execute afterMigrate script {script}");
                report.callback_previews.push(self.preview_script(&script, &sql));
            }
        }
        Ok(())
    }

    pub(crate) fn preview_script(&self, script: &str, sql: &str) -> ScriptPreview {
        let rendered = render(sql, &self.template_vars);
        log::debug!("[DRY RUN] {script}:\n{rendered}");
        ScriptPreview {
            script: script.to_string(),
            preview: preview(&rendered, PREVIEW_CHARS),
        }
    }

    /// Apply one migration and record the attempt
    ///
    /// Success: script and `success = true` ledger row commit together.
    /// Failure anywhere up to and including `COMMIT`: the transaction is rolled
    /// back, then a `success = false` row is committed in a fresh transaction.
    fn apply_migration<E>(
        &self,
        conn: &E,
        migration: &MigrationDescriptor,
        applied_by: &str,
        applied_so_far: usize,
    ) -> Result<AppliedMigration, MigrationError>
    where
        E: SqlExecutor + HistoryLedger,
    {
        #[cfg(feature = "tracing")]
        let _span = info_span!("tidemark.apply", script = %migration.name).entered();

        log::info!("Applying migration: {} ({})", migration.description, migration.name);
        let sql = migration.read_verified_sql()?;
        let rendered = render(&sql, &self.template_vars);

        let start = Instant::now();
        let tx = Transaction::begin(conn)?;
        let executed = tx.batch_execute(&rendered).and_then(|()| {
            tx.executor().record_attempt(&NewLedgerEntry::attempt(
                migration,
                applied_by,
                elapsed_millis(start),
                true,
            ))
        });
        // COMMIT can still fail (deferred constraints); the server has then
        // already discarded the transaction.
        let outcome = match executed {
            Ok(()) => tx.commit(),
            Err(e) => {
                if let Err(rollback) = tx.rollback() {
                    log::error!("Rollback of {} failed: {rollback}", migration.name);
                }
                Err(e)
            }
        };
        let duration_millis = elapsed_millis(start);

        match outcome {
            Ok(()) => {
                log::info!("Migration {} applied ({}ms)", migration.name, duration_millis);
                Ok(AppliedMigration {
                    script: migration.name.clone(),
                    description: migration.description.clone(),
                    duration_millis,
                })
            }
            Err(source) => {
                log::error!("Migration {} failed: {source}", migration.name);

                let record = Transaction::begin(conn)?;
                record.executor().record_attempt(&NewLedgerEntry::attempt(
                    migration,
                    applied_by,
                    duration_millis,
                    false,
                ))?;
                record.commit()?;

                Err(MigrationError::ExecutionFailed {
                    script: migration.name.clone(),
                    applied: applied_so_far,
                    source,
                })
            }
        }
    }

    /// Get migration status (applied vs pending)
    ///
    /// Read-only: the ledger table is not created if it is missing.
    pub fn info<C: Connector>(&self, connector: &C) -> Result<MigrationStatus, MigrationError> {
        let migrations = self.discover_migrations()?;
        let conn = connector.connect()?;
        let applied = if conn.ledger_exists()? {
            conn.list_applied()?
        } else {
            Vec::new()
        };

        let plan = plan_migrations(migrations, &applied);
        log_plan(&plan);
        Ok(MigrationStatus {
            applied,
            pending: plan.pending,
            drifted: plan.drifted,
            orphaned: plan.orphaned,
        })
    }
}

/// afterMigrate runs when this run applied something, or when nothing was
/// pending against a database that already existed
fn should_run_callbacks(applied: usize, database_created: bool) -> bool {
    applied > 0 || !database_created
}

fn log_plan(plan: &MigrationPlan) {
    for drift in &plan.drifted {
        log::warn!(
            "Checksum mismatch for migration {} (applied: {}, current: {}). \
             Migration files should not be modified after being applied!",
            drift.script,
            drift.applied_checksum,
            drift.current_checksum
        );
    }
    for script in &plan.previously_failed {
        log::warn!(
            "Migration {script} is recorded as failed; it will not be retried until the ledger is repaired manually"
        );
    }
    for script in &plan.orphaned {
        log::debug!("Ledger entry {script} has no file on disk");
    }
}
