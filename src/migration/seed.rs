//! Seed scripts
//!
//! Seeds are data scripts run on demand. Unlike migrations they are not
//! ledgered, so every `seed` invocation runs every file again.

use crate::connection::Connector;
use crate::migration::file::{discover_scripts, read_script, script_name};
use crate::migration::script::execute_transactional;
use crate::migration::template::render;
use crate::migration::{ExecutedSeed, MigrationError, Migrator, SeedReport};

#[cfg(feature = "tracing")]
use tracing::info_span;

impl Migrator {
    /// Run every seed script in file-name order, each in its own transaction
    ///
    /// # Errors
    ///
    /// - `DirectoryNotFound` if no seeds directory is configured or it is missing.
    /// - `SeedFailed` on the first failing script. Seeds before it stay
    ///   committed; later seeds are not attempted.
    pub fn seed<C: Connector>(&self, connector: &C, dry_run: bool) -> Result<SeedReport, MigrationError> {
        let dir = self
            .seeds_dir()
            .ok_or_else(|| MigrationError::DirectoryNotFound("seeds".into()))?;
        let scripts = discover_scripts(dir)?;
        let mut report = SeedReport {
            dry_run,
            ..Default::default()
        };

        if scripts.is_empty() {
            log::warn!("No seed files found in {}", dir.display());
            return Ok(report);
        }
        log::info!("Found {} seed file(s) in {}", scripts.len(), dir.display());

        if dry_run {
            for path in &scripts {
                let script = script_name(path)?;
                let sql = read_script(path)?;
                log::info!("[DRY RUN] Would execute seed {script}");
                report.previews.push(self.preview_script(&script, &sql));
            }
            return Ok(report);
        }

        let conn = connector.connect()?;
        for path in &scripts {
            let script = script_name(path)?;

            #[cfg(feature = "tracing")]
            let _span = info_span!("tidemark.seed", script = %script).entered();

            let sql = read_script(path)?;
            let rendered = render(&sql, self.template_vars());
            log::info!("Executing seed: {script}");
            match execute_transactional(&conn, &rendered) {
                Ok(duration_millis) => {
                    log::info!("Seed {script} executed ({duration_millis}ms)");
                    report.executed.push(ExecutedSeed {
                        script,
                        duration_millis,
                    });
                }
                Err(source) => {
                    log::error!("Seed {script} failed: {source}");
                    return Err(MigrationError::SeedFailed {
                        script,
                        executed: report.executed.len(),
                        source,
                    });
                }
            }
        }

        log::info!("Successfully executed {} seed file(s)", report.executed.len());
        Ok(report)
    }
}
