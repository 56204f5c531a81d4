//! afterMigrate callback scripts
//!
//! Callbacks run after a `migrate` that changed (or could have changed) the
//! schema. They are not ledgered: each script runs in its own transaction, and
//! a failing one is rolled back and reported without stopping the others.

use crate::executor::SqlExecutor;
use crate::migration::file::{discover_scripts, read_script, script_name};
use crate::migration::script::execute_transactional;
use crate::migration::template::{render, TemplateVars};
use crate::migration::{CallbackOutcome, MigrationError};
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::info_span;

/// afterMigrate scripts in execution order; a missing or unset directory means none
pub fn discover_callbacks(dir: Option<&Path>) -> Result<Vec<PathBuf>, MigrationError> {
    match dir {
        Some(dir) if dir.is_dir() => discover_scripts(dir),
        Some(dir) => {
            log::debug!("afterMigrate directory {} not found; no callbacks", dir.display());
            Ok(Vec::new())
        }
        None => Ok(Vec::new()),
    }
}

/// Execute every script in `scripts`, isolating failures
pub fn run_callbacks<E>(executor: &E, scripts: &[PathBuf], vars: &TemplateVars) -> Vec<CallbackOutcome>
where
    E: SqlExecutor + ?Sized,
{
    if !scripts.is_empty() {
        log::info!("Running {} afterMigrate script(s)", scripts.len());
    }
    scripts
        .iter()
        .map(|path| run_callback(executor, path, vars))
        .collect()
}

fn run_callback<E>(executor: &E, path: &Path, vars: &TemplateVars) -> CallbackOutcome
where
    E: SqlExecutor + ?Sized,
{
    let script = script_name(path).unwrap_or_else(|_| path.display().to_string());

    #[cfg(feature = "tracing")]
    let _span = info_span!("tidemark.callback", script = %script).entered();

    let sql = match read_script(path) {
        Ok(sql) => sql,
        Err(e) => {
            log::warn!("afterMigrate script {script} could not be read: {e}");
            return CallbackOutcome::Failed {
                script,
                error: e.to_string(),
            };
        }
    };

    match execute_transactional(executor, &render(&sql, vars)) {
        Ok(duration_millis) => {
            log::info!("afterMigrate script {script} executed ({duration_millis}ms)");
            CallbackOutcome::Succeeded {
                script,
                duration_millis,
            }
        }
        Err(e) => {
            log::warn!("afterMigrate script {script} failed and was rolled back: {e}");
            CallbackOutcome::Failed {
                script,
                error: e.to_string(),
            }
        }
    }
}
