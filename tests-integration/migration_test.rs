//! Integration tests for the migration system
//!
//! These tests run against a real PostgreSQL server. They are skipped unless
//! `TIDEMARK_TEST_DB` is set; its value is the prefix for the scratch databases
//! each test creates and drops. Server address and credentials come from the
//! usual `DB_HOST`, `DB_PORT`, `DB_USER` and `DB_PASSWORD` variables.
//!
//! Test flow:
//! 1. Write migration, afterMigrate and seed scripts to a temp directory
//! 2. Run migrate against a database that does not exist yet
//! 3. Verify the ledger and the resulting schema
//! 4. Re-run, seed, and check info

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use tidemark::connection::{quote_identifier, MAINTENANCE_DATABASE};
use tidemark::migration::{HistoryLedger, MigrationError, TemplateVars};
use tidemark::{connect, ConnectionConfig, Connector, DatabaseConfig, Migrator, PgConnector, PgExecutor, SqlExecutor};

/// Scratch database, dropped when the test finishes
struct ScratchDatabase {
    config: ConnectionConfig,
}

impl ScratchDatabase {
    fn create(suffix: &str) -> Option<Self> {
        let prefix = match std::env::var("TIDEMARK_TEST_DB") {
            Ok(prefix) if !prefix.is_empty() => prefix,
            _ => {
                eprintln!("TIDEMARK_TEST_DB not set; skipping integration test");
                return None;
            }
        };

        let mut settings = DatabaseConfig::load().expect("DB_* settings");
        settings.name = Some(format!("{prefix}_{suffix}"));
        let config = settings.into_connection_config().expect("DB_USER and DB_PASSWORD must be set");

        let scratch = Self { config };
        scratch.drop_database();
        Some(scratch)
    }

    fn connector(&self) -> PgConnector {
        PgConnector::new(self.config.clone())
    }

    fn admin(&self) -> PgExecutor {
        let conn_str = self.config.connection_string_for(MAINTENANCE_DATABASE);
        PgExecutor::new(connect(&conn_str).expect("connect to maintenance database"))
    }

    fn drop_database(&self) {
        let sql = format!("DROP DATABASE IF EXISTS {}", quote_identifier(&self.config.database));
        if let Err(e) = self.admin().batch_execute(&sql) {
            eprintln!("Failed to drop {}: {e}", self.config.database);
        }
    }

    fn table_exists(&self, table: &str) -> bool {
        let exec = self.connector().connect().expect("connect");
        let rows = exec
            .query_all(
                "SELECT EXISTS (SELECT FROM information_schema.tables \
                 WHERE table_schema = 'public' AND table_name::text = $1)",
                &[&table],
            )
            .expect("query information_schema");
        rows[0].get(0)
    }

    fn count(&self, table: &str) -> i64 {
        let exec = self.connector().connect().expect("connect");
        let rows = exec
            .query_all(&format!("SELECT COUNT(*) FROM {}", quote_identifier(table)), &[])
            .expect("count rows");
        rows[0].get(0)
    }
}

impl Drop for ScratchDatabase {
    fn drop(&mut self) {
        self.drop_database();
    }
}

struct Scripts {
    _temp: TempDir,
    root: PathBuf,
}

impl Scripts {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path().to_path_buf();
        for dir in ["migrations", "afterMigrate", "seeds"] {
            fs::create_dir_all(root.join(dir)).unwrap();
        }
        Self { _temp: temp, root }
    }

    fn write(&self, dir: &str, name: &str, sql: &str) -> &Self {
        fs::write(self.root.join(dir).join(name), sql).unwrap();
        self
    }

    fn dir(&self, dir: &str) -> PathBuf {
        self.root.join(dir)
    }

    fn migrator(&self, user: &str) -> Migrator {
        let mut vars = TemplateVars::new();
        vars.insert("APP_ROLE".to_string(), "PUBLIC".to_string());
        Migrator::new(self.dir("migrations"))
            .with_after_migrate_dir(self.dir("afterMigrate"))
            .with_seeds_dir(self.dir("seeds"))
            .with_template_vars(vars)
            .applied_by(user)
    }
}

fn ledger(db: &ScratchDatabase) -> Vec<(i32, String, bool)> {
    let exec = db.connector().connect().expect("connect");
    exec.list_applied()
        .expect("list ledger")
        .into_iter()
        .map(|e| (e.rank, e.script, e.success))
        .collect()
}

#[test]
fn test_migration_lifecycle() {
    let Some(db) = ScratchDatabase::create("lifecycle") else {
        return;
    };
    let scripts = Scripts::new();
    scripts
        .write(
            "migrations",
            "v1_create_table.sql",
            "CREATE TABLE items (id INT PRIMARY KEY);",
        )
        .write(
            "migrations",
            "v2_add_column.sql",
            "ALTER TABLE items ADD COLUMN name TEXT;\nCREATE INDEX idx_items_name ON items (name);",
        )
        .write("afterMigrate", "grants.sql", "GRANT SELECT ON items TO ${APP_ROLE};")
        .write("seeds", "01_items.sql", "INSERT INTO items VALUES (1, 'one'), (2, 'two');");
    let migrator = scripts.migrator(&db.config.user);
    let connector = db.connector();

    let report = migrator.migrate(&connector, false).expect("first migrate");
    assert!(report.database_created);
    assert_eq!(report.applied.len(), 2);
    assert_eq!(report.callbacks.len(), 1);
    assert!(report.callbacks[0].is_success());
    assert_eq!(
        ledger(&db),
        vec![
            (1, "v1_create_table.sql".to_string(), true),
            (2, "v2_add_column.sql".to_string(), true),
        ]
    );
    assert!(db.table_exists("items"));

    let report = migrator.migrate(&connector, false).expect("second migrate");
    assert!(!report.database_created);
    assert!(report.applied.is_empty());
    assert_eq!(report.skipped.len(), 2);
    assert_eq!(ledger(&db).len(), 2);

    let status = migrator.info(&connector).expect("info");
    assert_eq!(status.applied_count(), 2);
    assert_eq!(status.pending_count(), 0);

    let seeded = migrator.seed(&connector, false).expect("seed");
    assert_eq!(seeded.executed.len(), 1);
    assert_eq!(db.count("items"), 2);
}

#[test]
fn test_failed_migration_is_rolled_back_and_recorded() {
    let Some(db) = ScratchDatabase::create("failure") else {
        return;
    };
    let scripts = Scripts::new();
    scripts
        .write("migrations", "a.sql", "CREATE TABLE a (id INT);")
        .write("migrations", "b.sql", "CREATE TABLE b (id INT);\nCREATE TABLE broken (id NOSUCHTYPE);")
        .write("migrations", "c.sql", "CREATE TABLE c (id INT);");
    let migrator = scripts.migrator(&db.config.user);

    let err = migrator.migrate(&db.connector(), false).unwrap_err();
    assert!(matches!(err, MigrationError::ExecutionFailed { ref script, applied: 1, .. } if script == "b.sql"));

    assert_eq!(
        ledger(&db),
        vec![(1, "a.sql".to_string(), true), (2, "b.sql".to_string(), false)]
    );
    assert!(db.table_exists("a"));
    assert!(!db.table_exists("b"));
    assert!(!db.table_exists("c"));
}

#[test]
fn test_dry_run_leaves_server_untouched() {
    let Some(db) = ScratchDatabase::create("dry_run") else {
        return;
    };
    let scripts = Scripts::new();
    scripts.write("migrations", "v1.sql", "CREATE TABLE t (id INT);");
    let connector = db.connector();

    let report = scripts
        .migrator(&db.config.user)
        .migrate(&connector, true)
        .expect("dry run");
    assert_eq!(report.previews.len(), 1);
    assert!(!connector.database_exists().expect("check database existence"));
}

#[test]
fn test_drift_is_reported_not_reapplied() {
    let Some(db) = ScratchDatabase::create("drift") else {
        return;
    };
    let scripts = Scripts::new();
    scripts.write("migrations", "v1.sql", "CREATE TABLE t (id INT);");
    let migrator = scripts.migrator(&db.config.user);
    migrator.migrate(&db.connector(), false).expect("migrate");

    scripts.write("migrations", "v1.sql", "CREATE TABLE t (id BIGINT);");
    let report = migrator.migrate(&db.connector(), false).expect("migrate after edit");
    assert_eq!(report.drifted.len(), 1);
    assert!(report.applied.is_empty());
    assert_eq!(ledger(&db).len(), 1);
}
