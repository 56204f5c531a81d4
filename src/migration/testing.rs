//! In-memory stand-in for a PostgreSQL server, used by the engine's unit tests
//!
//! Scripts containing `FAIL` error out. Statements and ledger writes issued
//! inside `BEGIN` are buffered and only become visible on `COMMIT`; a `COMMIT`
//! whose transaction ran a script containing `DEFERRED_VIOLATION` is refused
//! and discards the transaction.

use crate::connection::{ConnectionError, Connector};
use crate::executor::{SqlExecutor, TideError};
use crate::migration::ledger::HistoryLedger;
use crate::migration::{LedgerEntry, NewLedgerEntry};
use chrono::Utc;
use std::cell::RefCell;
use std::rc::Rc;

pub(crate) const FAIL_MARKER: &str = "FAIL";
pub(crate) const COMMIT_REJECT_MARKER: &str = "DEFERRED_VIOLATION";
/// Login role reported by the fake connectors
pub(crate) const FAKE_USER: &str = "app_owner";

#[derive(Debug, Default)]
struct PendingTx {
    scripts: Vec<String>,
    ledger: Vec<NewLedgerEntry>,
}

#[derive(Debug, Default)]
pub(crate) struct FakeDb {
    pub database_exists: bool,
    pub databases_created: usize,
    pub connections_opened: usize,
    pub ledger_table: bool,
    pub ledger: Vec<LedgerEntry>,
    /// Script bodies that were committed, in order
    pub committed: Vec<String>,
    /// Everything sent to the server, including transaction control
    pub statements: Vec<String>,
    tx: Option<PendingTx>,
}

impl FakeDb {
    /// An existing, empty database
    pub fn shared() -> Rc<RefCell<FakeDb>> {
        Rc::new(RefCell::new(FakeDb {
            database_exists: true,
            ..Default::default()
        }))
    }

    pub fn connection(db: &Rc<RefCell<FakeDb>>) -> FakeConn {
        FakeConn { db: Rc::clone(db) }
    }

    fn append_ledger(&mut self, entry: NewLedgerEntry) {
        let rank = self.ledger.last().map_or(1, |e| e.rank + 1);
        self.ledger.push(LedgerEntry {
            rank,
            script: entry.script,
            description: entry.description,
            checksum: entry.checksum,
            applied_by: entry.applied_by,
            applied_at: Utc::now().naive_utc(),
            duration_millis: entry.duration_millis,
            success: entry.success,
        });
    }

    pub fn ledger_scripts(&self) -> Vec<(i32, String, bool)> {
        self.ledger
            .iter()
            .map(|e| (e.rank, e.script.clone(), e.success))
            .collect()
    }
}

pub(crate) struct FakeConn {
    db: Rc<RefCell<FakeDb>>,
}

impl SqlExecutor for FakeConn {
    fn batch_execute(&self, script: &str) -> Result<(), TideError> {
        let mut db = self.db.borrow_mut();
        db.statements.push(script.to_string());
        if script.contains(FAIL_MARKER) {
            return Err(TideError::QueryError(format!(
                "syntax error at or near \"{FAIL_MARKER}\""
            )));
        }
        match db.tx.as_mut() {
            Some(tx) => tx.scripts.push(script.to_string()),
            None => db.committed.push(script.to_string()),
        }
        Ok(())
    }

    fn begin(&self) -> Result<(), TideError> {
        let mut db = self.db.borrow_mut();
        db.statements.push("BEGIN".to_string());
        db.tx = Some(PendingTx::default());
        Ok(())
    }

    fn commit(&self) -> Result<(), TideError> {
        let mut db = self.db.borrow_mut();
        db.statements.push("COMMIT".to_string());
        if let Some(tx) = db.tx.take() {
            if tx.scripts.iter().any(|s| s.contains(COMMIT_REJECT_MARKER)) {
                return Err(TideError::QueryError(
                    "insert or update violates deferred foreign key constraint".to_string(),
                ));
            }
            db.committed.extend(tx.scripts);
            for entry in tx.ledger {
                db.append_ledger(entry);
            }
        }
        Ok(())
    }

    fn rollback(&self) -> Result<(), TideError> {
        let mut db = self.db.borrow_mut();
        db.statements.push("ROLLBACK".to_string());
        db.tx = None;
        Ok(())
    }
}

impl HistoryLedger for FakeConn {
    fn ensure_schema(&self) -> Result<(), TideError> {
        self.db.borrow_mut().ledger_table = true;
        Ok(())
    }

    fn ledger_exists(&self) -> Result<bool, TideError> {
        Ok(self.db.borrow().ledger_table)
    }

    fn list_applied(&self) -> Result<Vec<LedgerEntry>, TideError> {
        let db = self.db.borrow();
        if !db.ledger_table {
            return Err(TideError::QueryError(
                "relation \"schema_migrations\" does not exist".to_string(),
            ));
        }
        Ok(db.ledger.clone())
    }

    fn record_attempt(&self, entry: &NewLedgerEntry) -> Result<(), TideError> {
        let mut db = self.db.borrow_mut();
        if !db.ledger_table {
            return Err(TideError::QueryError(
                "relation \"schema_migrations\" does not exist".to_string(),
            ));
        }
        let duplicate = db.ledger.iter().any(|e| e.script == entry.script)
            || db
                .tx
                .as_ref()
                .is_some_and(|tx| tx.ledger.iter().any(|e| e.script == entry.script));
        if duplicate {
            return Err(TideError::QueryError(format!(
                "duplicate key value violates unique constraint: {}",
                entry.script
            )));
        }
        match db.tx.as_mut() {
            Some(tx) => tx.ledger.push(entry.clone()),
            None => db.append_ledger(entry.clone()),
        }
        Ok(())
    }
}

#[derive(Clone)]
pub(crate) struct FakeConnector {
    pub db: Rc<RefCell<FakeDb>>,
}

impl FakeConnector {
    pub fn new(db: &Rc<RefCell<FakeDb>>) -> Self {
        Self { db: Rc::clone(db) }
    }

    /// Connector whose target database does not exist yet
    pub fn missing_database() -> Self {
        Self {
            db: Rc::new(RefCell::new(FakeDb::default())),
        }
    }
}

impl Connector for FakeConnector {
    type Conn = FakeConn;

    fn database_exists(&self) -> Result<bool, ConnectionError> {
        Ok(self.db.borrow().database_exists)
    }

    fn ensure_database(&self) -> Result<bool, ConnectionError> {
        let mut db = self.db.borrow_mut();
        if db.database_exists {
            return Ok(false);
        }
        db.database_exists = true;
        db.databases_created += 1;
        Ok(true)
    }

    fn connect(&self) -> Result<FakeConn, ConnectionError> {
        let mut db = self.db.borrow_mut();
        if !db.database_exists {
            return Err(ConnectionError::Other(
                "database \"app\" does not exist".to_string(),
            ));
        }
        db.connections_opened += 1;
        Ok(FakeConn {
            db: Rc::clone(&self.db),
        })
    }

    fn user(&self) -> &str {
        FAKE_USER
    }
}

/// Connector that cannot reach the server at all
pub(crate) struct UnreachableConnector;

impl Connector for UnreachableConnector {
    type Conn = FakeConn;

    fn database_exists(&self) -> Result<bool, ConnectionError> {
        Err(ConnectionError::Other("connection refused".to_string()))
    }

    fn ensure_database(&self) -> Result<bool, ConnectionError> {
        Err(ConnectionError::Other("connection refused".to_string()))
    }

    fn connect(&self) -> Result<FakeConn, ConnectionError> {
        Err(ConnectionError::Other("connection refused".to_string()))
    }

    fn user(&self) -> &str {
        FAKE_USER
    }
}
