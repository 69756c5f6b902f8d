//! SQLite-based state for thresholds, work items, the reassignment audit
//! trail, and alerts.
//!
//! The database lives at `~/.riskwatch/riskwatch.db` and is the backing store
//! the risk engine orchestrates over. Domain-specific queries live in sibling
//! files (`thresholds.rs`, `tasks.rs`, `audit.rs`, `alerts.rs`) as impl blocks
//! on [`RiskDb`].

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection};

pub mod types;
pub use types::*;

mod alerts;
mod audit;
mod tasks;
mod thresholds;

pub use thresholds::ThresholdPatch;

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct RiskDb {
    conn: Connection,
}

impl RiskDb {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Self) -> Result<T, DbError>,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        match f(self) {
            Ok(val) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(val)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Open (or create) the database at `~/.riskwatch/riskwatch.db` and apply
    /// the schema.
    pub fn open() -> Result<Self, DbError> {
        let path = Self::db_path()?;
        Self::open_at(path)
    }

    /// Open a database at an explicit path. Used by the daemon (configurable
    /// path) and by tests.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;

        // WAL for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(Self { conn })
    }

    /// Resolve the default database path: `~/.riskwatch/riskwatch.db`.
    fn db_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
        Ok(home.join(".riskwatch").join("riskwatch.db"))
    }

    /// Current UTC timestamp in the storage format.
    pub(crate) fn now_rfc3339() -> String {
        Utc::now().to_rfc3339()
    }

    /// Map a work_items row using the standard 9-column SELECT.
    pub(crate) fn map_work_item_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbWorkItem> {
        Ok(DbWorkItem {
            id: row.get(0)?,
            entity_id: row.get(1)?,
            title: row.get(2)?,
            priority: row.get(3)?,
            status: row.get(4)?,
            due_date: row.get(5)?,
            owner_id: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}
