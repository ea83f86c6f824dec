//! Database repository layer
//!
//! The bill collection is read and written wholesale: a load returns every
//! bill in collection order and a save replaces every row in one transaction.

use crate::error::{Error, Result};
use crate::types::Bill;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

/// Database handle with connection pooling (single connection for now)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn)
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    // ============================================
    // Bill collection
    // ============================================

    /// Load every stored bill in collection order.
    ///
    /// Any payload that does not decode fails the whole load with
    /// [`Error::MalformedState`].
    pub fn load_bills(&self) -> Result<Vec<Bill>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id, payload FROM bills ORDER BY rowid")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::MalformedState(format!("unreadable bill row: {}", e)))?;

        rows.into_iter()
            .map(|(id, payload)| {
                serde_json::from_str::<Bill>(&payload)
                    .map_err(|e| Error::MalformedState(format!("bill {}: {}", id, e)))
            })
            .collect()
    }

    /// Replace the stored collection with `bills`.
    pub fn replace_bills(&self, bills: &[Bill]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM bills", [])?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO bills (id, created_at, payload) VALUES (?1, ?2, ?3)")?;
            for bill in bills {
                let payload = serde_json::to_string(bill)?;
                stmt.execute(params![bill.id, bill.created_at.to_rfc3339(), payload])?;
            }
        }

        tx.commit()?;
        tracing::debug!(count = bills.len(), "Bill collection saved");
        Ok(())
    }

    /// Number of stored bill rows
    pub fn count_bills(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM bills", [], |r| r.get(0))?;
        Ok(count)
    }
}
