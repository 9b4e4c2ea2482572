//! Shared handle to the project store.
//!
//! Six daemons open the same SQLite file, each writing only the steps it
//! owns. WAL keeps readers off the writer's lock, and the busy timeout
//! absorbs the rare moment two daemons commit at once instead of surfacing
//! SQLITE_BUSY to a poll iteration.

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::errors::PatrolError;

pub struct Database {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(path: &str) -> Result<Self, PatrolError> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| PatrolError::Database(format!("Failed to open database: {}", e)))?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL; \
             PRAGMA synchronous=NORMAL; \
             PRAGMA busy_timeout=5000; \
             PRAGMA foreign_keys=ON;",
        )
        .map_err(|e| PatrolError::Database(format!("Failed to set pragmas: {}", e)))?;

        Self::from_connection(conn)
    }

    /// Throwaway store for tests. No cross-process pragmas; an in-memory
    /// connection has no contention to manage.
    pub fn in_memory() -> Result<Self, PatrolError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| PatrolError::Database(format!("Failed to open in-memory db: {}", e)))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, PatrolError> {
        conn.execute_batch(super::schema::CREATE_TABLES)
            .map_err(|e| PatrolError::Database(format!("Failed to create tables: {}", e)))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}
