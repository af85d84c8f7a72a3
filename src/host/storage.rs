// src/host/storage.rs
//! Persisted key-value storage
//!
//! Holds the identified user id and the opt-out flag across host restarts.
//! Absence of either key is valid and never blocks operation.

use crate::utils::errors::{AgentError, Result};
use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Key-value collaborator for state surviving host restarts
pub trait PersistedStore: Send + Sync {
    /// Read a value; `None` when the key was never set
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key; removing an absent key is not an error
    fn remove(&self, key: &str) -> Result<()>;
}

/// SQLite-backed store, the default for native hosts
pub struct SqliteStore {
    db: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(|e| {
            AgentError::StorageFailed(format!("Failed to open database: {}", e))
        })?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS agent_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
            [],
        )
        .map_err(|e| AgentError::StorageFailed(format!("Schema creation failed: {}", e)))?;

        info!("Persisted store opened at {:?}", path.as_ref());

        Ok(Self {
            db: Mutex::new(conn),
        })
    }
}

impl PersistedStore for SqliteStore {
    fn get(&self, key: &str) -> Option<String> {
        let db = self.db.lock();
        db.query_row(
            "SELECT value FROM agent_state WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .ok()
        .flatten()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let db = self.db.lock();
        db.execute(
            "INSERT OR REPLACE INTO agent_state (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .map_err(|e| AgentError::StorageFailed(format!("Failed to write key: {}", e)))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let db = self.db.lock();
        db.execute("DELETE FROM agent_state WHERE key = ?1", params![key])
            .map_err(|e| AgentError::StorageFailed(format!("Failed to remove key: {}", e)))?;
        Ok(())
    }
}

/// In-memory store for tests and hosts that manage their own persistence
#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistedStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values.write().remove(key);
        Ok(())
    }
}
