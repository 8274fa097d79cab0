use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

use crate::logging::{log, obj, ts_now, Domain, Level};

/// Durable client-side key/value storage.
pub struct LocalStorage {
    conn: Connection,
}

impl LocalStorage {
    pub fn new(path: &str) -> Result<Self> {
        Ok(Self { conn: Connection::open(path)? })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self { conn: Connection::open_in_memory()? })
    }

    pub fn init(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS local_storage (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            COMMIT;",
        )?;
        log(Level::Debug, Domain::System, "storage_ready", obj(&[]));
        Ok(())
    }

    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT value FROM local_storage WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    pub fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO local_storage (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, ts_now()],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn remove_item(&mut self, key: &str) -> Result<()> {
        self.conn.execute("DELETE FROM local_storage WHERE key = ?1", params![key])?;
        Ok(())
    }
}
