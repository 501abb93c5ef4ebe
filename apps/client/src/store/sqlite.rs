//! SQLite backend for the local store.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use super::{LocalStore, Record, StoreKind};
use crate::error::Result;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS study_lists (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    updated_at_ms INTEGER NOT NULL,
    payload TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_study_lists_user ON study_lists (user_id);
CREATE INDEX IF NOT EXISTS idx_study_lists_updated ON study_lists (updated_at_ms);

CREATE TABLE IF NOT EXISTS saved_items (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    updated_at_ms INTEGER NOT NULL,
    payload TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_saved_items_user ON saved_items (user_id);
CREATE INDEX IF NOT EXISTS idx_saved_items_updated ON saved_items (updated_at_ms);
"#;

/// SQLite-backed record store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open database at path, creating it if necessary.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl LocalStore for SqliteStore {
    fn get(&self, kind: StoreKind, id: &str) -> Result<Option<Record>> {
        let conn = self.conn.lock().expect("store lock poisoned");
        let record = conn
            .query_row(
                &format!(
                    "SELECT id, user_id, updated_at_ms, payload FROM {} WHERE id = ?1",
                    kind.table()
                ),
                params![id],
                |row| {
                    Ok(Record {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        updated_at_ms: row.get(2)?,
                        payload: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    fn get_all(&self, kind: StoreKind, user_id: &str) -> Result<Vec<Record>> {
        let conn = self.conn.lock().expect("store lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT id, user_id, updated_at_ms, payload FROM {} WHERE user_id = ?1 ORDER BY updated_at_ms",
            kind.table()
        ))?;
        let records = stmt
            .query_map(params![user_id], |row| {
                Ok(Record {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    updated_at_ms: row.get(2)?,
                    payload: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn put(&self, kind: StoreKind, record: &Record) -> Result<()> {
        let conn = self.conn.lock().expect("store lock poisoned");
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {} (id, user_id, updated_at_ms, payload) VALUES (?1, ?2, ?3, ?4)",
                kind.table()
            ),
            params![record.id, record.user_id, record.updated_at_ms, record.payload],
        )?;
        Ok(())
    }

    fn put_many(&self, kind: StoreKind, records: &[Record]) -> Result<()> {
        let mut conn = self.conn.lock().expect("store lock poisoned");
        let tx = conn.transaction()?;
        for record in records {
            tx.execute(
                &format!(
                    "INSERT OR REPLACE INTO {} (id, user_id, updated_at_ms, payload) VALUES (?1, ?2, ?3, ?4)",
                    kind.table()
                ),
                params![record.id, record.user_id, record.updated_at_ms, record.payload],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn delete(&self, kind: StoreKind, id: &str) -> Result<()> {
        let conn = self.conn.lock().expect("store lock poisoned");
        conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", kind.table()),
            params![id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(id: &str, user_id: &str, updated_at_ms: i64) -> Record {
        Record {
            id: id.to_string(),
            user_id: user_id.to_string(),
            updated_at_ms,
            payload: format!(r#"{{"id":"{id}"}}"#),
        }
    }

    #[test]
    fn put_is_a_keyed_upsert() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.put(StoreKind::StudyLists, &record("l1", "u1", 100)).unwrap();
        store.put(StoreKind::StudyLists, &record("l1", "u1", 200)).unwrap();

        let all = store.get_all(StoreKind::StudyLists, "u1").unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].updated_at_ms, 200);
    }

    #[test]
    fn records_are_namespaced_by_user() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.put(StoreKind::SavedItems, &record("i1", "u1", 1)).unwrap();
        store.put(StoreKind::SavedItems, &record("i2", "local", 2)).unwrap();

        assert_eq!(store.get_all(StoreKind::SavedItems, "u1").unwrap().len(), 1);
        assert_eq!(store.get_all(StoreKind::SavedItems, "local").unwrap().len(), 1);
        assert_eq!(store.get_all(StoreKind::SavedItems, "u2").unwrap().len(), 0);
    }

    #[test]
    fn object_stores_are_independent() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.put(StoreKind::StudyLists, &record("x", "u1", 1)).unwrap();
        assert!(store.get(StoreKind::SavedItems, "x").unwrap().is_none());
        assert!(store.get(StoreKind::StudyLists, "x").unwrap().is_some());
    }

    #[test]
    fn delete_removes_the_record() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.put(StoreKind::StudyLists, &record("l1", "u1", 1)).unwrap();
        store.delete(StoreKind::StudyLists, "l1").unwrap();
        assert!(store.get(StoreKind::StudyLists, "l1").unwrap().is_none());
    }

    #[test]
    fn put_many_inserts_all_records() {
        let store = SqliteStore::open_in_memory().unwrap();
        let records: Vec<Record> = (0..5).map(|i| record(&format!("l{i}"), "u1", i)).collect();
        store.put_many(StoreKind::StudyLists, &records).unwrap();
        assert_eq!(store.get_all(StoreKind::StudyLists, "u1").unwrap().len(), 5);
    }
}
