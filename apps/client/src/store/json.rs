//! Flat JSON-file fallback backend for the local store.
//!
//! Used when SQLite cannot be initialized. The whole store is one JSON
//! document rewritten on every mutation; reads never fail, a missing or
//! corrupt file simply reads as empty.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::{LocalStore, Record, StoreKind};
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    user_id: String,
    updated_at_ms: i64,
    payload: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct JsonState {
    study_lists: HashMap<String, StoredRecord>,
    saved_items: HashMap<String, StoredRecord>,
}

impl JsonState {
    fn table(&self, kind: StoreKind) -> &HashMap<String, StoredRecord> {
        match kind {
            StoreKind::StudyLists => &self.study_lists,
            StoreKind::SavedItems => &self.saved_items,
        }
    }

    fn table_mut(&mut self, kind: StoreKind) -> &mut HashMap<String, StoredRecord> {
        match kind {
            StoreKind::StudyLists => &mut self.study_lists,
            StoreKind::SavedItems => &mut self.saved_items,
        }
    }
}

/// Flat key-value record store persisted as one JSON file.
pub struct JsonStore {
    path: PathBuf,
    state: Mutex<JsonState>,
}

impl JsonStore {
    /// Open the store at `path`. An unreadable file starts empty rather
    /// than failing, so first use before initialization still works.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let state = std::fs::read_to_string(&path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();
        Self {
            path,
            state: Mutex::new(state),
        }
    }

    fn persist(&self, state: &JsonState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string(state)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    fn to_record(id: &str, stored: &StoredRecord) -> Record {
        Record {
            id: id.to_string(),
            user_id: stored.user_id.clone(),
            updated_at_ms: stored.updated_at_ms,
            payload: stored.payload.clone(),
        }
    }
}

impl LocalStore for JsonStore {
    fn get(&self, kind: StoreKind, id: &str) -> Result<Option<Record>> {
        let state = self.state.lock().expect("store lock poisoned");
        Ok(state.table(kind).get(id).map(|s| Self::to_record(id, s)))
    }

    fn get_all(&self, kind: StoreKind, user_id: &str) -> Result<Vec<Record>> {
        let state = self.state.lock().expect("store lock poisoned");
        let mut records: Vec<Record> = state
            .table(kind)
            .iter()
            .filter(|(_, s)| s.user_id == user_id)
            .map(|(id, s)| Self::to_record(id, s))
            .collect();
        records.sort_by_key(|r| r.updated_at_ms);
        Ok(records)
    }

    fn put(&self, kind: StoreKind, record: &Record) -> Result<()> {
        let mut state = self.state.lock().expect("store lock poisoned");
        state.table_mut(kind).insert(
            record.id.clone(),
            StoredRecord {
                user_id: record.user_id.clone(),
                updated_at_ms: record.updated_at_ms,
                payload: record.payload.clone(),
            },
        );
        self.persist(&state)
    }

    fn put_many(&self, kind: StoreKind, records: &[Record]) -> Result<()> {
        let mut state = self.state.lock().expect("store lock poisoned");
        for record in records {
            state.table_mut(kind).insert(
                record.id.clone(),
                StoredRecord {
                    user_id: record.user_id.clone(),
                    updated_at_ms: record.updated_at_ms,
                    payload: record.payload.clone(),
                },
            );
        }
        self.persist(&state)
    }

    fn delete(&self, kind: StoreKind, id: &str) -> Result<()> {
        let mut state = self.state.lock().expect("store lock poisoned");
        state.table_mut(kind).remove(id);
        self.persist(&state)
    }
}
