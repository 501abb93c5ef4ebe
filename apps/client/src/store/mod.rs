//! Local persistent store behind a uniform record interface.
//!
//! Two interchangeable backends: SQLite (primary) and a flat JSON file
//! (fallback). The backend is chosen once at open time; callers never
//! learn which one is active. Every record is namespaced by `user_id`
//! (the sentinel [`LOCAL_USER`] for guests) so accounts sharing a device
//! never see each other's data.

pub mod json;
pub mod sqlite;

use std::path::Path;

use review_core::types::{SavedStudyItem, StudyList};

use crate::error::Result;

/// Namespace for unauthenticated/guest use.
pub const LOCAL_USER: &str = "local";

/// The two object stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    StudyLists,
    SavedItems,
}

impl StoreKind {
    pub fn table(&self) -> &'static str {
        match self {
            Self::StudyLists => "study_lists",
            Self::SavedItems => "saved_items",
        }
    }
}

/// One stored record: entity payload plus the indexed columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub user_id: String,
    pub updated_at_ms: i64,
    /// Entity serialized as JSON.
    pub payload: String,
}

/// Uniform capability set over both backends.
///
/// Reads must tolerate a partially initialized backend by returning
/// empty collections; `put` is a keyed upsert.
pub trait LocalStore: Send + Sync {
    fn get(&self, kind: StoreKind, id: &str) -> Result<Option<Record>>;
    fn get_all(&self, kind: StoreKind, user_id: &str) -> Result<Vec<Record>>;
    fn put(&self, kind: StoreKind, record: &Record) -> Result<()>;
    fn put_many(&self, kind: StoreKind, records: &[Record]) -> Result<()>;
    fn delete(&self, kind: StoreKind, id: &str) -> Result<()>;
}

/// Open the best available backend under `data_dir`.
pub fn open_store(data_dir: &Path) -> Box<dyn LocalStore> {
    match sqlite::SqliteStore::open(data_dir.join("kioku.db")) {
        Ok(store) => Box::new(store),
        Err(err) => {
            tracing::warn!(error = %err, "sqlite unavailable, falling back to json store");
            Box::new(json::JsonStore::open(data_dir.join("kioku-store.json")))
        }
    }
}

// === Entity <-> Record conversion ===

pub fn record_from_list(list: &StudyList) -> Result<Record> {
    Ok(Record {
        id: list.id.clone(),
        user_id: list.user_id.clone(),
        updated_at_ms: list.updated_at.timestamp_millis(),
        payload: serde_json::to_string(list)?,
    })
}

pub fn list_from_record(record: &Record) -> Result<StudyList> {
    Ok(serde_json::from_str(&record.payload)?)
}

pub fn record_from_item(item: &SavedStudyItem) -> Result<Record> {
    Ok(Record {
        id: item.id.clone(),
        user_id: item.user_id.clone(),
        updated_at_ms: item.updated_at.timestamp_millis(),
        payload: serde_json::to_string(item)?,
    })
}

pub fn item_from_record(record: &Record) -> Result<SavedStudyItem> {
    Ok(serde_json::from_str(&record.payload)?)
}
