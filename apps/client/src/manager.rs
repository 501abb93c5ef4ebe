//! Study list manager: offline-first orchestration of the local store
//! and the cloud sync adapter.
//!
//! Every mutation lands in the local store first; premium users then get
//! a best-effort cloud mirror. Per entity the sync lifecycle is
//! Local-Only -> Pending-Sync -> Synced, falling back to Local-Only (with
//! the push parked in the adapter's retry queue) when the network loses.
//! Reconciliation applies the core LWW merge policy; losers are
//! discarded silently.
//!
//! The manager is an explicitly constructed service object: inject the
//! store and adapter, hold no globals.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::broadcast;
use uuid::Uuid;

use review_core::types::{ListKind, SavedStudyItem, StudyList};
use review_core::{admits, merge, CoreError, Winner};

use crate::error::{ClientError, Result};
use crate::store::{
    item_from_record, list_from_record, record_from_item, record_from_list, LocalStore, StoreKind,
    LOCAL_USER,
};
use crate::sync::{item_to_wire, list_to_wire, CloudSync, RemoteChange, SyncOutcome};

/// Per-entity sync lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    LocalOnly,
    PendingSync,
    Synced,
}

/// Counters from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Remote winners written into local storage.
    pub pulled: usize,
    /// Local winners and local-only entities pushed up.
    pub pushed: usize,
}

/// Orchestrates study lists and saved items across both stores.
pub struct StudyListManager {
    store: Box<dyn LocalStore>,
    cloud: CloudSync,
    user_id: String,
    sync_states: Mutex<HashMap<String, SyncState>>,
}

impl StudyListManager {
    /// Build a manager for `user_id`, or the guest namespace when absent.
    pub fn new(store: Box<dyn LocalStore>, cloud: CloudSync, user_id: Option<&str>) -> Self {
        Self {
            store,
            cloud,
            user_id: user_id.unwrap_or(LOCAL_USER).to_string(),
            sync_states: Mutex::new(HashMap::new()),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Sync lifecycle state for an entity (Local-Only until proven otherwise).
    pub fn sync_state(&self, entity_id: &str) -> SyncState {
        self.sync_states
            .lock()
            .expect("state lock poisoned")
            .get(entity_id)
            .copied()
            .unwrap_or(SyncState::LocalOnly)
    }

    // === Lists ===

    pub async fn create_list(&self, name: &str, kind: ListKind) -> Result<StudyList> {
        let now = Utc::now();
        let list = StudyList::new(&self.user_id, name, kind, Uuid::new_v4().to_string(), now);
        self.store.put(StoreKind::StudyLists, &record_from_list(&list)?)?;
        self.push(vec![list_to_wire(&list, false)], Vec::new(), vec![list.id.clone()])
            .await;
        Ok(list)
    }

    pub async fn rename_list(&self, list_id: &str, name: &str) -> Result<StudyList> {
        let mut list = self
            .load_list(list_id)?
            .ok_or_else(|| ClientError::NotFound(format!("list {list_id}")))?;
        list.name = name.to_string();
        list.touch(Utc::now());
        self.store.put(StoreKind::StudyLists, &record_from_list(&list)?)?;
        self.push(vec![list_to_wire(&list, false)], Vec::new(), vec![list.id.clone()])
            .await;
        Ok(list)
    }

    pub async fn get_lists(&self) -> Result<Vec<StudyList>> {
        let records = self.store.get_all(StoreKind::StudyLists, &self.user_id)?;
        records.iter().map(list_from_record).collect()
    }

    pub async fn get_list(&self, list_id: &str) -> Result<Option<StudyList>> {
        self.load_list(list_id)
    }

    /// Delete a list and strip it from every member item; items left
    /// without any list are deleted outright.
    pub async fn delete_list(&self, list_id: &str) -> Result<()> {
        let list = self
            .load_list(list_id)?
            .ok_or_else(|| ClientError::NotFound(format!("list {list_id}")))?;
        let now = Utc::now();

        let mut kept = Vec::new();
        let mut dropped = Vec::new();
        for item_id in &list.item_ids {
            let Some(mut item) = self.load_item(item_id)? else {
                continue;
            };
            item.list_ids.retain(|id| id != list_id);
            item.touch(now);
            if item.list_ids.is_empty() {
                dropped.push(item);
            } else {
                kept.push(item);
            }
        }

        // Local first: surviving items in one batch, then removals.
        let records = kept
            .iter()
            .map(record_from_item)
            .collect::<Result<Vec<_>>>()?;
        self.store.put_many(StoreKind::SavedItems, &records)?;
        for item in &dropped {
            self.store.delete(StoreKind::SavedItems, &item.id)?;
        }
        self.store.delete(StoreKind::StudyLists, list_id)?;

        // One cloud batch carries the tombstone and both item outcomes.
        let mut tombstone = list.clone();
        tombstone.touch(now);
        let wire_items = kept
            .iter()
            .map(|i| item_to_wire(i, false))
            .chain(dropped.iter().map(|i| item_to_wire(i, true)))
            .collect();
        let mut ids: Vec<String> = kept.iter().map(|i| i.id.clone()).collect();
        ids.push(list_id.to_string());
        self.push(vec![list_to_wire(&tombstone, true)], wire_items, ids)
            .await;

        self.sync_states
            .lock()
            .expect("state lock poisoned")
            .remove(list_id);
        Ok(())
    }

    // === Items ===

    pub async fn get_items(&self, list_id: Option<&str>) -> Result<Vec<SavedStudyItem>> {
        let records = self.store.get_all(StoreKind::SavedItems, &self.user_id)?;
        let items = records
            .iter()
            .map(item_from_record)
            .collect::<Result<Vec<_>>>()?;
        Ok(match list_id {
            Some(list_id) => items
                .into_iter()
                .filter(|i| i.list_ids.iter().any(|id| id == list_id))
                .collect(),
            None => items,
        })
    }

    pub async fn get_item(&self, item_id: &str) -> Result<Option<SavedStudyItem>> {
        self.load_item(item_id)
    }

    /// Save an item into the given lists.
    ///
    /// Validates list-kind compatibility up front; the item's `list_ids`
    /// and every target list's `item_ids` are written in one local batch
    /// and shipped in one cloud batch.
    pub async fn save_item(
        &self,
        mut item: SavedStudyItem,
        list_ids: &[String],
    ) -> Result<SavedStudyItem> {
        let now = Utc::now();
        item.user_id = self.user_id.clone();

        let mut lists = Vec::new();
        for list_id in list_ids {
            let list = self
                .load_list(list_id)?
                .ok_or_else(|| ClientError::NotFound(format!("list {list_id}")))?;
            if !admits(list.kind, &item) {
                return Err(CoreError::IncompatibleContent {
                    list_kind: list.kind,
                    content_type: item.content_type,
                }
                .into());
            }
            lists.push(list);
        }

        for list in &mut lists {
            if !list.item_ids.contains(&item.id) {
                list.item_ids.push(item.id.clone());
                list.touch(now);
            }
            if !item.list_ids.contains(&list.id) {
                item.list_ids.push(list.id.clone());
            }
        }
        item.touch(now);

        // Both sides of the relationship before anything can observe it.
        let list_records = lists
            .iter()
            .map(record_from_list)
            .collect::<Result<Vec<_>>>()?;
        self.store.put(StoreKind::SavedItems, &record_from_item(&item)?)?;
        self.store.put_many(StoreKind::StudyLists, &list_records)?;

        let mut ids: Vec<String> = lists.iter().map(|l| l.id.clone()).collect();
        ids.push(item.id.clone());
        self.push(
            lists.iter().map(|l| list_to_wire(l, false)).collect(),
            vec![item_to_wire(&item, false)],
            ids,
        )
        .await;

        Ok(item)
    }

    /// Remove an item from one list; removing it from its last list
    /// deletes the item record entirely.
    pub async fn remove_item_from_list(&self, item_id: &str, list_id: &str) -> Result<()> {
        let mut item = self
            .load_item(item_id)?
            .ok_or_else(|| ClientError::NotFound(format!("item {item_id}")))?;
        let now = Utc::now();

        item.list_ids.retain(|id| id != list_id);
        item.touch(now);

        let list = match self.load_list(list_id)? {
            Some(mut list) => {
                list.item_ids.retain(|id| id != item_id);
                list.touch(now);
                self.store.put(StoreKind::StudyLists, &record_from_list(&list)?)?;
                Some(list)
            }
            None => None,
        };

        let deleted = item.list_ids.is_empty();
        if deleted {
            self.store.delete(StoreKind::SavedItems, item_id)?;
        } else {
            self.store.put(StoreKind::SavedItems, &record_from_item(&item)?)?;
        }

        let wire_lists = list.iter().map(|l| list_to_wire(l, false)).collect();
        let mut ids = vec![item_id.to_string()];
        if let Some(list) = &list {
            ids.push(list.id.clone());
        }
        self.push(wire_lists, vec![item_to_wire(&item, deleted)], ids).await;
        Ok(())
    }

    // === Reconciliation ===

    /// Startup sync: pull the server snapshot, merge per entity, push
    /// everything the local side won or the server has never seen.
    pub async fn reconcile(&self) -> Result<ReconcileStats> {
        let snapshot = self.cloud.fetch_all().await?;
        let mut stats = ReconcileStats::default();

        let mut remote_lists: HashSet<String> = HashSet::new();
        let mut push_lists = Vec::new();
        for (remote, deleted) in &snapshot.lists {
            remote_lists.insert(remote.id.clone());
            match self.load_list(&remote.id)? {
                None if *deleted => {}
                None => {
                    self.store
                        .put(StoreKind::StudyLists, &record_from_list(remote)?)?;
                    self.mark(&remote.id, SyncState::Synced);
                    stats.pulled += 1;
                }
                Some(local) => match merge::resolve(&local, remote) {
                    Winner::Remote => {
                        if *deleted {
                            self.store.delete(StoreKind::StudyLists, &remote.id)?;
                        } else {
                            self.store
                                .put(StoreKind::StudyLists, &record_from_list(remote)?)?;
                        }
                        self.mark(&remote.id, SyncState::Synced);
                        stats.pulled += 1;
                    }
                    Winner::Local => push_lists.push(list_to_wire(&local, false)),
                },
            }
        }

        let mut remote_items: HashSet<String> = HashSet::new();
        let mut push_items = Vec::new();
        for (remote, deleted) in &snapshot.items {
            remote_items.insert(remote.id.clone());
            match self.load_item(&remote.id)? {
                None if *deleted => {}
                None => {
                    self.store
                        .put(StoreKind::SavedItems, &record_from_item(remote)?)?;
                    self.mark(&remote.id, SyncState::Synced);
                    stats.pulled += 1;
                }
                Some(local) => match merge::resolve(&local, remote) {
                    Winner::Remote => {
                        if *deleted {
                            self.store.delete(StoreKind::SavedItems, &remote.id)?;
                        } else {
                            self.store
                                .put(StoreKind::SavedItems, &record_from_item(remote)?)?;
                        }
                        self.mark(&remote.id, SyncState::Synced);
                        stats.pulled += 1;
                    }
                    Winner::Local => push_items.push(item_to_wire(&local, false)),
                },
            }
        }

        // Entities the server has never seen.
        for list in self.get_lists().await? {
            if !remote_lists.contains(&list.id) {
                push_lists.push(list_to_wire(&list, false));
            }
        }
        for item in self.get_items(None).await? {
            if !remote_items.contains(&item.id) {
                push_items.push(item_to_wire(&item, false));
            }
        }

        if !push_lists.is_empty() || !push_items.is_empty() {
            stats.pushed = push_lists.len() + push_items.len();
            let ids: Vec<String> = push_lists
                .iter()
                .map(|l| l.id.clone())
                .chain(push_items.iter().map(|i| i.id.clone()))
                .collect();
            self.push(push_lists, push_items, ids).await;
        }

        Ok(stats)
    }

    /// Apply one change from another device. The core merge policy
    /// decides; a losing remote change is dropped without ceremony.
    pub async fn handle_remote_change(&self, change: RemoteChange) -> Result<()> {
        match change {
            RemoteChange::List { list, deleted } => {
                let keep_remote = match self.load_list(&list.id)? {
                    Some(local) => merge::resolve(&local, &list) == Winner::Remote,
                    None => !deleted,
                };
                if keep_remote {
                    if deleted {
                        self.store.delete(StoreKind::StudyLists, &list.id)?;
                    } else {
                        self.store
                            .put(StoreKind::StudyLists, &record_from_list(&list)?)?;
                    }
                    self.mark(&list.id, SyncState::Synced);
                }
            }
            RemoteChange::Item { item, deleted } => {
                let keep_remote = match self.load_item(&item.id)? {
                    Some(local) => merge::resolve(&local, &item) == Winner::Remote,
                    None => !deleted,
                };
                if keep_remote {
                    if deleted {
                        self.store.delete(StoreKind::SavedItems, &item.id)?;
                    } else {
                        self.store
                            .put(StoreKind::SavedItems, &record_from_item(&item)?)?;
                    }
                    self.mark(&item.id, SyncState::Synced);
                }
            }
        }
        Ok(())
    }

    /// Re-attempt pushes parked in the adapter's retry queue.
    pub async fn flush_pending(&self) -> Result<usize> {
        self.cloud.flush_pending().await
    }

    // === Internals ===

    fn load_list(&self, list_id: &str) -> Result<Option<StudyList>> {
        match self.store.get(StoreKind::StudyLists, list_id)? {
            Some(record) if record.user_id == self.user_id => Ok(Some(list_from_record(&record)?)),
            _ => Ok(None),
        }
    }

    fn load_item(&self, item_id: &str) -> Result<Option<SavedStudyItem>> {
        match self.store.get(StoreKind::SavedItems, item_id)? {
            Some(record) if record.user_id == self.user_id => Ok(Some(item_from_record(&record)?)),
            _ => Ok(None),
        }
    }

    fn mark(&self, entity_id: &str, state: SyncState) {
        self.sync_states
            .lock()
            .expect("state lock poisoned")
            .insert(entity_id.to_string(), state);
    }

    /// Ship a batch to the cloud and track per-entity sync state.
    ///
    /// Sync failure never reaches the caller: the entities stay fully
    /// usable locally and the batch waits in the retry queue.
    async fn push(
        &self,
        lists: Vec<crate::sync::WireStudyList>,
        items: Vec<crate::sync::WireSavedItem>,
        ids: Vec<String>,
    ) {
        if !self.cloud.is_enabled() {
            for id in &ids {
                self.mark(id, SyncState::LocalOnly);
            }
            return;
        }
        for id in &ids {
            self.mark(id, SyncState::PendingSync);
        }
        match self.cloud.sync_batch(lists, items).await {
            Ok(SyncOutcome::Synced { .. }) => {
                for id in &ids {
                    self.mark(id, SyncState::Synced);
                }
            }
            Ok(SyncOutcome::Queued) | Ok(SyncOutcome::Skipped) => {
                for id in &ids {
                    self.mark(id, SyncState::LocalOnly);
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "cloud sync failed");
                for id in &ids {
                    self.mark(id, SyncState::LocalOnly);
                }
            }
        }
    }
}

/// Drive the remote-change subscription into the manager.
///
/// Spawn this once per process; it ends when the adapter is dropped.
pub async fn run_change_listener(
    manager: Arc<StudyListManager>,
    mut changes: broadcast::Receiver<RemoteChange>,
) {
    loop {
        match changes.recv().await {
            Ok(change) => {
                if let Err(err) = manager.handle_remote_change(change).await {
                    tracing::warn!(error = %err, "failed to apply remote change");
                }
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "remote change stream lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
