//! Cloud sync adapter.
//!
//! Mirrors local study lists and saved items to the backend for premium
//! accounts. Everything here is a no-op for guests and free-tier users;
//! they never reach the network. Failed pushes retry with bounded
//! exponential backoff and then land in an in-memory queue flushed by
//! [`CloudSync::flush_pending`] (best-effort, not durable).
//!
//! Remote changes are broadcast on a typed channel; the study list
//! manager is the sole subscriber and reconciles them into local
//! storage. Timestamps cross the wire as epoch milliseconds and are
//! converted to and from `DateTime<Utc>` only in this module.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use review_core::types::{ContentType, ListKind, SavedStudyItem, StudyList};

use crate::error::{ClientError, Result};

/// Per-push batch cap, matching the backend's documented limit.
pub const MAX_SYNC_BATCH: usize = 500;

/// Retry parameters for push and pull requests.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        (self.base_delay * factor).min(self.max_delay)
    }
}

/// Sync adapter configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub base_url: String,
    pub max_batch: usize,
    pub retry: RetryPolicy,
}

impl SyncConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            max_batch: MAX_SYNC_BATCH,
            retry: RetryPolicy::default(),
        }
    }
}

/// Authenticated sync identity.
#[derive(Debug, Clone)]
struct SyncSession {
    user_id: String,
    token: String,
    is_premium: bool,
}

/// How a sync attempt ended, from the caller's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Pushed to the backend.
    Synced { applied: usize, discarded: usize },
    /// Retries exhausted; parked in the retry queue.
    Queued,
    /// Sync disabled (guest or free tier); nothing was attempted.
    Skipped,
}

/// A change made on another device, delivered via the change channel.
#[derive(Debug, Clone)]
pub enum RemoteChange {
    List { list: StudyList, deleted: bool },
    Item { item: SavedStudyItem, deleted: bool },
}

// === Wire types (epoch-ms timestamps) ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireStudyList {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub item_ids: Vec<String>,
    pub version: i64,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireSavedItem {
    pub id: String,
    pub content_type: String,
    pub primary_text: String,
    pub secondary_text: Option<String>,
    pub part_of_speech: Option<String>,
    pub tags: Vec<String>,
    pub list_ids: Vec<String>,
    pub version: i64,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    pub deleted: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
struct SyncPushRequest {
    lists: Vec<WireStudyList>,
    items: Vec<WireSavedItem>,
}

#[derive(Debug, Deserialize)]
struct SyncPushResponse {
    applied: usize,
    discarded: usize,
    #[allow(dead_code)]
    server_time_ms: i64,
}

#[derive(Debug, Serialize)]
struct SyncPullRequest {
    since_ms: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SyncPullResponse {
    lists: Vec<WireStudyList>,
    items: Vec<WireSavedItem>,
    server_time_ms: i64,
}

// === Wire conversion (the epoch-ms boundary) ===

pub fn ms_to_utc(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or_else(|| Utc.timestamp_millis_opt(0).unwrap())
}

pub fn list_to_wire(list: &StudyList, deleted: bool) -> WireStudyList {
    WireStudyList {
        id: list.id.clone(),
        name: list.name.clone(),
        kind: list.kind.as_str().to_string(),
        item_ids: list.item_ids.clone(),
        version: list.version as i64,
        created_at_ms: list.created_at.timestamp_millis(),
        updated_at_ms: list.updated_at.timestamp_millis(),
        deleted,
    }
}

pub fn list_from_wire(user_id: &str, wire: &WireStudyList) -> StudyList {
    StudyList {
        id: wire.id.clone(),
        user_id: user_id.to_string(),
        name: wire.name.clone(),
        kind: ListKind::from_str(&wire.kind).unwrap_or(ListKind::Flashcard),
        item_ids: wire.item_ids.clone(),
        version: wire.version.max(0) as u64,
        created_at: ms_to_utc(wire.created_at_ms),
        updated_at: ms_to_utc(wire.updated_at_ms),
    }
}

pub fn item_to_wire(item: &SavedStudyItem, deleted: bool) -> WireSavedItem {
    WireSavedItem {
        id: item.id.clone(),
        content_type: item.content_type.as_str().to_string(),
        primary_text: item.primary_text.clone(),
        secondary_text: item.secondary_text.clone(),
        part_of_speech: item.part_of_speech.clone(),
        tags: item.tags.clone(),
        list_ids: item.list_ids.clone(),
        version: item.version as i64,
        created_at_ms: item.created_at.timestamp_millis(),
        updated_at_ms: item.updated_at.timestamp_millis(),
        deleted,
    }
}

pub fn item_from_wire(user_id: &str, wire: &WireSavedItem) -> SavedStudyItem {
    SavedStudyItem {
        id: wire.id.clone(),
        user_id: user_id.to_string(),
        content_type: ContentType::from_str(&wire.content_type).unwrap_or(ContentType::Custom),
        primary_text: wire.primary_text.clone(),
        secondary_text: wire.secondary_text.clone(),
        part_of_speech: wire.part_of_speech.clone(),
        tags: wire.tags.clone(),
        list_ids: wire.list_ids.clone(),
        version: wire.version.max(0) as u64,
        created_at: ms_to_utc(wire.created_at_ms),
        updated_at: ms_to_utc(wire.updated_at_ms),
    }
}

/// Everything currently on the server for this user.
#[derive(Debug, Default)]
pub struct RemoteSnapshot {
    pub lists: Vec<(StudyList, bool)>,
    pub items: Vec<(SavedStudyItem, bool)>,
}

/// Split lists and items into push requests within the batch cap.
fn build_batches(
    lists: Vec<WireStudyList>,
    items: Vec<WireSavedItem>,
    max_batch: usize,
) -> Vec<SyncPushRequest> {
    let mut batches = Vec::new();
    let mut current = SyncPushRequest::default();
    let mut size = 0;

    let mut flush = |current: &mut SyncPushRequest, size: &mut usize, batches: &mut Vec<_>| {
        if *size > 0 {
            batches.push(std::mem::take(current));
            *size = 0;
        }
    };

    for list in lists {
        if size == max_batch {
            flush(&mut current, &mut size, &mut batches);
        }
        current.lists.push(list);
        size += 1;
    }
    for item in items {
        if size == max_batch {
            flush(&mut current, &mut size, &mut batches);
        }
        current.items.push(item);
        size += 1;
    }
    flush(&mut current, &mut size, &mut batches);
    batches
}

struct CloudSyncInner {
    client: Client,
    config: SyncConfig,
    session: Mutex<Option<SyncSession>>,
    pending: Mutex<VecDeque<SyncPushRequest>>,
    watermark_ms: Mutex<Option<i64>>,
    changes_tx: broadcast::Sender<RemoteChange>,
}

/// Cloud sync adapter. Clone-able; all state lives behind an Arc.
#[derive(Clone)]
pub struct CloudSync {
    inner: Arc<CloudSyncInner>,
}

impl CloudSync {
    pub fn new(config: SyncConfig) -> Self {
        let (changes_tx, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(CloudSyncInner {
                client: Client::new(),
                config: SyncConfig {
                    base_url: config.base_url.trim_end_matches('/').to_string(),
                    ..config
                },
                session: Mutex::new(None),
                pending: Mutex::new(VecDeque::new()),
                watermark_ms: Mutex::new(None),
                changes_tx,
            }),
        }
    }

    /// Attach the signed-in user. Sync stays disabled unless `is_premium`.
    pub fn initialize(&self, user_id: &str, token: &str, is_premium: bool) {
        let mut session = self.inner.session.lock().expect("session lock poisoned");
        *session = Some(SyncSession {
            user_id: user_id.to_string(),
            token: token.to_string(),
            is_premium,
        });
    }

    /// Whether sync operations will reach the network.
    pub fn is_enabled(&self) -> bool {
        self.enabled_session().is_some()
    }

    /// Subscribe to changes made by other devices.
    pub fn subscribe(&self) -> broadcast::Receiver<RemoteChange> {
        self.inner.changes_tx.subscribe()
    }

    /// Number of push batches parked in the retry queue.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().expect("pending lock poisoned").len()
    }

    fn enabled_session(&self) -> Option<SyncSession> {
        self.inner
            .session
            .lock()
            .expect("session lock poisoned")
            .clone()
            .filter(|s| s.is_premium)
    }

    /// Push one list.
    pub async fn sync_list(&self, list: &StudyList) -> Result<SyncOutcome> {
        self.sync_batch(vec![list_to_wire(list, false)], Vec::new()).await
    }

    /// Push one saved item.
    pub async fn sync_item(&self, item: &SavedStudyItem) -> Result<SyncOutcome> {
        self.sync_batch(Vec::new(), vec![item_to_wire(item, false)]).await
    }

    /// Push a list deletion tombstone.
    pub async fn delete_list(&self, list: &StudyList) -> Result<SyncOutcome> {
        self.sync_batch(vec![list_to_wire(list, true)], Vec::new()).await
    }

    /// Push an item deletion tombstone.
    pub async fn delete_item(&self, item: &SavedStudyItem) -> Result<SyncOutcome> {
        self.sync_batch(Vec::new(), vec![item_to_wire(item, true)]).await
    }

    /// Push lists and items together, split into capped batches.
    ///
    /// A relationship edit (item plus its lists) fits one batch, so both
    /// sides of the edit reach the server in a single request.
    pub async fn sync_batch(
        &self,
        lists: Vec<WireStudyList>,
        items: Vec<WireSavedItem>,
    ) -> Result<SyncOutcome> {
        let Some(session) = self.enabled_session() else {
            return Ok(SyncOutcome::Skipped);
        };
        if lists.is_empty() && items.is_empty() {
            return Ok(SyncOutcome::Synced { applied: 0, discarded: 0 });
        }

        let batches = build_batches(lists, items, self.inner.config.max_batch);
        let mut applied = 0;
        let mut discarded = 0;

        for (index, batch) in batches.iter().enumerate() {
            match self.push_with_retry(&session.token, batch).await {
                Ok(response) => {
                    applied += response.applied;
                    discarded += response.discarded;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "push failed after retries, queueing");
                    let mut pending =
                        self.inner.pending.lock().expect("pending lock poisoned");
                    for rest in &batches[index..] {
                        pending.push_back(rest.clone());
                    }
                    return Ok(SyncOutcome::Queued);
                }
            }
        }

        Ok(SyncOutcome::Synced { applied, discarded })
    }

    /// Fetch the full server snapshot for startup reconciliation.
    pub async fn fetch_all(&self) -> Result<RemoteSnapshot> {
        let Some(session) = self.enabled_session() else {
            return Ok(RemoteSnapshot::default());
        };

        let response = self.pull_with_retry(&session.token, None).await?;
        self.set_watermark(response.server_time_ms);

        Ok(RemoteSnapshot {
            lists: response
                .lists
                .iter()
                .map(|w| (list_from_wire(&session.user_id, w), w.deleted))
                .collect(),
            items: response
                .items
                .iter()
                .map(|w| (item_from_wire(&session.user_id, w), w.deleted))
                .collect(),
        })
    }

    /// Pull changes since the last watermark and broadcast them.
    ///
    /// Returns the number of changes delivered to subscribers.
    pub async fn poll_changes(&self) -> Result<usize> {
        let Some(session) = self.enabled_session() else {
            return Ok(0);
        };

        let since = *self.inner.watermark_ms.lock().expect("watermark lock poisoned");
        let response = self.pull_with_retry(&session.token, since).await?;
        self.set_watermark(response.server_time_ms);

        let mut delivered = 0;
        for wire in &response.lists {
            let change = RemoteChange::List {
                list: list_from_wire(&session.user_id, wire),
                deleted: wire.deleted,
            };
            if self.inner.changes_tx.send(change).is_ok() {
                delivered += 1;
            }
        }
        for wire in &response.items {
            let change = RemoteChange::Item {
                item: item_from_wire(&session.user_id, wire),
                deleted: wire.deleted,
            };
            if self.inner.changes_tx.send(change).is_ok() {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    /// Re-attempt queued pushes. Batches that fail again go back in the
    /// queue; returns how many were flushed.
    pub async fn flush_pending(&self) -> Result<usize> {
        let Some(session) = self.enabled_session() else {
            return Ok(0);
        };

        let mut flushed = 0;
        loop {
            let batch = {
                let mut pending = self.inner.pending.lock().expect("pending lock poisoned");
                match pending.pop_front() {
                    Some(batch) => batch,
                    None => break,
                }
            };
            match self.push_with_retry(&session.token, &batch).await {
                Ok(_) => flushed += 1,
                Err(err) => {
                    tracing::warn!(error = %err, "queued push still failing");
                    self.inner
                        .pending
                        .lock()
                        .expect("pending lock poisoned")
                        .push_front(batch);
                    break;
                }
            }
        }
        Ok(flushed)
    }

    fn set_watermark(&self, server_time_ms: i64) {
        *self.inner.watermark_ms.lock().expect("watermark lock poisoned") =
            Some(server_time_ms);
    }

    // === HTTP plumbing ===

    async fn push_with_retry(
        &self,
        token: &str,
        batch: &SyncPushRequest,
    ) -> Result<SyncPushResponse> {
        self.request_with_retry(token, "/api/sync/push", batch).await
    }

    async fn pull_with_retry(
        &self,
        token: &str,
        since_ms: Option<i64>,
    ) -> Result<SyncPullResponse> {
        self.request_with_retry(token, "/api/sync/pull", &SyncPullRequest { since_ms })
            .await
    }

    async fn request_with_retry<B, R>(&self, token: &str, path: &str, body: &B) -> Result<R>
    where
        B: Serialize,
        R: serde::de::DeserializeOwned,
    {
        let policy = &self.inner.config.retry;
        let mut attempt = 1;
        loop {
            match self.request_once(token, path, body).await {
                Ok(response) => return Ok(response),
                Err(err) if attempt < policy.max_attempts && is_transient(&err) => {
                    tracing::debug!(path, attempt, error = %err, "transient sync failure");
                    tokio::time::sleep(policy.delay_for(attempt)).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn request_once<B, R>(&self, token: &str, path: &str, body: &B) -> Result<R>
    where
        B: Serialize,
        R: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.inner.config.base_url, path);
        let resp = self
            .inner
            .client
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(ClientError::Backend { status, message });
        }

        resp.json()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))
    }
}

fn is_transient(err: &ClientError) -> bool {
    match err {
        ClientError::Network(_) => true,
        ClientError::Backend { status, .. } => *status >= 500 || *status == 429,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn fast_config(url: &str) -> SyncConfig {
        SyncConfig {
            base_url: url.to_string(),
            max_batch: MAX_SYNC_BATCH,
            retry: RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
            },
        }
    }

    fn a_list(id: &str) -> StudyList {
        StudyList::new(
            "u1",
            "test",
            ListKind::Flashcard,
            id,
            Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn guest_sync_is_skipped_without_network() {
        // Unroutable address: any network attempt would error out.
        let sync = CloudSync::new(fast_config("http://127.0.0.1:1"));
        let outcome = sync.sync_list(&a_list("l1")).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Skipped);
        assert_eq!(sync.pending_count(), 0);
    }

    #[tokio::test]
    async fn free_tier_sync_is_skipped_without_network() {
        let sync = CloudSync::new(fast_config("http://127.0.0.1:1"));
        sync.initialize("u1", "token", false);
        let outcome = sync.sync_list(&a_list("l1")).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Skipped);
        assert!(sync.fetch_all().await.unwrap().lists.is_empty());
        assert_eq!(sync.poll_changes().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_push_is_queued_and_stays_queued() {
        let sync = CloudSync::new(fast_config("http://127.0.0.1:1"));
        sync.initialize("u1", "token", true);

        let outcome = sync.sync_list(&a_list("l1")).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Queued);
        assert_eq!(sync.pending_count(), 1);

        // Backend is still unreachable; the batch survives the flush.
        assert_eq!(sync.flush_pending().await.unwrap(), 0);
        assert_eq!(sync.pending_count(), 1);
    }

    #[test]
    fn batches_split_at_the_cap() {
        let lists: Vec<WireStudyList> = (0..501)
            .map(|i| list_to_wire(&a_list(&format!("l{i}")), false))
            .collect();
        let items = vec![item_to_wire(
            &SavedStudyItem::new(
                "u1",
                ContentType::Vocabulary,
                "はなす",
                "i1",
                Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
            ),
            false,
        )];

        let batches = build_batches(lists, items, MAX_SYNC_BATCH);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].lists.len(), 500);
        assert_eq!(batches[1].lists.len(), 1);
        assert_eq!(batches[1].items.len(), 1);
    }

    #[test]
    fn wire_conversion_round_trips_epoch_millis() {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 45).unwrap();
        let mut list = a_list("l1");
        list.updated_at = at;
        list.version = 7;

        let wire = list_to_wire(&list, false);
        assert_eq!(wire.updated_at_ms, at.timestamp_millis());

        let back = list_from_wire("u1", &wire);
        assert_eq!(back.updated_at, at);
        assert_eq!(back.version, 7);
        assert_eq!(back.kind, ListKind::Flashcard);
    }
}
