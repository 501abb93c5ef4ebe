//! Database rows and API types

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

use review_core::types::{
    ContentType, ItemResult, ItemStats, Priority, ReviewItem, ReviewSession, ReviewSet,
    ReviewStatus, SetProgress,
};

// === Database Entity Types ===

/// Account record (auth token, entitlements, lifetime XP)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: String,
    pub token: String,
    pub display_name: Option<String>,
    pub is_premium: bool,
    pub is_admin: bool,
    pub total_xp: i64,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// Review item stored in PostgreSQL
#[derive(Debug, Clone, FromRow)]
pub struct DbReviewItem {
    pub id: String,
    pub user_id: String,
    pub content_type: String,
    pub content_id: String,
    pub primary_text: String,
    pub secondary_text: Option<String>,
    pub tertiary_text: Option<String>,
    pub audio_url: Option<String>,
    pub image_url: Option<String>,
    pub status: String,
    pub interval_days: i32,
    pub ease_factor: f64,
    pub repetitions: i32,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub next_review_at: DateTime<Utc>,
    pub review_count: i32,
    pub correct_count: i32,
    pub incorrect_count: i32,
    pub current_streak: i32,
    pub best_streak: i32,
    pub avg_response_ms: f64,
    pub tags: Vec<String>,
    pub set_ids: Vec<String>,
    pub priority: String,
    pub pinned_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbReviewItem {
    pub fn from_core(item: &ReviewItem) -> Self {
        Self {
            id: item.id.clone(),
            user_id: item.user_id.clone(),
            content_type: item.content_type.as_str().to_string(),
            content_id: item.content_id.clone(),
            primary_text: item.primary_text.clone(),
            secondary_text: item.secondary_text.clone(),
            tertiary_text: item.tertiary_text.clone(),
            audio_url: item.audio_url.clone(),
            image_url: item.image_url.clone(),
            status: item.status.as_str().to_string(),
            interval_days: item.interval_days as i32,
            ease_factor: item.ease_factor,
            repetitions: item.repetitions as i32,
            last_reviewed_at: item.last_reviewed_at,
            next_review_at: item.next_review_at,
            review_count: item.stats.review_count as i32,
            correct_count: item.stats.correct_count as i32,
            incorrect_count: item.stats.incorrect_count as i32,
            current_streak: item.stats.current_streak as i32,
            best_streak: item.stats.best_streak as i32,
            avg_response_ms: item.stats.avg_response_ms,
            tags: item.tags.clone(),
            set_ids: item.set_ids.clone(),
            priority: item.priority.as_str().to_string(),
            pinned_at: item.pinned_at,
            is_active: item.is_active,
            version: item.version as i64,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }

    pub fn to_core(&self) -> ReviewItem {
        ReviewItem {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            content_type: ContentType::from_str(&self.content_type)
                .unwrap_or(ContentType::Custom),
            content_id: self.content_id.clone(),
            primary_text: self.primary_text.clone(),
            secondary_text: self.secondary_text.clone(),
            tertiary_text: self.tertiary_text.clone(),
            audio_url: self.audio_url.clone(),
            image_url: self.image_url.clone(),
            status: ReviewStatus::from_str(&self.status).unwrap_or_default(),
            interval_days: self.interval_days.max(0) as u32,
            ease_factor: self.ease_factor,
            repetitions: self.repetitions.max(0) as u32,
            last_reviewed_at: self.last_reviewed_at,
            next_review_at: self.next_review_at,
            stats: ItemStats {
                review_count: self.review_count.max(0) as u32,
                correct_count: self.correct_count.max(0) as u32,
                incorrect_count: self.incorrect_count.max(0) as u32,
                current_streak: self.current_streak.max(0) as u32,
                best_streak: self.best_streak.max(0) as u32,
                avg_response_ms: self.avg_response_ms,
            },
            tags: self.tags.clone(),
            set_ids: self.set_ids.clone(),
            priority: Priority::from_str(&self.priority).unwrap_or_default(),
            pinned_at: self.pinned_at,
            is_active: self.is_active,
            version: self.version.max(0) as u64,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Review set stored in PostgreSQL
#[derive(Debug, Clone, FromRow)]
pub struct DbReviewSet {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub item_ids: Vec<String>,
    pub item_count: i32,
    pub content_types: Vec<String>,
    pub is_public: bool,
    pub shared_with: Vec<String>,
    pub original_set_id: Option<String>,
    pub progress_new: i32,
    pub progress_learning: i32,
    pub progress_mastered: i32,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbReviewSet {
    pub fn from_core(set: &ReviewSet) -> Self {
        Self {
            id: set.id.clone(),
            user_id: set.user_id.clone(),
            name: set.name.clone(),
            description: set.description.clone(),
            item_ids: set.item_ids.clone(),
            item_count: set.item_count as i32,
            content_types: set
                .content_types
                .iter()
                .map(|c| c.as_str().to_string())
                .collect(),
            is_public: set.is_public,
            shared_with: set.shared_with.clone(),
            original_set_id: set.original_set_id.clone(),
            progress_new: set.progress.new as i32,
            progress_learning: set.progress.learning as i32,
            progress_mastered: set.progress.mastered as i32,
            version: set.version as i64,
            created_at: set.created_at,
            updated_at: set.updated_at,
        }
    }

    pub fn to_core(&self) -> ReviewSet {
        ReviewSet {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            item_ids: self.item_ids.clone(),
            item_count: self.item_count.max(0) as u32,
            content_types: self
                .content_types
                .iter()
                .filter_map(|c| ContentType::from_str(c))
                .collect(),
            is_public: self.is_public,
            shared_with: self.shared_with.clone(),
            original_set_id: self.original_set_id.clone(),
            progress: SetProgress {
                new: self.progress_new.max(0) as u32,
                learning: self.progress_learning.max(0) as u32,
                mastered: self.progress_mastered.max(0) as u32,
            },
            version: self.version.max(0) as u64,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Review session stored in PostgreSQL
#[derive(Debug, Clone, FromRow)]
pub struct DbReviewSession {
    pub id: String,
    pub user_id: String,
    pub set_id: Option<String>,
    pub planned_items: i32,
    pub items_reviewed: Json<Vec<ItemResult>>,
    pub accuracy: f64,
    pub avg_response_ms: f64,
    pub correct_items: i32,
    pub incorrect_items: i32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub is_completed: bool,
    pub paused_at: Option<DateTime<Utc>>,
    pub paused_ms: i64,
    pub duration_ms: Option<i64>,
    pub xp_awarded: bool,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl DbReviewSession {
    pub fn from_core(session: &ReviewSession) -> Self {
        Self {
            id: session.id.clone(),
            user_id: session.user_id.clone(),
            set_id: session.set_id.clone(),
            planned_items: session.planned_items as i32,
            items_reviewed: Json(session.items_reviewed.clone()),
            accuracy: session.accuracy,
            avg_response_ms: session.avg_response_ms,
            correct_items: session.correct_items as i32,
            incorrect_items: session.incorrect_items as i32,
            started_at: session.started_at,
            completed_at: session.completed_at,
            is_completed: session.is_completed,
            paused_at: session.paused_at,
            paused_ms: session.paused_ms,
            duration_ms: session.duration_ms,
            xp_awarded: false,
            version: session.version as i64,
            updated_at: session.updated_at,
        }
    }

    pub fn to_core(&self) -> ReviewSession {
        ReviewSession {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            set_id: self.set_id.clone(),
            planned_items: self.planned_items.max(0) as u32,
            items_reviewed: self.items_reviewed.0.clone(),
            accuracy: self.accuracy,
            avg_response_ms: self.avg_response_ms,
            correct_items: self.correct_items.max(0) as u32,
            incorrect_items: self.incorrect_items.max(0) as u32,
            started_at: self.started_at,
            completed_at: self.completed_at,
            is_completed: self.is_completed,
            paused_at: self.paused_at,
            paused_ms: self.paused_ms,
            duration_ms: self.duration_ms,
            version: self.version.max(0) as u64,
            updated_at: self.updated_at,
        }
    }
}

/// Synced study list row (tombstoned via deleted_at)
#[derive(Debug, Clone, FromRow)]
pub struct DbStudyList {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub kind: String,
    pub item_ids: Vec<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Synced saved item row (tombstoned via deleted_at)
#[derive(Debug, Clone, FromRow)]
pub struct DbSavedItem {
    pub id: String,
    pub user_id: String,
    pub content_type: String,
    pub primary_text: String,
    pub secondary_text: Option<String>,
    pub part_of_speech: Option<String>,
    pub tags: Vec<String>,
    pub list_ids: Vec<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

// === Timestamp conversion (wire uses epoch milliseconds) ===

pub fn ms_to_utc(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or_else(|| Utc.timestamp_millis_opt(0).unwrap())
}

pub fn utc_to_ms(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

// === Sync wire types (epoch-ms timestamps) ===

/// Per-push batch cap; larger pushes must be split by the client.
pub const MAX_SYNC_BATCH: usize = 500;

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

impl DbStudyList {
    pub fn to_wire(&self) -> WireStudyList {
        WireStudyList {
            id: self.id.clone(),
            name: self.name.clone(),
            kind: self.kind.clone(),
            item_ids: self.item_ids.clone(),
            version: self.version,
            created_at_ms: utc_to_ms(self.created_at),
            updated_at_ms: utc_to_ms(self.updated_at),
            deleted: self.deleted_at.is_some(),
        }
    }

    pub fn from_wire(user_id: &str, wire: &WireStudyList, now: DateTime<Utc>) -> Self {
        Self {
            id: wire.id.clone(),
            user_id: user_id.to_string(),
            name: wire.name.clone(),
            kind: wire.kind.clone(),
            item_ids: wire.item_ids.clone(),
            version: wire.version,
            created_at: ms_to_utc(wire.created_at_ms),
            updated_at: ms_to_utc(wire.updated_at_ms),
            deleted_at: if wire.deleted { Some(now) } else { None },
        }
    }
}

impl DbSavedItem {
    pub fn to_wire(&self) -> WireSavedItem {
        WireSavedItem {
            id: self.id.clone(),
            content_type: self.content_type.clone(),
            primary_text: self.primary_text.clone(),
            secondary_text: self.secondary_text.clone(),
            part_of_speech: self.part_of_speech.clone(),
            tags: self.tags.clone(),
            list_ids: self.list_ids.clone(),
            version: self.version,
            created_at_ms: utc_to_ms(self.created_at),
            updated_at_ms: utc_to_ms(self.updated_at),
            deleted: self.deleted_at.is_some(),
        }
    }

    pub fn from_wire(user_id: &str, wire: &WireSavedItem, now: DateTime<Utc>) -> Self {
        Self {
            id: wire.id.clone(),
            user_id: user_id.to_string(),
            content_type: wire.content_type.clone(),
            primary_text: wire.primary_text.clone(),
            secondary_text: wire.secondary_text.clone(),
            part_of_speech: wire.part_of_speech.clone(),
            tags: wire.tags.clone(),
            list_ids: wire.list_ids.clone(),
            version: wire.version,
            created_at: ms_to_utc(wire.created_at_ms),
            updated_at: ms_to_utc(wire.updated_at_ms),
            deleted_at: if wire.deleted { Some(now) } else { None },
        }
    }
}

/// Version/timestamp pair viewed through the core merge policy.
pub struct MergeStamp {
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl review_core::Versioned for MergeStamp {
    fn version(&self) -> u64 {
        self.version
    }
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

// === API Request/Response Types ===

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub account_id: String,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub account_id: String,
    pub display_name: Option<String>,
    pub is_premium: bool,
    pub total_xp: i64,
    pub level: u32,
    pub title: String,
    pub xp_to_next_level: u64,
    pub progress_percentage: f64,
}

// Item types

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateItemRequest {
    pub content_type: String,
    pub content_id: String,
    pub primary_text: String,
    pub secondary_text: Option<String>,
    pub tertiary_text: Option<String>,
    pub audio_url: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub priority: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateItemRequest {
    /// Version the caller last read; mismatch is a conflict.
    pub version: i64,
    pub primary_text: Option<String>,
    pub secondary_text: Option<String>,
    pub tertiary_text: Option<String>,
    pub audio_url: Option<String>,
    pub image_url: Option<String>,
    pub tags: Option<Vec<String>>,
    pub priority: Option<String>,
    pub pinned: Option<bool>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ItemListQuery {
    pub status: Option<String>,
    pub content_type: Option<String>,
    /// Only items due at or before this instant (epoch ms).
    pub due_before_ms: Option<i64>,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ItemListResponse {
    pub items: Vec<ReviewItem>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub correct: bool,
    pub response_ms: u32,
    pub response_quality: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ItemStatsResponse {
    pub total_items: usize,
    pub accuracy: f64,
    pub due_today: usize,
}

// Set types

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSetRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateSetRequest {
    pub version: i64,
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
    pub shared_with: Option<Vec<String>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SetItemsRequest {
    #[serde(default)]
    pub add: Vec<String>,
    #[serde(default)]
    pub remove: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetListResponse {
    pub sets: Vec<ReviewSet>,
}

// Session types

#[derive(Debug, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub set_id: Option<String>,
    pub planned_items: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResultRequest {
    pub item_id: String,
    pub correct: bool,
    pub response_ms: u32,
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    pub confidence: Option<u8>,
    #[serde(default)]
    pub hints_used: u32,
}

fn default_attempts() -> u32 {
    1
}

#[derive(Debug, Serialize, Deserialize)]
pub struct XpAwardBody {
    pub session_xp: u32,
    pub bonus_xp: u32,
    pub total_xp: i64,
    pub levels_gained: Vec<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompleteSessionResponse {
    pub session: ReviewSession,
    /// Absent when XP was already granted for this session.
    pub xp: Option<XpAwardBody>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SessionListQuery {
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionListResponse {
    pub sessions: Vec<ReviewSession>,
    pub next_cursor: Option<String>,
}

// Sync types

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SyncPushRequest {
    #[serde(default)]
    pub lists: Vec<WireStudyList>,
    #[serde(default)]
    pub items: Vec<WireSavedItem>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncPushResponse {
    pub applied: usize,
    /// Records that lost the merge against newer server state.
    pub discarded: usize,
    pub server_time_ms: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SyncPullRequest {
    pub since_ms: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncPullResponse {
    pub lists: Vec<WireStudyList>,
    pub items: Vec<WireSavedItem>,
    pub server_time_ms: i64,
}
