//! Core entity types shared by the backend and the client engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::merge::Versioned;

/// Kind of learnable content a review item tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Kana,
    Kanji,
    Vocabulary,
    Sentence,
    Phrase,
    Grammar,
    Custom,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kana => "kana",
            Self::Kanji => "kanji",
            Self::Vocabulary => "vocabulary",
            Self::Sentence => "sentence",
            Self::Phrase => "phrase",
            Self::Grammar => "grammar",
            Self::Custom => "custom",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "kana" => Some(Self::Kana),
            "kanji" => Some(Self::Kanji),
            "vocabulary" => Some(Self::Vocabulary),
            "sentence" => Some(Self::Sentence),
            "phrase" => Some(Self::Phrase),
            "grammar" => Some(Self::Grammar),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

/// Learning status of a review item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    New,
    Learning,
    Mastered,
}

impl Default for ReviewStatus {
    fn default() -> Self {
        Self::New
    }
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Learning => "learning",
            Self::Mastered => "mastered",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "learning" => Some(Self::Learning),
            "mastered" => Some(Self::Mastered),
            _ => None,
        }
    }
}

/// Review priority for queue ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Per-item review statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemStats {
    pub review_count: u32,
    pub correct_count: u32,
    pub incorrect_count: u32,
    pub current_streak: u32,
    pub best_streak: u32,
    pub avg_response_ms: f64,
}

impl ItemStats {
    /// Fold one review result into the running statistics.
    pub fn record(&mut self, correct: bool, response_ms: u32) {
        let total_ms = self.avg_response_ms * self.review_count as f64 + response_ms as f64;
        self.review_count += 1;
        self.avg_response_ms = total_ms / self.review_count as f64;
        if correct {
            self.correct_count += 1;
            self.current_streak += 1;
            self.best_streak = self.best_streak.max(self.current_streak);
        } else {
            self.incorrect_count += 1;
            self.current_streak = 0;
        }
    }
}

/// One learnable unit tracked for a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewItem {
    pub id: String,
    pub user_id: String,
    pub content_type: ContentType,
    pub content_id: String,

    pub primary_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tertiary_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    pub status: ReviewStatus,
    pub interval_days: u32,
    pub ease_factor: f64,
    pub repetitions: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub next_review_at: DateTime<Utc>,

    #[serde(flatten)]
    pub stats: ItemStats,

    pub tags: Vec<String>,
    pub set_ids: Vec<String>,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinned_at: Option<DateTime<Utc>>,

    pub is_active: bool,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewItem {
    /// New item in its initial scheduling state.
    pub fn new(
        user_id: impl Into<String>,
        content_type: ContentType,
        content_id: impl Into<String>,
        primary_text: impl Into<String>,
        id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            content_type,
            content_id: content_id.into(),
            primary_text: primary_text.into(),
            secondary_text: None,
            tertiary_text: None,
            audio_url: None,
            image_url: None,
            status: ReviewStatus::New,
            interval_days: 0,
            ease_factor: crate::srs::INITIAL_EASE,
            repetitions: 0,
            last_reviewed_at: None,
            next_review_at: now,
            stats: ItemStats::default(),
            tags: Vec::new(),
            set_ids: Vec::new(),
            priority: Priority::default(),
            pinned_at: None,
            is_active: true,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Current scheduling state, in the shape the scheduler consumes.
    pub fn schedule(&self) -> crate::srs::Schedule {
        crate::srs::Schedule {
            interval_days: self.interval_days,
            ease_factor: self.ease_factor,
            repetitions: self.repetitions,
        }
    }

    /// Apply a scheduling outcome and bump the version.
    pub fn apply_outcome(&mut self, outcome: &crate::srs::ScheduleOutcome, now: DateTime<Utc>) {
        self.interval_days = outcome.interval_days;
        self.ease_factor = outcome.ease_factor;
        self.repetitions = outcome.repetitions;
        self.status = outcome.status;
        self.last_reviewed_at = Some(now);
        self.next_review_at = outcome.next_review_at;
        self.touch(now);
    }

    /// Mark the item mutated: bump version, stamp updated_at.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.next_review_at <= now
    }
}

/// Denormalized per-status counts on a set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetProgress {
    pub new: u32,
    pub learning: u32,
    pub mastered: u32,
}

/// Named collection of review item references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewSet {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub item_ids: Vec<String>,
    pub item_count: u32,
    pub content_types: Vec<ContentType>,

    pub is_public: bool,
    pub shared_with: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_set_id: Option<String>,

    pub progress: SetProgress,

    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewSet {
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            name: name.into(),
            description: None,
            item_ids: Vec::new(),
            item_count: 0,
            content_types: Vec::new(),
            is_public: false,
            shared_with: Vec::new(),
            original_set_id: None,
            progress: SetProgress::default(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }
}

/// Result of reviewing one item within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    pub item_id: String,
    pub correct: bool,
    pub response_ms: u32,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
    pub hints_used: u32,
}

/// One timed review run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewSession {
    pub id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_id: Option<String>,

    pub planned_items: u32,
    pub items_reviewed: Vec<ItemResult>,

    // Recomputed from items_reviewed on every append; never set directly.
    pub accuracy: f64,
    pub avg_response_ms: f64,
    pub correct_items: u32,
    pub incorrect_items: u32,

    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub is_completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused_at: Option<DateTime<Utc>>,
    pub paused_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,

    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

/// Kind of a user-authored study list, constraining member content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    Flashcard,
    Sentence,
    Drill,
}

impl ListKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flashcard => "flashcard",
            Self::Sentence => "sentence",
            Self::Drill => "drill",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "flashcard" => Some(Self::Flashcard),
            "sentence" => Some(Self::Sentence),
            "drill" => Some(Self::Drill),
            _ => None,
        }
    }
}

/// User-authored study list, maintained by the client manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyList {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub kind: ListKind,
    pub item_ids: Vec<String>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StudyList {
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        kind: ListKind,
        id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            name: name.into(),
            kind,
            item_ids: Vec::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }
}

/// Content saved into user study lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedStudyItem {
    pub id: String,
    pub user_id: String,
    pub content_type: ContentType,
    pub primary_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_of_speech: Option<String>,
    pub tags: Vec<String>,
    pub list_ids: Vec<String>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SavedStudyItem {
    pub fn new(
        user_id: impl Into<String>,
        content_type: ContentType,
        primary_text: impl Into<String>,
        id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            content_type,
            primary_text: primary_text.into(),
            secondary_text: None,
            part_of_speech: None,
            tags: Vec::new(),
            list_ids: Vec::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }
}

impl Versioned for ReviewItem {
    fn version(&self) -> u64 {
        self.version
    }
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Versioned for ReviewSet {
    fn version(&self) -> u64 {
        self.version
    }
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Versioned for ReviewSession {
    fn version(&self) -> u64 {
        self.version
    }
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Versioned for StudyList {
    fn version(&self) -> u64 {
        self.version
    }
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Versioned for SavedStudyItem {
    fn version(&self) -> u64 {
        self.version
    }
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
