//! Core review library shared by the backend and client applications.
//!
//! Provides:
//! - Spaced-repetition scheduler (SM-2 family, injected clock)
//! - XP and level calculator with an idempotent award ledger
//! - Last-writer-wins merge policy for multi-device sync
//! - Word classification for drill-list admission
//! - Session lifecycle and aggregate statistics
//! - Shared entity types (ReviewItem, ReviewSet, ReviewSession, ...)

pub mod classify;
pub mod error;
pub mod merge;
pub mod session;
pub mod srs;
pub mod types;
pub mod xp;

pub use classify::{admits, classify, WordClass};
pub use error::{CoreError, Result};
pub use merge::{resolve, Versioned, Winner};
pub use srs::{Schedule, ScheduleOutcome, SrsScheduler};
pub use types::{
    ContentType, ItemResult, ItemStats, ListKind, Priority, ReviewItem, ReviewSession, ReviewSet,
    ReviewStatus, SavedStudyItem, SetProgress, StudyList,
};
pub use xp::{
    calculate_session_xp, levels_crossed, xp_for_level, LevelTable, UserLevel, XpAward, XpLedger,
};
