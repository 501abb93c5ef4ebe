//! Experience points and leveling.
//!
//! Session XP is a sum of flat bonuses (completion, accuracy tier, speed
//! tier, per-item up to a cap, no-hints). Levels 1..=100 come from a
//! strictly increasing threshold table; `level_for_xp` is its inverse.

use std::collections::HashSet;

use serde::Serialize;

use crate::types::ReviewSession;

pub const MAX_LEVEL: u32 = 100;

const COMPLETION_BONUS: u32 = 50;
const PER_ITEM_XP: u32 = 2;
const PER_ITEM_CAP: u32 = 40;
const NO_HINTS_BONUS: u32 = 15;
/// One-time bonus granted per level crossed.
const LEVEL_UP_BONUS: u32 = 25;

const LEVEL_TITLES: [&str; 10] = [
    "Beginner", "Novice", "Apprentice", "Student", "Adept",
    "Scholar", "Expert", "Veteran", "Master", "Sage",
];

fn accuracy_bonus(accuracy: f64) -> u32 {
    if accuracy >= 0.95 {
        50
    } else if accuracy >= 0.85 {
        30
    } else if accuracy >= 0.70 {
        15
    } else {
        0
    }
}

fn speed_bonus(avg_response_ms: f64) -> u32 {
    if avg_response_ms <= 0.0 {
        0
    } else if avg_response_ms < 3000.0 {
        25
    } else if avg_response_ms < 5000.0 {
        10
    } else {
        0
    }
}

/// XP awarded for one session.
///
/// Incomplete sessions earn `floor(full * reviewed / planned)`.
pub fn calculate_session_xp(session: &ReviewSession) -> u32 {
    let reviewed = session.items_reviewed.len() as u32;
    if reviewed == 0 {
        return 0;
    }

    let no_hints = session.items_reviewed.iter().all(|r| r.hints_used == 0);
    let full = COMPLETION_BONUS
        + accuracy_bonus(session.accuracy)
        + speed_bonus(session.avg_response_ms)
        + (PER_ITEM_XP * reviewed).min(PER_ITEM_CAP)
        + if no_hints { NO_HINTS_BONUS } else { 0 };

    if session.is_completed {
        full
    } else {
        let planned = session.planned_items.max(reviewed);
        full * reviewed / planned
    }
}

/// Total XP required to reach `level` (strictly increasing in `level`).
pub fn xp_for_level(level: u32) -> u64 {
    let n = level.clamp(1, MAX_LEVEL) as u64;
    50 * (n - 1) * (n - 1)
}

/// Precomputed level thresholds with binary-search lookup.
#[derive(Debug, Clone)]
pub struct LevelTable {
    thresholds: Vec<u64>,
}

impl Default for LevelTable {
    fn default() -> Self {
        Self::new()
    }
}

impl LevelTable {
    pub fn new() -> Self {
        Self {
            thresholds: (1..=MAX_LEVEL).map(xp_for_level).collect(),
        }
    }

    /// Level for a lifetime XP total, in [1, 100].
    pub fn level_for_xp(&self, total_xp: u64) -> u32 {
        let reached = self.thresholds.partition_point(|t| *t <= total_xp) as u32;
        reached.clamp(1, MAX_LEVEL)
    }

    /// Level plus progress details for display.
    pub fn user_level(&self, total_xp: u64) -> UserLevel {
        let level = self.level_for_xp(total_xp);
        let floor = xp_for_level(level);
        let current_xp = total_xp - floor;
        let (xp_to_next_level, progress_percentage) = if level >= MAX_LEVEL {
            (0, 100.0)
        } else {
            let span = xp_for_level(level + 1) - floor;
            let to_next = span - current_xp;
            (to_next, current_xp as f64 / span as f64 * 100.0)
        };
        UserLevel {
            level,
            title: LEVEL_TITLES[((level - 1) / 10) as usize],
            current_xp,
            xp_to_next_level,
            progress_percentage,
        }
    }
}

/// Resolved level information for a user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserLevel {
    pub level: u32,
    pub title: &'static str,
    pub current_xp: u64,
    pub xp_to_next_level: u64,
    pub progress_percentage: f64,
}

/// Levels crossed by adding `gained` XP on top of `base`, and the one-time
/// bonus those crossings pay. The bonus never triggers further crossings.
pub fn levels_crossed(table: &LevelTable, base: u64, gained: u64) -> (Vec<u32>, u32) {
    let before = table.level_for_xp(base);
    let after = table.level_for_xp(base + gained);
    let levels: Vec<u32> = (before + 1..=after).collect();
    let bonus = LEVEL_UP_BONUS * levels.len() as u32;
    (levels, bonus)
}

/// Outcome of granting session XP.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XpAward {
    pub session_xp: u32,
    /// One-time bonus for the levels crossed by this award.
    pub bonus_xp: u32,
    pub total_xp: u64,
    pub levels_gained: Vec<u32>,
}

/// Tracks a user's XP total and guards against double-awarding.
///
/// The idempotency key is the session id: a second award for the same
/// session returns `None` and changes nothing.
#[derive(Debug, Clone)]
pub struct XpLedger {
    total_xp: u64,
    awarded_sessions: HashSet<String>,
    table: LevelTable,
}

impl XpLedger {
    pub fn new(total_xp: u64) -> Self {
        Self {
            total_xp,
            awarded_sessions: HashSet::new(),
            table: LevelTable::new(),
        }
    }

    pub fn total_xp(&self) -> u64 {
        self.total_xp
    }

    pub fn user_level(&self) -> UserLevel {
        self.table.user_level(self.total_xp)
    }

    /// Grant XP for a session at most once.
    ///
    /// Levels crossed by the grant each pay a one-time bonus; the bonus
    /// itself never triggers further level events.
    pub fn award(&mut self, session_id: &str, session_xp: u32) -> Option<XpAward> {
        if !self.awarded_sessions.insert(session_id.to_string()) {
            return None;
        }

        let (levels_gained, bonus_xp) =
            levels_crossed(&self.table, self.total_xp, session_xp as u64);

        self.total_xp += session_xp as u64 + bonus_xp as u64;

        Some(XpAward {
            session_xp,
            bonus_xp,
            total_xp: self.total_xp,
            levels_gained,
        })
    }
}
