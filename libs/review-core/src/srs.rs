//! Spaced-repetition scheduler.
//!
//! SM-2 family: interval grows multiplicatively by the ease factor after
//! two fixed warm-up intervals; a miss resets the repetition streak. The
//! caller injects `now`, so scheduling is deterministic and side-effect
//! free; persisting the result is the caller's job.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ReviewStatus;

/// Ease factor assigned to brand-new items.
pub const INITIAL_EASE: f64 = 2.5;

/// Scheduling state consumed by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub interval_days: u32,
    pub ease_factor: f64,
    pub repetitions: u32,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            interval_days: 0,
            ease_factor: INITIAL_EASE,
            repetitions: 0,
        }
    }
}

/// New scheduling state produced by a review.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleOutcome {
    pub interval_days: u32,
    pub ease_factor: f64,
    pub repetitions: u32,
    pub status: ReviewStatus,
    pub next_review_at: DateTime<Utc>,
}

/// Scheduler with configurable parameters.
#[derive(Debug, Clone)]
pub struct SrsScheduler {
    /// Interval an item falls back to after an incorrect answer.
    pub lapse_interval_days: u32,
    /// Fixed interval after the first correct answer.
    pub first_interval_days: u32,
    /// Fixed interval after the second consecutive correct answer.
    pub second_interval_days: u32,
    pub min_ease: f64,
    pub max_ease: f64,
    /// Ease gained on a correct answer (scaled by response quality).
    pub ease_bonus: f64,
    /// Ease lost on an incorrect answer.
    pub ease_penalty: f64,
    /// Interval at which an item counts as mastered.
    pub mastery_interval_days: u32,
}

impl Default for SrsScheduler {
    fn default() -> Self {
        Self {
            lapse_interval_days: 1,
            first_interval_days: 1,
            second_interval_days: 6,
            min_ease: 1.3,
            max_ease: 2.5,
            ease_bonus: 0.1,
            ease_penalty: 0.2,
            mastery_interval_days: 21,
        }
    }
}

impl SrsScheduler {
    /// Compute the next scheduling state for one review outcome.
    ///
    /// `response_quality`, when given, is clamped to [0, 1] and scales the
    /// ease bonus on correct answers; it never affects incorrect ones.
    pub fn next(
        &self,
        current: &Schedule,
        correct: bool,
        response_quality: Option<f64>,
        now: DateTime<Utc>,
    ) -> ScheduleOutcome {
        if !correct {
            let ease = (current.ease_factor - self.ease_penalty).max(self.min_ease);
            return self.outcome(self.lapse_interval_days, ease, 0, now);
        }

        let repetitions = current.repetitions + 1;
        let interval_days = match repetitions {
            1 => self.first_interval_days,
            2 => self.second_interval_days.max(current.interval_days),
            _ => {
                let grown = (current.interval_days as f64 * current.ease_factor).round() as u32;
                // Growth must be strictly positive even at minimum ease.
                grown.max(current.interval_days + 1)
            }
        };

        let quality = response_quality.unwrap_or(1.0).clamp(0.0, 1.0);
        let ease = (current.ease_factor + self.ease_bonus * quality)
            .clamp(self.min_ease, self.max_ease);

        self.outcome(interval_days, ease, repetitions, now)
    }

    /// Initial state for an item that has never been reviewed.
    pub fn initial(&self) -> Schedule {
        Schedule::default()
    }

    fn outcome(
        &self,
        interval_days: u32,
        ease_factor: f64,
        repetitions: u32,
        now: DateTime<Utc>,
    ) -> ScheduleOutcome {
        let status = if interval_days >= self.mastery_interval_days {
            ReviewStatus::Mastered
        } else {
            ReviewStatus::Learning
        };
        ScheduleOutcome {
            interval_days,
            ease_factor,
            repetitions,
            status,
            next_review_at: now + Duration::days(interval_days as i64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn incorrect_resets_repetitions_and_interval() {
        let srs = SrsScheduler::default();
        let state = Schedule {
            interval_days: 30,
            ease_factor: 2.2,
            repetitions: 6,
        };
        let out = srs.next(&state, false, None, at());
        assert_eq!(out.repetitions, 0);
        assert_eq!(out.interval_days, srs.lapse_interval_days);
        assert_eq!(out.ease_factor, 2.0);
    }

    #[test]
    fn ease_never_drops_below_floor() {
        let srs = SrsScheduler::default();
        let mut state = Schedule {
            interval_days: 5,
            ease_factor: 1.35,
            repetitions: 2,
        };
        for _ in 0..4 {
            let out = srs.next(&state, false, None, at());
            assert!(out.ease_factor >= srs.min_ease);
            state = Schedule {
                interval_days: out.interval_days,
                ease_factor: out.ease_factor,
                repetitions: out.repetitions,
            };
        }
        assert_eq!(state.ease_factor, srs.min_ease);
    }

    #[test]
    fn new_item_follows_growth_curve() {
        let srs = SrsScheduler::default();
        let mut state = srs.initial();
        let mut intervals = Vec::new();
        for _ in 0..3 {
            let out = srs.next(&state, true, None, at());
            intervals.push(out.interval_days);
            assert!(out.ease_factor <= srs.max_ease);
            state = Schedule {
                interval_days: out.interval_days,
                ease_factor: out.ease_factor,
                repetitions: out.repetitions,
            };
        }
        assert_eq!(state.repetitions, 3);
        assert_eq!(intervals, vec![1, 6, 15]);
        assert_eq!(state.ease_factor, INITIAL_EASE);
    }

    #[test]
    fn interval_is_non_decreasing_over_correct_streak() {
        let srs = SrsScheduler::default();
        let mut state = srs.initial();
        let mut prev = 0;
        for n in 1..=10 {
            let out = srs.next(&state, true, None, at());
            assert!(out.interval_days >= prev, "shrank at repetition {n}");
            assert_eq!(out.repetitions, n);
            prev = out.interval_days;
            state = Schedule {
                interval_days: out.interval_days,
                ease_factor: out.ease_factor,
                repetitions: out.repetitions,
            };
        }
    }

    #[test]
    fn next_review_is_now_plus_interval() {
        let srs = SrsScheduler::default();
        let state = Schedule {
            interval_days: 6,
            ease_factor: 2.5,
            repetitions: 2,
        };
        let out = srs.next(&state, true, None, at());
        assert_eq!(out.next_review_at, at() + Duration::days(out.interval_days as i64));
    }

    #[test]
    fn response_quality_scales_ease_gain() {
        let srs = SrsScheduler::default();
        let state = Schedule {
            interval_days: 6,
            ease_factor: 2.0,
            repetitions: 2,
        };
        let slow = srs.next(&state, true, Some(0.0), at());
        let fast = srs.next(&state, true, Some(1.0), at());
        assert_eq!(slow.ease_factor, 2.0);
        assert_eq!(fast.ease_factor, 2.1);
    }

    #[test]
    fn long_interval_marks_mastered() {
        let srs = SrsScheduler::default();
        let state = Schedule {
            interval_days: 15,
            ease_factor: 2.5,
            repetitions: 3,
        };
        let out = srs.next(&state, true, None, at());
        assert!(out.interval_days >= srs.mastery_interval_days);
        assert_eq!(out.status, ReviewStatus::Mastered);
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let srs = SrsScheduler::default();
        let state = Schedule {
            interval_days: 9,
            ease_factor: 2.1,
            repetitions: 4,
        };
        let a = srs.next(&state, true, Some(0.6), at());
        let b = srs.next(&state, true, Some(0.6), at());
        assert_eq!(a, b);
    }
}
