//! Review session lifecycle and aggregates.
//!
//! Aggregate fields on [`ReviewSession`] are derived from `items_reviewed`
//! and recomputed on every append. Completion freezes them; pausing
//! accumulates elapsed pause time so the final duration is net of pauses.

use chrono::{DateTime, Utc};

use crate::error::{CoreError, Result};
use crate::types::{ItemResult, ReviewSession};

/// Create a session in its initial running state.
pub fn start(
    id: impl Into<String>,
    user_id: impl Into<String>,
    set_id: Option<String>,
    planned_items: u32,
    now: DateTime<Utc>,
) -> ReviewSession {
    ReviewSession {
        id: id.into(),
        user_id: user_id.into(),
        set_id,
        planned_items,
        items_reviewed: Vec::new(),
        accuracy: 0.0,
        avg_response_ms: 0.0,
        correct_items: 0,
        incorrect_items: 0,
        started_at: now,
        completed_at: None,
        is_completed: false,
        paused_at: None,
        paused_ms: 0,
        duration_ms: None,
        version: 1,
        updated_at: now,
    }
}

/// Append one item result and recompute the aggregates.
pub fn record_result(
    session: &mut ReviewSession,
    result: ItemResult,
    now: DateTime<Utc>,
) -> Result<()> {
    if session.is_completed {
        return Err(CoreError::SessionCompleted);
    }
    session.items_reviewed.push(result);
    recompute(session);
    touch(session, now);
    Ok(())
}

/// Pause the session clock.
pub fn pause(session: &mut ReviewSession, now: DateTime<Utc>) -> Result<()> {
    if session.is_completed {
        return Err(CoreError::SessionCompleted);
    }
    if session.paused_at.is_some() {
        return Err(CoreError::SessionAlreadyPaused);
    }
    session.paused_at = Some(now);
    touch(session, now);
    Ok(())
}

/// Resume a paused session, folding the pause into `paused_ms`.
pub fn resume(session: &mut ReviewSession, now: DateTime<Utc>) -> Result<()> {
    if session.is_completed {
        return Err(CoreError::SessionCompleted);
    }
    let paused_at = session.paused_at.take().ok_or(CoreError::SessionNotPaused)?;
    session.paused_ms += (now - paused_at).num_milliseconds().max(0);
    touch(session, now);
    Ok(())
}

/// Complete the session: stamp `completed_at`, compute the net duration,
/// freeze the statistics.
pub fn complete(session: &mut ReviewSession, now: DateTime<Utc>) -> Result<()> {
    if session.is_completed {
        return Err(CoreError::SessionCompleted);
    }
    // A session completed while paused ends its pause at completion.
    if session.paused_at.is_some() {
        resume(session, now)?;
    }
    session.is_completed = true;
    session.completed_at = Some(now);
    let elapsed = (now - session.started_at).num_milliseconds();
    session.duration_ms = Some((elapsed - session.paused_ms).max(0));
    touch(session, now);
    Ok(())
}

fn recompute(session: &mut ReviewSession) {
    let total = session.items_reviewed.len() as u32;
    session.correct_items = session.items_reviewed.iter().filter(|r| r.correct).count() as u32;
    session.incorrect_items = total - session.correct_items;
    if total == 0 {
        session.accuracy = 0.0;
        session.avg_response_ms = 0.0;
    } else {
        session.accuracy = session.correct_items as f64 / total as f64;
        session.avg_response_ms = session
            .items_reviewed
            .iter()
            .map(|r| r.response_ms as f64)
            .sum::<f64>()
            / total as f64;
    }
}

fn touch(session: &mut ReviewSession, now: DateTime<Utc>) {
    session.version += 1;
    session.updated_at = now;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn result(correct: bool, response_ms: u32) -> ItemResult {
        ItemResult {
            item_id: "i1".into(),
            correct,
            response_ms,
            attempts: 1,
            confidence: None,
            hints_used: 0,
        }
    }

    #[test]
    fn aggregates_follow_appends() {
        let mut s = start("s1", "u1", None, 3, at(0));
        record_result(&mut s, result(true, 1000), at(5)).unwrap();
        record_result(&mut s, result(false, 3000), at(10)).unwrap();
        assert_eq!(s.correct_items, 1);
        assert_eq!(s.incorrect_items, 1);
        assert_eq!(s.accuracy, 0.5);
        assert_eq!(s.avg_response_ms, 2000.0);

        record_result(&mut s, result(true, 2000), at(15)).unwrap();
        assert_eq!(s.accuracy, 2.0 / 3.0);
        assert_eq!(s.avg_response_ms, 2000.0);
    }

    #[test]
    fn completion_freezes_the_session() {
        let mut s = start("s1", "u1", None, 1, at(0));
        record_result(&mut s, result(true, 1000), at(5)).unwrap();
        complete(&mut s, at(60)).unwrap();
        assert!(s.is_completed);
        assert_eq!(s.duration_ms, Some(60_000));
        assert_eq!(
            record_result(&mut s, result(true, 1000), at(65)),
            Err(CoreError::SessionCompleted)
        );
        assert_eq!(complete(&mut s, at(70)), Err(CoreError::SessionCompleted));
    }

    #[test]
    fn paused_time_is_excluded_from_duration() {
        let mut s = start("s1", "u1", None, 1, at(0));
        pause(&mut s, at(10)).unwrap();
        resume(&mut s, at(40)).unwrap();
        assert_eq!(s.paused_ms, 30_000);
        complete(&mut s, at(100)).unwrap();
        assert_eq!(s.duration_ms, Some(70_000));
    }

    #[test]
    fn pause_resume_guards() {
        let mut s = start("s1", "u1", None, 1, at(0));
        assert_eq!(resume(&mut s, at(5)), Err(CoreError::SessionNotPaused));
        pause(&mut s, at(10)).unwrap();
        assert_eq!(pause(&mut s, at(15)), Err(CoreError::SessionAlreadyPaused));
    }

    #[test]
    fn completing_while_paused_closes_the_pause() {
        let mut s = start("s1", "u1", None, 1, at(0));
        pause(&mut s, at(20)).unwrap();
        complete(&mut s, at(50)).unwrap();
        assert_eq!(s.paused_ms, 30_000);
        assert_eq!(s.duration_ms, Some(20_000));
    }

    #[test]
    fn version_bumps_on_every_mutation() {
        let mut s = start("s1", "u1", None, 1, at(0));
        let v0 = s.version;
        record_result(&mut s, result(true, 500), at(1)).unwrap();
        pause(&mut s, at(2)).unwrap();
        resume(&mut s, at(3)).unwrap();
        complete(&mut s, at(4)).unwrap();
        assert_eq!(s.version, v0 + 4);
    }
}
