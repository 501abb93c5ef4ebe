//! Last-writer-wins conflict resolution.
//!
//! The version-then-timestamp comparison lives here and nowhere else;
//! every reconciliation path (startup pull, remote-change events, server
//! sync push) goes through [`resolve`].

use chrono::{DateTime, Utc};

/// Entities that carry optimistic-concurrency metadata.
pub trait Versioned {
    fn version(&self) -> u64;
    fn updated_at(&self) -> DateTime<Utc>;
}

/// Which side of a merge survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    Local,
    Remote,
}

/// Pick the surviving entity: higher version wins, ties fall back to the
/// later `updated_at`, full ties keep the local side.
pub fn resolve<L: Versioned, R: Versioned>(local: &L, remote: &R) -> Winner {
    use std::cmp::Ordering;
    match remote.version().cmp(&local.version()) {
        Ordering::Greater => Winner::Remote,
        Ordering::Less => Winner::Local,
        Ordering::Equal => {
            if remote.updated_at() > local.updated_at() {
                Winner::Remote
            } else {
                Winner::Local
            }
        }
    }
}
