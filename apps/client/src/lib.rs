//! Offline-first client engine for kioku.
//!
//! Provides:
//! - Local store adapter (SQLite primary, flat JSON fallback)
//! - Cloud sync adapter (premium-gated, batched, retrying)
//! - Study list manager orchestrating both under a LWW merge policy

pub mod error;
pub mod manager;
pub mod store;
pub mod sync;

pub use error::{ClientError, Result};
pub use manager::{run_change_listener, ReconcileStats, StudyListManager, SyncState};
pub use store::{open_store, LocalStore, Record, StoreKind, LOCAL_USER};
pub use sync::{CloudSync, RemoteChange, SyncConfig, SyncOutcome};
