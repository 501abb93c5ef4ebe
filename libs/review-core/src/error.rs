//! Error types for review-core.

use thiserror::Error;

use crate::types::{ContentType, ListKind};

/// Result type alias using CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by core domain rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("{content_type:?} content is not allowed in a {list_kind:?} list")]
    IncompatibleContent {
        list_kind: ListKind,
        content_type: ContentType,
    },

    #[error("session is already completed")]
    SessionCompleted,

    #[error("session is already paused")]
    SessionAlreadyPaused,

    #[error("session is not paused")]
    SessionNotPaused,
}
