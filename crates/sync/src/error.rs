//! Error taxonomy for the sync core (spec §7).
//!
//! `SessionExpired` and `NoCandidates` are deliberately *not* surfaced as
//! `Err` from the public protocol orchestrator methods — per spec they're
//! no-ops that return `None`. They remain part of the enum because the
//! session manager raises them internally and several unit tests assert on
//! them directly.

use thiserror::Error;

use crate::ids::SpaceId;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    /// The underlying storage call rejected. Fatal for the current
    /// operation; the session is left untouched.
    #[error("storage operation failed: {0}")]
    StorageFailure(#[source] eyre::Error),

    /// `contentHash` was asked to hash an unknown content variant.
    #[error("unsupported message content variant: {0}")]
    UnsupportedContent(String),

    /// An internal precondition failed — a programming error, not a
    /// recoverable condition.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Requested an operation against a session that doesn't exist or has
    /// expired.
    #[error("no active sync session for space {0}")]
    SessionExpired(SpaceId),

    /// `buildSyncInitiate` was called with zero candidates.
    #[error("no sync candidates available for space {0}")]
    NoCandidates(SpaceId),
}

pub type Result<T> = std::result::Result<T, SyncError>;
