//! Error taxonomy for the collaboration core.

use felttrip_events::EventBusError;
use felttrip_storage::StoreError;
use thiserror::Error;

/// Failure modes surfaced by gated operations.
///
/// Access-control failures (`Unauthorized`, `Forbidden`) are always
/// surfaced verbatim, never silently downgraded. `Unavailable` only
/// ever concerns live propagation; the authoritative store is
/// unaffected when it occurs.
#[derive(Debug, Error)]
pub enum CollabError {
    /// No valid principal on the request.
    #[error("unauthorized")]
    Unauthorized,
    /// Valid principal, insufficient role. Carries a role-aware,
    /// user-visible message ("Only the owner can send invitations").
    #[error("{0}")]
    Forbidden(String),
    #[error("not found")]
    NotFound,
    /// Duplicate invitation or membership.
    #[error("{0}")]
    Conflict(String),
    /// One message regardless of whether expiry was detected lazily or
    /// previously recorded.
    #[error("this invitation has expired")]
    Expired,
    /// Malformed input.
    #[error("{0}")]
    Invalid(String),
    /// Realtime transport unreachable or misconfigured.
    #[error("real-time updates unavailable: {0}")]
    Unavailable(String),
    /// Time-windowed counter exceeded; nothing was mutated.
    #[error("rate limit exceeded, try again later")]
    RateLimited,
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for CollabError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => CollabError::NotFound,
            StoreError::AlreadyExists | StoreError::Conflict => {
                CollabError::Conflict("conflicting record already exists".to_string())
            }
            StoreError::Backend(msg) => CollabError::Internal(msg),
        }
    }
}

impl From<EventBusError> for CollabError {
    fn from(e: EventBusError) -> Self {
        CollabError::Unavailable(e.to_string())
    }
}
