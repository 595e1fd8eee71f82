//! Invitation types.

use std::str::FromStr;

use chrono::{DateTime, Utc};

use super::{InvitationId, ItineraryId, PrincipalId, Role};

/// Invitation lifecycle state. Transitions are monotonic:
/// pending → accepted or pending → expired, never back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Expired,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Expired => "expired",
        }
    }
}

/// Error type for parsing InvitationStatus from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseInvitationStatusError(pub String);

impl std::fmt::Display for ParseInvitationStatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid invitation status: {}", self.0)
    }
}

impl std::error::Error for ParseInvitationStatusError {}

impl FromStr for InvitationStatus {
    type Err = ParseInvitationStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InvitationStatus::Pending),
            "accepted" => Ok(InvitationStatus::Accepted),
            "expired" => Ok(InvitationStatus::Expired),
            _ => Err(ParseInvitationStatusError(s.to_string())),
        }
    }
}

/// Invitation record
#[derive(Clone, Debug)]
pub struct Invitation {
    pub id: InvitationId,
    pub itinerary_id: ItineraryId,
    /// Invitee address, stored lowercased.
    pub email: String,
    pub role: Role,
    /// Single-use opaque token, hex-encoded 32 random bytes.
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: InvitationStatus,
    pub invited_by: PrincipalId,
}

impl Invitation {
    /// An invitation past its expiry time counts as expired even if
    /// no process has updated the stored status yet.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == InvitationStatus::Expired || now >= self.expires_at
    }
}

/// Parameters for creating an invitation
#[derive(Clone, Debug)]
pub struct CreateInvitationParams {
    pub itinerary_id: ItineraryId,
    pub email: String,
    pub role: Role,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub invited_by: PrincipalId,
}
