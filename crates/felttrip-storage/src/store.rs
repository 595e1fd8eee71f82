//! The Store trait that backends implement.

use chrono::{DateTime, Utc};

use crate::types::*;
use crate::StoreError;

/// The storage trait the collaboration core depends on.
///
/// All reads give at least read-your-writes consistency for the
/// principal that just wrote. Item add/remove are idempotent at the
/// identity level so replayed broadcast events cause no duplication.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // ──────────────────────────────── Principals ────────────────────────────────

    /// Mirror an authenticated principal into the directory (insert or
    /// refresh name/email).
    async fn upsert_principal(&self, principal: &Principal) -> Result<(), StoreError>;

    /// Get principal by ID.
    async fn get_principal(&self, id: &PrincipalId) -> Result<Principal, StoreError>;

    // ──────────────────────────────── Itineraries ───────────────────────────────

    /// Create a new itinerary; the creator becomes its owner.
    async fn create_itinerary(
        &self,
        params: &CreateItineraryParams,
    ) -> Result<Itinerary, StoreError>;

    /// Get the full aggregate (collaborators + items) by ID.
    async fn get_itinerary(&self, id: &ItineraryId) -> Result<Itinerary, StoreError>;

    /// All itineraries where `principal` is owner or collaborator.
    async fn list_itineraries_for(
        &self,
        principal: &PrincipalId,
    ) -> Result<Vec<Itinerary>, StoreError>;

    /// Apply a partial update (rename and/or whole item-list replacement).
    async fn update_itinerary(
        &self,
        id: &ItineraryId,
        patch: &ItineraryPatch,
    ) -> Result<Itinerary, StoreError>;

    /// Delete the itinerary and everything hanging off it.
    async fn delete_itinerary(&self, id: &ItineraryId) -> Result<(), StoreError>;

    // ──────────────────────────────── Items ─────────────────────────────────────

    /// Add an item; a no-op if the identity is already present.
    async fn add_item(&self, id: &ItineraryId, item: &Item) -> Result<Itinerary, StoreError>;

    /// Remove an item by identity; a no-op if absent.
    async fn remove_item(&self, id: &ItineraryId, item_id: &str) -> Result<Itinerary, StoreError>;

    // ──────────────────────────────── Collaborators ─────────────────────────────

    /// Add a collaborator at `role`. Fails with `Conflict` if the
    /// principal is already listed or is the owner.
    async fn add_collaborator(
        &self,
        id: &ItineraryId,
        principal: &PrincipalId,
        role: Role,
    ) -> Result<(), StoreError>;

    /// Remove a collaborator; a no-op if not listed.
    async fn remove_collaborator(
        &self,
        id: &ItineraryId,
        principal: &PrincipalId,
    ) -> Result<(), StoreError>;

    // ──────────────────────────────── Invitations ───────────────────────────────

    /// Create an invitation record (status starts pending).
    async fn create_invitation(
        &self,
        params: &CreateInvitationParams,
    ) -> Result<Invitation, StoreError>;

    /// Look up an invitation by its opaque token.
    async fn get_invitation_by_token(&self, token: &str) -> Result<Invitation, StoreError>;

    /// Pending invitation for (itinerary, email), if one exists.
    async fn find_pending_invitation(
        &self,
        id: &ItineraryId,
        email: &str,
    ) -> Result<Option<Invitation>, StoreError>;

    /// All invitations for an itinerary, newest first.
    async fn list_invitations(&self, id: &ItineraryId) -> Result<Vec<Invitation>, StoreError>;

    /// Record lazily-detected expiry (pending → expired).
    async fn mark_invitation_expired(&self, id: &InvitationId) -> Result<(), StoreError>;

    /// Mark accepted without membership change (redeemer was already a
    /// member).
    async fn mark_invitation_accepted(&self, id: &InvitationId) -> Result<(), StoreError>;

    /// Atomically add `(principal, role)` to the itinerary's
    /// collaborators and mark the invitation accepted. Both happen or
    /// neither does.
    async fn accept_invitation(
        &self,
        id: &InvitationId,
        principal: &PrincipalId,
        role: Role,
    ) -> Result<(), StoreError>;

    /// Hard-delete an invitation. Only used to roll back creation when
    /// the notification email could not be sent.
    async fn delete_invitation(&self, id: &InvitationId) -> Result<(), StoreError>;

    /// Mark every overdue pending invitation expired; returns how many
    /// were swept.
    async fn sweep_expired_invitations(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}
