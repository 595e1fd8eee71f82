//! Invitation handlers: create, validate, accept, list, sweep.
//!
//! State machine per invitation: pending → accepted on redemption by
//! the matching, non-expired invitee; pending → expired once the clock
//! passes expiry. Both transitions are terminal, and expiry is checked
//! lazily on every read so a stale stored status never resurrects a
//! dead token.

use chrono::{Duration, Utc};
use rand_core::{OsRng, RngCore};
use tracing::{info, warn};

use felttrip_storage::{
    CreateInvitationParams, Invitation, InvitationStatus, Itinerary, ItineraryId, Principal,
    Role, Store,
};

use crate::email::{EmailProvider, InvitationEmailContent};
use crate::server::CollabServer;
use crate::CollabError;

/// Fixed invitation lifetime.
pub const INVITATION_LIFETIME_HOURS: i64 = 24;

/// What a token holder learns before deciding to accept.
#[derive(Clone, Debug)]
pub struct InvitationSummary {
    pub itinerary_id: ItineraryId,
    pub itinerary_name: String,
    pub role: Role,
    pub invited_by_name: String,
}

/// 32 random bytes, hex-encoded: the single-use opaque token.
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub async fn create_invitation(
    server: &CollabServer,
    inviter: &Principal,
    itinerary_id: &ItineraryId,
    invitee_email: &str,
    role: Role,
) -> Result<Invitation, CollabError> {
    if role == Role::Owner {
        return Err(CollabError::Invalid(
            "invitations can only grant the editor or viewer role".to_string(),
        ));
    }
    let email = invitee_email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(CollabError::Invalid(format!("invalid email address: {}", invitee_email)));
    }

    if !server.invite_limiter.check(&inviter.id.to_string()) {
        return Err(CollabError::RateLimited);
    }

    server.store.upsert_principal(inviter).await?;
    let itinerary = server
        .require_access(
            &inviter.id,
            itinerary_id,
            Role::Owner,
            "Only the owner can send invitations",
        )
        .await?;

    if resolves_to_member(server, &itinerary, &email).await? {
        return Err(CollabError::Conflict(
            "This address already belongs to a member of the itinerary".to_string(),
        ));
    }

    let now = Utc::now();
    if let Some(pending) = server
        .store
        .find_pending_invitation(itinerary_id, &email)
        .await?
    {
        if !pending.is_expired(now) {
            return Err(CollabError::Conflict(
                "An invitation for this address is already pending".to_string(),
            ));
        }
        // Stored status lagged behind the clock; record it and move on.
        server.store.mark_invitation_expired(&pending.id).await?;
    }

    let invitation = server
        .store
        .create_invitation(&CreateInvitationParams {
            itinerary_id: *itinerary_id,
            email: email.clone(),
            role,
            token: generate_token(),
            expires_at: now + Duration::hours(INVITATION_LIFETIME_HOURS),
            invited_by: inviter.id,
        })
        .await?;

    // Notification is part of the operation: an invitation nobody can
    // ever receive must not linger, so a failed send rolls it back.
    if let Some(mailer) = server.mailer() {
        let content = InvitationEmailContent::new(
            &itinerary.name,
            &inviter.name,
            role,
            &server.config.accept_url(&invitation.token),
        );
        let (from_address, from_name) = match &server.config.email {
            Some(email_config) => (
                email_config.from_address.clone(),
                email_config.from_name.clone(),
            ),
            None => ("noreply@felttrip.localhost".to_string(), None),
        };
        if let Err(e) = mailer
            .send_invitation(&email, &content, &from_address, from_name.as_deref())
            .await
        {
            warn!(invitation = ?invitation.id, error = %e, "invitation email failed, rolling back");
            server.store.delete_invitation(&invitation.id).await?;
            return Err(CollabError::Internal(format!(
                "could not deliver the invitation email: {}",
                e
            )));
        }
    }

    info!(itinerary = %itinerary_id, invitee = %email, role = %role.as_str(), "invitation created");
    Ok(invitation)
}

/// Shared validate semantics: resolve the token and normalize state.
async fn validated_invitation(
    server: &CollabServer,
    token: &str,
) -> Result<Invitation, CollabError> {
    let invitation = server.store.get_invitation_by_token(token).await?;

    match invitation.status {
        InvitationStatus::Expired => return Err(CollabError::Expired),
        InvitationStatus::Accepted => {
            return Err(CollabError::Invalid(
                "this invitation has already been used".to_string(),
            ))
        }
        InvitationStatus::Pending => {}
    }
    if Utc::now() >= invitation.expires_at {
        // Lazy expiry: record it as a side effect of validation.
        server.store.mark_invitation_expired(&invitation.id).await?;
        return Err(CollabError::Expired);
    }
    Ok(invitation)
}

/// Look up an invitation by token. Possession of the token is the only
/// credential required.
pub async fn validate_invitation(
    server: &CollabServer,
    token: &str,
) -> Result<InvitationSummary, CollabError> {
    let invitation = validated_invitation(server, token).await?;
    let itinerary = server.store.get_itinerary(&invitation.itinerary_id).await?;
    let invited_by_name = match server.store.get_principal(&invitation.invited_by).await {
        Ok(p) => p.name,
        Err(_) => "A member".to_string(),
    };

    Ok(InvitationSummary {
        itinerary_id: itinerary.id,
        itinerary_name: itinerary.name,
        role: invitation.role,
        invited_by_name,
    })
}

pub async fn accept_invitation(
    server: &CollabServer,
    token: &str,
    redeemer: &Principal,
) -> Result<Itinerary, CollabError> {
    let invitation = server.store.get_invitation_by_token(token).await?;
    let email_matches = invitation.email.eq_ignore_ascii_case(redeemer.email.trim());

    // A consumed token stays consumed, but the original redeemer asking
    // again is answered idempotently rather than with an error.
    if invitation.status == InvitationStatus::Accepted {
        let itinerary = server.store.get_itinerary(&invitation.itinerary_id).await?;
        if email_matches && itinerary.is_member(&redeemer.id) {
            return Ok(itinerary);
        }
        return Err(CollabError::Invalid(
            "this invitation has already been used".to_string(),
        ));
    }

    let invitation = validated_invitation(server, token).await?;
    if !email_matches {
        return Err(CollabError::Forbidden(
            "This invitation is for a different address".to_string(),
        ));
    }

    server.store.upsert_principal(redeemer).await?;
    let itinerary = server.store.get_itinerary(&invitation.itinerary_id).await?;

    if itinerary.is_member(&redeemer.id) {
        // Already in: consume the token, grant nothing twice.
        server.store.mark_invitation_accepted(&invitation.id).await?;
        return Ok(itinerary);
    }

    // Membership grant and token consumption happen atomically.
    server
        .store
        .accept_invitation(&invitation.id, &redeemer.id, invitation.role)
        .await?;
    info!(itinerary = %invitation.itinerary_id, principal = %redeemer.id, role = %invitation.role.as_str(), "invitation accepted");

    Ok(server.store.get_itinerary(&invitation.itinerary_id).await?)
}

/// All invitations for an itinerary; owner only.
pub async fn list_invitations(
    server: &CollabServer,
    principal: &Principal,
    itinerary_id: &ItineraryId,
) -> Result<Vec<Invitation>, CollabError> {
    server
        .require_access(
            &principal.id,
            itinerary_id,
            Role::Owner,
            "Only the owner can list invitations",
        )
        .await?;
    Ok(server.store.list_invitations(itinerary_id).await?)
}

/// Mark every overdue pending invitation expired. Run periodically (or
/// from the admin CLI); lazy validation makes this a tidiness measure,
/// not a correctness requirement.
pub async fn sweep_expired_invitations(server: &CollabServer) -> Result<u64, CollabError> {
    let swept = server.store.sweep_expired_invitations(Utc::now()).await?;
    if swept > 0 {
        info!(swept, "expired invitations swept");
    }
    Ok(swept)
}

/// Does `email` already belong to the owner or a collaborator?
async fn resolves_to_member(
    server: &CollabServer,
    itinerary: &Itinerary,
    email: &str,
) -> Result<bool, CollabError> {
    let mut member_ids = vec![itinerary.owner];
    member_ids.extend(itinerary.collaborators.iter().map(|c| c.principal_id));

    for id in member_ids {
        match server.store.get_principal(&id).await {
            Ok(principal) => {
                if principal.email.eq_ignore_ascii_case(email) {
                    return Ok(true);
                }
            }
            // A member we have no directory entry for can't be matched
            // by email; skip rather than fail the invitation.
            Err(felttrip_storage::StoreError::NotFound) => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(false)
}
