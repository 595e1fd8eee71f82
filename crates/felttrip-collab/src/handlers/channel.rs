//! Broadcast channel gateway: subscription authorization and publish.
//!
//! The gateway is an authorization boundary, not a legitimacy oracle:
//! viewer access suffices to publish because mutation events are only
//! meaningful once the underlying mutation already passed its own
//! editor/owner gate. What the gateway prevents is non-members
//! observing or polluting the channel.

use chrono::Utc;
use tracing::debug;

use felttrip_events::{
    channel_name, parse_channel_name, EventBus, EventEnvelope, ItineraryEvent, PresenceMember,
    Subscription,
};
use felttrip_storage::{ConnectionId, ItineraryId, Principal, Role};

use crate::server::CollabServer;
use crate::CollabError;

/// Signed authorization for one connection to join one channel.
#[derive(Clone, Debug)]
pub struct ChannelAuth {
    pub channel: String,
    /// Presence metadata announced to other subscribers.
    pub member: PresenceMember,
    /// Ed25519 signature (hex) over `channel:connection:principal`.
    pub signature: String,
}

/// The byte string a [`ChannelAuth`] signature covers.
pub fn auth_message(channel: &str, connection: &ConnectionId, member: &Principal) -> String {
    format!("{}:{}:{}", channel, connection.0, member.id)
}

fn channel_itinerary(channel: &str) -> Result<ItineraryId, CollabError> {
    parse_channel_name(channel)
        .ok_or_else(|| CollabError::Invalid(format!("malformed channel name: {}", channel)))
}

/// Gate a subscription request. On success the returned authorization
/// permits `connection_id` to join; on failure the subscription must
/// not be established.
pub async fn authorize_subscription(
    server: &CollabServer,
    principal: &Principal,
    channel: &str,
    connection_id: ConnectionId,
) -> Result<ChannelAuth, CollabError> {
    let itinerary_id = channel_itinerary(channel)?;
    server
        .require_access(
            &principal.id,
            &itinerary_id,
            Role::Viewer,
            "You do not have access to this itinerary's channel",
        )
        .await?;

    let signature = server.sign(&auth_message(channel, &connection_id, principal));
    debug!(channel, connection = %connection_id.0, principal = %principal.id, "subscription authorized");

    Ok(ChannelAuth {
        channel: channel.to_string(),
        member: PresenceMember {
            connection_id,
            principal_id: principal.id,
            name: principal.name.clone(),
        },
        signature,
    })
}

/// Authorize and establish a subscription in one step.
pub async fn subscribe(
    server: &CollabServer,
    principal: &Principal,
    itinerary_id: &ItineraryId,
    connection_id: ConnectionId,
) -> Result<(ChannelAuth, Subscription), CollabError> {
    let channel = channel_name(itinerary_id);
    let auth = authorize_subscription(server, principal, &channel, connection_id).await?;
    let subscription = server
        .events
        .join(itinerary_id, auth.member.clone())
        .await?;
    Ok((auth, subscription))
}

/// Publish a domain event onto an itinerary's channel.
///
/// Membership is re-checked on every publish; rate limiting is keyed
/// by the publishing principal. Transport failure surfaces as
/// `Unavailable` and leaves authoritative state untouched.
pub async fn publish(
    server: &CollabServer,
    principal: &Principal,
    channel: &str,
    event: ItineraryEvent,
) -> Result<(), CollabError> {
    let itinerary_id = channel_itinerary(channel)?;

    if !server.publish_limiter.check(&principal.id.to_string()) {
        return Err(CollabError::RateLimited);
    }

    server
        .require_access(
            &principal.id,
            &itinerary_id,
            Role::Viewer,
            "You do not have access to this itinerary's channel",
        )
        .await?;

    let envelope = EventEnvelope {
        origin: principal.id,
        origin_name: principal.name.clone(),
        event,
        sent_at: Utc::now().timestamp(),
    };
    server.events.publish(&itinerary_id, envelope).await?;
    debug!(channel, principal = %principal.id, "event published");
    Ok(())
}
