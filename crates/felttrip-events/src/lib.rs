//! Event bus abstraction for itinerary change notifications.
//!
//! This crate defines the EventBus trait that allows different
//! implementations for event broadcasting across server replicas:
//! - Memory (single server, tokio broadcast channels)
//! - Redis / Postgres pub-sub for multi-server deployments
//!
//! One logical channel exists per itinerary, named `itinerary-{id}`.
//! That string format is a contract shared between the gateway and the
//! client synchronizer and must not change on one side only.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use thiserror::Error;
use uuid::Uuid;

use felttrip_storage::{ConnectionId, Item, ItineraryId, PrincipalId, Role};

/// Channel name prefix, per the gateway/synchronizer contract.
pub const CHANNEL_PREFIX: &str = "itinerary-";

/// Deterministic channel name for an itinerary.
pub fn channel_name(id: &ItineraryId) -> String {
    format!("{}{}", CHANNEL_PREFIX, id.0)
}

/// Derive the itinerary id back out of a channel name.
pub fn parse_channel_name(name: &str) -> Option<ItineraryId> {
    let raw = name.strip_prefix(CHANNEL_PREFIX)?;
    Uuid::try_parse(raw).ok().map(ItineraryId)
}

/// A domain event on one itinerary, discriminated by an explicit tag.
///
/// Each variant carries only the fields relevant to it; the client
/// synchronizer switches on the tag to merge into local state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ItineraryEvent {
    ItineraryUpdated {
        itinerary_id: ItineraryId,
        name: String,
    },
    DestinationAdded {
        item: Item,
    },
    DestinationRemoved {
        item_id: String,
    },
    TournamentAdded {
        item: Item,
    },
    TournamentRemoved {
        item_id: String,
    },
    CollaboratorAdded {
        principal_id: PrincipalId,
        name: String,
        role: Role,
    },
    CollaboratorRemoved {
        principal_id: PrincipalId,
    },
}

/// A domain event stamped with its origin, so receivers can suppress
/// their own echo.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub origin: PrincipalId,
    pub origin_name: String,
    pub event: ItineraryEvent,
    pub sent_at: i64,
}

/// One connected member of a channel, as reported to other subscribers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PresenceMember {
    pub connection_id: ConnectionId,
    pub principal_id: PrincipalId,
    pub name: String,
}

/// Everything a subscriber can receive on a channel.
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelEvent {
    MemberJoined(PresenceMember),
    MemberLeft(PresenceMember),
    Domain(EventEnvelope),
}

/// Error type for event bus operations
#[derive(Debug, Error)]
pub enum EventBusError {
    /// Transport unreachable or misconfigured; live propagation is
    /// lost but authoritative state is unaffected.
    #[error("realtime unavailable: {0}")]
    Unavailable(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Stream of channel events
pub type EventStream = Pin<Box<dyn Stream<Item = ChannelEvent> + Send>>;

/// An active presence-enabled subscription.
///
/// Dropping the guard synchronously releases the subscription: the
/// member leaves presence and no further events are delivered.
pub struct Subscription {
    /// Members connected at the moment of joining (including self).
    pub snapshot: Vec<PresenceMember>,
    pub events: EventStream,
    pub guard: SubscriptionGuard,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("snapshot", &self.snapshot)
            .finish_non_exhaustive()
    }
}

/// Opaque handle tying a subscription to its transport; releases on drop.
pub struct SubscriptionGuard(Box<dyn std::any::Any + Send>);

impl SubscriptionGuard {
    pub fn new(inner: impl std::any::Any + Send) -> Self {
        Self(Box::new(inner))
    }
}

/// Event bus trait for publishing and subscribing to itinerary channels.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish an origin-stamped event to all current subscribers of
    /// the itinerary's channel. Delivery is at-least-once; order is
    /// only guaranteed per publisher.
    async fn publish(
        &self,
        itinerary: &ItineraryId,
        envelope: EventEnvelope,
    ) -> Result<(), EventBusError>;

    /// Join the itinerary's channel as `member`.
    ///
    /// Returns the current presence snapshot plus a stream of
    /// subsequent events; other subscribers see a `MemberJoined`.
    async fn join(
        &self,
        itinerary: &ItineraryId,
        member: PresenceMember,
    ) -> Result<Subscription, EventBusError>;
}
