//! In-memory event bus implementation using tokio broadcast channels.
//!
//! This implementation is suitable for:
//! - Single server deployments
//! - Development and testing
//!
//! Events are only broadcast within a single process. If you have
//! multiple server replicas, they will NOT receive each other's events;
//! use a Redis or Postgres backed bus instead.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use felttrip_events::{
    ChannelEvent, EventBus, EventBusError, EventEnvelope, PresenceMember, Subscription,
    SubscriptionGuard,
};
use felttrip_storage::{ConnectionId, ItineraryId};

const CHANNEL_CAPACITY: usize = 100;

/// Per-itinerary channel: fan-out sender plus who is connected.
struct ChannelState {
    sender: broadcast::Sender<ChannelEvent>,
    members: Mutex<HashMap<ConnectionId, PresenceMember>>,
}

/// In-memory event bus with presence tracking.
pub struct MemoryEventBus {
    channels: Arc<DashMap<ItineraryId, Arc<ChannelState>>>,
}

impl MemoryEventBus {
    pub fn new() -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
        }
    }

    fn get_or_create_channel(&self, itinerary: &ItineraryId) -> Arc<ChannelState> {
        self.channels
            .entry(*itinerary)
            .or_insert_with(|| {
                Arc::new(ChannelState {
                    sender: broadcast::channel(CHANNEL_CAPACITY).0,
                    members: Mutex::new(HashMap::new()),
                })
            })
            .clone()
    }

    /// Current presence for a channel (test/diagnostic helper).
    pub fn members(&self, itinerary: &ItineraryId) -> Vec<PresenceMember> {
        match self.channels.get(itinerary) {
            Some(state) => state.members.lock().expect("poisoned").values().cloned().collect(),
            None => vec![],
        }
    }
}

impl Default for MemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Removes the member from presence when the subscription is dropped.
struct MemberGuard {
    state: Arc<ChannelState>,
    member: PresenceMember,
}

impl Drop for MemberGuard {
    fn drop(&mut self) {
        let removed = self
            .state
            .members
            .lock()
            .expect("poisoned")
            .remove(&self.member.connection_id);
        if removed.is_some() {
            // Ignore error if no receivers remain
            let _ = self
                .state
                .sender
                .send(ChannelEvent::MemberLeft(self.member.clone()));
        }
    }
}

#[async_trait]
impl EventBus for MemoryEventBus {
    async fn publish(
        &self,
        itinerary: &ItineraryId,
        envelope: EventEnvelope,
    ) -> Result<(), EventBusError> {
        let state = self.get_or_create_channel(itinerary);

        // Ignore error if no receivers (this is fine)
        let _ = state.sender.send(ChannelEvent::Domain(envelope));

        Ok(())
    }

    async fn join(
        &self,
        itinerary: &ItineraryId,
        member: PresenceMember,
    ) -> Result<Subscription, EventBusError> {
        let state = self.get_or_create_channel(itinerary);

        // Subscribe before announcing so the new member misses nothing
        // published after its own join.
        let rx = state.sender.subscribe();

        let snapshot = {
            let mut members = state.members.lock().expect("poisoned");
            members.insert(member.connection_id.clone(), member.clone());
            members.values().cloned().collect()
        };
        let _ = state.sender.send(ChannelEvent::MemberJoined(member.clone()));

        // Lagged receivers drop events; the client should do a full
        // resync when that happens.
        let stream = BroadcastStream::new(rx).filter_map(|result| result.ok());

        Ok(Subscription {
            snapshot,
            events: Box::pin(stream),
            guard: SubscriptionGuard::new(MemberGuard { state, member }),
        })
    }
}
