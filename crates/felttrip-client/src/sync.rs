//! The realtime client synchronizer.
//!
//! Per-itinerary-view lifecycle: subscribe on mount, merge inbound
//! events into the local optimistic store, release the subscription on
//! unmount on every exit path (the guard drops with the synchronizer).

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::warn;

use felttrip_events::{
    channel_name, ChannelEvent, EventBusError, ItineraryEvent, PresenceMember, Subscription,
    SubscriptionGuard,
};
use felttrip_storage::{ConnectionId, ItineraryId, Principal};

use crate::store::LocalItineraryStore;

/// Outbound half of the channel contract: hands an event to the
/// gateway for origin-stamping and fan-out.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, channel: &str, event: ItineraryEvent) -> Result<(), EventBusError>;
}

/// Transient notice naming the acting principal, for the UI to flash.
#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    pub actor: String,
    pub message: String,
}

/// Applies inbound channel events to local view state and exposes
/// best-effort outbound broadcast.
pub struct Synchronizer {
    principal: Principal,
    itinerary: ItineraryId,
    publisher: Arc<dyn EventPublisher>,
    store: Arc<Mutex<LocalItineraryStore>>,
    peers: Arc<Mutex<HashMap<ConnectionId, PresenceMember>>>,
    notifications: Arc<Mutex<Vec<Notification>>>,
    task: JoinHandle<()>,
    _guard: SubscriptionGuard,
}

impl Synchronizer {
    /// Attach to an already-authorized subscription (see the gateway's
    /// `subscribe`). The presence snapshot seeds the peer list; the
    /// event stream is consumed on a background task until detach.
    pub fn attach(
        subscription: Subscription,
        publisher: Arc<dyn EventPublisher>,
        principal: Principal,
        itinerary: ItineraryId,
        store: Arc<Mutex<LocalItineraryStore>>,
    ) -> Self {
        let peers: Arc<Mutex<HashMap<ConnectionId, PresenceMember>>> = Arc::new(Mutex::new(
            subscription
                .snapshot
                .into_iter()
                .map(|m| (m.connection_id.clone(), m))
                .collect(),
        ));
        let notifications = Arc::new(Mutex::new(Vec::new()));

        let task = {
            let store = Arc::clone(&store);
            let peers = Arc::clone(&peers);
            let notifications = Arc::clone(&notifications);
            let self_id = principal.id;
            let mut events = subscription.events;
            tokio::spawn(async move {
                while let Some(event) = events.next().await {
                    match event {
                        ChannelEvent::MemberJoined(member) => {
                            peers
                                .lock()
                                .expect("poisoned")
                                .insert(member.connection_id.clone(), member);
                        }
                        ChannelEvent::MemberLeft(member) => {
                            peers.lock().expect("poisoned").remove(&member.connection_id);
                        }
                        ChannelEvent::Domain(envelope) => {
                            // Self-echo suppression: our own optimistic
                            // mutation already reflects this event.
                            if envelope.origin == self_id {
                                continue;
                            }
                            let changed =
                                store.lock().expect("poisoned").apply(&envelope.event);
                            if changed {
                                notifications.lock().expect("poisoned").push(Notification {
                                    actor: envelope.origin_name.clone(),
                                    message: describe(&envelope.event),
                                });
                            }
                        }
                    }
                }
            })
        };

        Self {
            principal,
            itinerary,
            publisher,
            store,
            peers,
            notifications,
            task,
            _guard: subscription.guard,
        }
    }

    /// Broadcast a local mutation that already succeeded against the
    /// authoritative store. Best-effort: failure is logged, not
    /// retried, and never rolls the mutation back.
    pub async fn broadcast(&self, event: ItineraryEvent) {
        let channel = channel_name(&self.itinerary);
        if let Err(e) = self.publisher.publish(&channel, event).await {
            warn!(channel, error = %e, "real-time updates unavailable");
        }
    }

    /// Who is currently connected to this itinerary's channel.
    pub fn peers(&self) -> Vec<PresenceMember> {
        self.peers.lock().expect("poisoned").values().cloned().collect()
    }

    /// Drain pending transient notifications.
    pub fn take_notifications(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.notifications.lock().expect("poisoned"))
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn store(&self) -> Arc<Mutex<LocalItineraryStore>> {
        Arc::clone(&self.store)
    }
}

impl Drop for Synchronizer {
    fn drop(&mut self) {
        // Stop applying events before the guard releases presence; a
        // late-arriving event must never touch a torn-down view.
        self.task.abort();
    }
}

fn describe(event: &ItineraryEvent) -> String {
    match event {
        ItineraryEvent::ItineraryUpdated { name, .. } => {
            format!("renamed the itinerary to \"{}\"", name)
        }
        ItineraryEvent::DestinationAdded { item } => format!("added destination {}", item.name),
        ItineraryEvent::DestinationRemoved { .. } => "removed a destination".to_string(),
        ItineraryEvent::TournamentAdded { item } => format!("added tournament {}", item.name),
        ItineraryEvent::TournamentRemoved { .. } => "removed a tournament".to_string(),
        ItineraryEvent::CollaboratorAdded { name, .. } => format!("added {} to the trip", name),
        ItineraryEvent::CollaboratorRemoved { .. } => "removed a collaborator".to_string(),
    }
}

/// Re-entrancy guard: at most one in-flight mutation per
/// (operation, target identity) pair.
#[derive(Default)]
pub struct PendingOps {
    inflight: Mutex<HashSet<(String, String)>>,
}

impl PendingOps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the (operation, target) slot; `None` means an identical
    /// mutation is still outstanding and this one must not dispatch.
    pub fn begin(&self, operation: &str, target: &str) -> Option<OpGuard<'_>> {
        let key = (operation.to_string(), target.to_string());
        let mut inflight = self.inflight.lock().expect("poisoned");
        if !inflight.insert(key.clone()) {
            return None;
        }
        Some(OpGuard { owner: self, key })
    }
}

/// Releases the claimed slot when the operation resolves, on every
/// exit path.
pub struct OpGuard<'a> {
    owner: &'a PendingOps,
    key: (String, String),
}

impl Drop for OpGuard<'_> {
    fn drop(&mut self) {
        self.owner
            .inflight
            .lock()
            .expect("poisoned")
            .remove(&self.key);
    }
}
