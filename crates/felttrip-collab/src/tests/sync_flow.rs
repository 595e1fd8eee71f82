//! End-to-end flows across the server core and the client pieces:
//! invitation round trips and realtime propagation into the local
//! optimistic store.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use felttrip_client::{EventPublisher, LocalItineraryStore, Synchronizer};
use felttrip_events::{EventBusError, ItineraryEvent};
use felttrip_storage::{ConnectionId, Item, ItemKind, ItineraryId, Principal, Role, Store};

use crate::handlers::channel;
use crate::handlers::invites::{accept_invitation, create_invitation, validate_invitation};
use crate::handlers::itineraries::{add_item, create_itinerary, get_itinerary};
use crate::server::CollabServer;
use crate::tests::common::*;

/// Client-side publisher backed by the gateway's publish handler.
struct GatewayPublisher {
    server: Arc<CollabServer>,
    principal: Principal,
}

#[async_trait]
impl EventPublisher for GatewayPublisher {
    async fn publish(&self, channel: &str, event: ItineraryEvent) -> Result<(), EventBusError> {
        channel::publish(&self.server, &self.principal, channel, event)
            .await
            .map_err(|e| EventBusError::Unavailable(e.to_string()))
    }
}

async fn attach_client(server: &Arc<CollabServer>, who: &Principal, itinerary: ItineraryId) -> Synchronizer {
    let (_, subscription) = channel::subscribe(
        server,
        who,
        &itinerary,
        ConnectionId(Uuid::new_v4().to_string()),
    )
    .await
    .unwrap();
    Synchronizer::attach(
        subscription,
        Arc::new(GatewayPublisher {
            server: Arc::clone(server),
            principal: who.clone(),
        }),
        who.clone(),
        itinerary,
        Arc::new(Mutex::new(LocalItineraryStore::new())),
    )
}

/// Pull the token out of the plain-text invitation body.
fn token_from_email(text: &str) -> String {
    let marker = "/invite?token=";
    let start = text.find(marker).expect("no accept link in email") + marker.len();
    text[start..]
        .chars()
        .take_while(|c| c.is_ascii_hexdigit())
        .collect()
}

#[tokio::test]
async fn invitation_round_trip_from_email_to_membership() {
    let mailer = Arc::new(RecordingMailer::default());
    let server = create_test_server_with(email_test_config(), Some(mailer.clone())).await;
    let alice = test_principal("Alice");
    let carol = test_principal("Carol");

    let itinerary = create_itinerary(&server, &alice, "Vegas Trip".to_string(), vec![])
        .await
        .unwrap();
    create_invitation(&server, &alice, &itinerary.id, &carol.email, Role::Editor)
        .await
        .unwrap();

    // Carol only has what the email gave her.
    let token = {
        let sent = mailer.sent.lock().unwrap();
        token_from_email(&sent[0].text)
    };

    let summary = validate_invitation(&server, &token).await.unwrap();
    assert_eq!(summary.itinerary_name, "Vegas Trip");
    assert_eq!(summary.role, Role::Editor);
    assert_eq!(summary.invited_by_name, "Alice");

    let joined = accept_invitation(&server, &token, &carol).await.unwrap();
    assert_eq!(joined.role_of(&carol.id), Some(Role::Editor));

    // Membership is effective immediately.
    assert!(get_itinerary(&server, &carol.id, &itinerary.id).await.is_ok());
}

#[tokio::test]
async fn editor_mutations_reach_viewer_stores_but_not_their_own() {
    let server = Arc::new(create_test_server().await);
    let alice = test_principal("Alice");
    let editor = test_principal("Ed");
    let viewer = test_principal("Vera");

    let itinerary = create_itinerary(&server, &alice, "Vegas Trip".to_string(), vec![])
        .await
        .unwrap();
    for (who, role) in [(&editor, Role::Editor), (&viewer, Role::Viewer)] {
        server.store.upsert_principal(who).await.unwrap();
        server
            .store
            .add_collaborator(&itinerary.id, &who.id, role)
            .await
            .unwrap();
    }

    let viewer_sync = attach_client(&server, &viewer, itinerary.id).await;
    let editor_sync = attach_client(&server, &editor, itinerary.id).await;

    // The editor commits against the authoritative store, applies the
    // mutation locally, then broadcasts.
    let item = Item::new("t1", "Main Event", ItemKind::Tournament);
    add_item(&server, &editor.id, &itinerary.id, item.clone())
        .await
        .unwrap();
    editor_sync
        .store()
        .lock()
        .unwrap()
        .add_tournament(item.clone());
    editor_sync
        .broadcast(ItineraryEvent::TournamentAdded { item })
        .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The viewer's store converges and names the actor.
    let viewer_store = viewer_sync.store();
    assert!(viewer_store.lock().unwrap().contains("t1"));
    assert_eq!(viewer_store.lock().unwrap().tournaments().len(), 1);
    let notes = viewer_sync.take_notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].actor, "Ed");

    // The editor's own echo was suppressed: exactly one copy locally.
    assert_eq!(editor_sync.store().lock().unwrap().len(), 1);
    assert!(editor_sync.take_notifications().is_empty());

    // Both clients see each other in presence.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(viewer_sync.peers().len(), 2);
}

#[tokio::test]
async fn viewer_broadcast_attempts_do_not_poison_state() {
    let server = Arc::new(create_test_server().await);
    let alice = test_principal("Alice");
    let viewer = test_principal("Vera");

    let itinerary = create_itinerary(&server, &alice, "Vegas Trip".to_string(), vec![])
        .await
        .unwrap();
    server.store.upsert_principal(&viewer).await.unwrap();
    server
        .store
        .add_collaborator(&itinerary.id, &viewer.id, Role::Viewer)
        .await
        .unwrap();

    let alice_sync = attach_client(&server, &alice, itinerary.id).await;
    let viewer_sync = attach_client(&server, &viewer, itinerary.id).await;

    // A viewer's broadcast is accepted by the gateway (membership is
    // the gate, the mutation itself was gated elsewhere); but the
    // authoritative store only changes through the handlers.
    viewer_sync
        .broadcast(ItineraryEvent::TournamentAdded {
            item: Item::new("t1", "Main Event", ItemKind::Tournament),
        })
        .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(alice_sync.store().lock().unwrap().contains("t1"));
    let authoritative = get_itinerary(&server, &alice.id, &itinerary.id).await.unwrap();
    assert!(authoritative.items.is_empty());
}
