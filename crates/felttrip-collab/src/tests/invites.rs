//! Tests for the invitation lifecycle: creation gating, token
//! validation, single-use acceptance, expiry, and delivery rollback.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use felttrip_storage::{CreateInvitationParams, InvitationStatus, Role, Store};

use crate::config::{RateLimitConfig, ServerConfig};
use crate::handlers::invites::*;
use crate::handlers::itineraries::create_itinerary;
use crate::tests::common::*;
use crate::CollabError;

#[tokio::test]
async fn only_the_owner_sends_invitations() {
    let server = create_test_server().await;
    let alice = test_principal("Alice");
    let editor = test_principal("Ed");

    let itinerary = create_itinerary(&server, &alice, "Vegas Trip".to_string(), vec![])
        .await
        .unwrap();
    server.store.upsert_principal(&editor).await.unwrap();
    server
        .store
        .add_collaborator(&itinerary.id, &editor.id, Role::Editor)
        .await
        .unwrap();

    let err = create_invitation(&server, &editor, &itinerary.id, "carol@example.com", Role::Viewer)
        .await
        .unwrap_err();
    assert!(matches!(err, CollabError::Forbidden(msg) if msg.contains("owner")));
}

#[tokio::test]
async fn invitations_never_grant_ownership() {
    let server = create_test_server().await;
    let alice = test_principal("Alice");
    let itinerary = create_itinerary(&server, &alice, "Vegas Trip".to_string(), vec![])
        .await
        .unwrap();

    let err = create_invitation(&server, &alice, &itinerary.id, "carol@example.com", Role::Owner)
        .await
        .unwrap_err();
    assert!(matches!(err, CollabError::Invalid(_)));
}

#[tokio::test]
async fn invalid_addresses_are_rejected() {
    let server = create_test_server().await;
    let alice = test_principal("Alice");
    let itinerary = create_itinerary(&server, &alice, "Vegas Trip".to_string(), vec![])
        .await
        .unwrap();

    let err = create_invitation(&server, &alice, &itinerary.id, "not-an-address", Role::Viewer)
        .await
        .unwrap_err();
    assert!(matches!(err, CollabError::Invalid(_)));
}

#[tokio::test]
async fn duplicate_pending_invitations_conflict() {
    let server = create_test_server().await;
    let alice = test_principal("Alice");
    let itinerary = create_itinerary(&server, &alice, "Vegas Trip".to_string(), vec![])
        .await
        .unwrap();

    create_invitation(&server, &alice, &itinerary.id, "carol@example.com", Role::Viewer)
        .await
        .unwrap();
    // Same address, different casing: still the same invitee.
    let err = create_invitation(&server, &alice, &itinerary.id, "Carol@Example.com", Role::Editor)
        .await
        .unwrap_err();
    assert!(matches!(err, CollabError::Conflict(msg) if msg.contains("pending")));
}

#[tokio::test]
async fn inviting_an_existing_member_conflicts() {
    let server = create_test_server().await;
    let alice = test_principal("Alice");
    let editor = test_principal("Ed");

    let itinerary = create_itinerary(&server, &alice, "Vegas Trip".to_string(), vec![])
        .await
        .unwrap();
    server.store.upsert_principal(&editor).await.unwrap();
    server
        .store
        .add_collaborator(&itinerary.id, &editor.id, Role::Editor)
        .await
        .unwrap();

    let err = create_invitation(&server, &alice, &itinerary.id, &editor.email, Role::Viewer)
        .await
        .unwrap_err();
    assert!(matches!(err, CollabError::Conflict(msg) if msg.contains("member")));

    // The owner's own address conflicts too.
    let err = create_invitation(&server, &alice, &itinerary.id, &alice.email, Role::Viewer)
        .await
        .unwrap_err();
    assert!(matches!(err, CollabError::Conflict(_)));
}

#[tokio::test]
async fn tokens_are_long_and_unique() {
    let server = create_test_server().await;
    let alice = test_principal("Alice");
    let itinerary = create_itinerary(&server, &alice, "Vegas Trip".to_string(), vec![])
        .await
        .unwrap();

    let a = create_invitation(&server, &alice, &itinerary.id, "carol@example.com", Role::Viewer)
        .await
        .unwrap();
    let b = create_invitation(&server, &alice, &itinerary.id, "dave@example.com", Role::Viewer)
        .await
        .unwrap();

    // 32 random bytes, hex encoded.
    assert_eq!(a.token.len(), 64);
    assert_ne!(a.token, b.token);
    assert!((a.expires_at - a.created_at) >= Duration::hours(INVITATION_LIFETIME_HOURS - 1));
}

#[tokio::test]
async fn validation_exposes_summary_without_identity() {
    let server = create_test_server().await;
    let alice = test_principal("Alice");
    let itinerary = create_itinerary(&server, &alice, "Vegas Trip".to_string(), vec![])
        .await
        .unwrap();

    let invitation =
        create_invitation(&server, &alice, &itinerary.id, "carol@example.com", Role::Editor)
            .await
            .unwrap();

    // Possession of the token is the only credential.
    let summary = validate_invitation(&server, &invitation.token).await.unwrap();
    assert_eq!(summary.itinerary_id, itinerary.id);
    assert_eq!(summary.itinerary_name, "Vegas Trip");
    assert_eq!(summary.role, Role::Editor);
    assert_eq!(summary.invited_by_name, "Alice");

    let err = validate_invitation(&server, "no-such-token").await.unwrap_err();
    assert!(matches!(err, CollabError::NotFound));
}

#[tokio::test]
async fn acceptance_grants_the_invited_role_once() {
    let server = create_test_server().await;
    let alice = test_principal("Alice");
    let carol = test_principal("Carol");
    let itinerary = create_itinerary(&server, &alice, "Vegas Trip".to_string(), vec![])
        .await
        .unwrap();

    let invitation =
        create_invitation(&server, &alice, &itinerary.id, &carol.email, Role::Editor)
            .await
            .unwrap();

    let joined = accept_invitation(&server, &invitation.token, &carol)
        .await
        .unwrap();
    assert_eq!(joined.role_of(&carol.id), Some(Role::Editor));

    let stored = server
        .store
        .get_invitation_by_token(&invitation.token)
        .await
        .unwrap();
    assert_eq!(stored.status, InvitationStatus::Accepted);

    // A consumed token no longer validates.
    let err = validate_invitation(&server, &invitation.token).await.unwrap_err();
    assert!(matches!(err, CollabError::Invalid(_)));
}

#[tokio::test]
async fn repeat_acceptance_by_the_redeemer_is_idempotent() {
    let server = create_test_server().await;
    let alice = test_principal("Alice");
    let carol = test_principal("Carol");
    let itinerary = create_itinerary(&server, &alice, "Vegas Trip".to_string(), vec![])
        .await
        .unwrap();

    let invitation =
        create_invitation(&server, &alice, &itinerary.id, &carol.email, Role::Viewer)
            .await
            .unwrap();

    accept_invitation(&server, &invitation.token, &carol)
        .await
        .unwrap();
    let again = accept_invitation(&server, &invitation.token, &carol)
        .await
        .unwrap();
    assert_eq!(again.role_of(&carol.id), Some(Role::Viewer));
    assert_eq!(again.collaborators.len(), 1);
}

#[tokio::test]
async fn a_consumed_token_rejects_other_principals() {
    let server = create_test_server().await;
    let alice = test_principal("Alice");
    let carol = test_principal("Carol");
    let mallory = test_principal("Mallory");
    let itinerary = create_itinerary(&server, &alice, "Vegas Trip".to_string(), vec![])
        .await
        .unwrap();

    let invitation =
        create_invitation(&server, &alice, &itinerary.id, &carol.email, Role::Viewer)
            .await
            .unwrap();
    accept_invitation(&server, &invitation.token, &carol)
        .await
        .unwrap();

    let err = accept_invitation(&server, &invitation.token, &mallory)
        .await
        .unwrap_err();
    assert!(matches!(err, CollabError::Invalid(_)));
}

#[tokio::test]
async fn acceptance_requires_the_invited_address() {
    let server = create_test_server().await;
    let alice = test_principal("Alice");
    let mallory = test_principal("Mallory");
    let itinerary = create_itinerary(&server, &alice, "Vegas Trip".to_string(), vec![])
        .await
        .unwrap();

    let invitation =
        create_invitation(&server, &alice, &itinerary.id, "carol@example.com", Role::Viewer)
            .await
            .unwrap();

    let err = accept_invitation(&server, &invitation.token, &mallory)
        .await
        .unwrap_err();
    assert!(matches!(err, CollabError::Forbidden(msg) if msg.contains("different address")));

    // The failed attempt must not consume the token.
    assert!(validate_invitation(&server, &invitation.token).await.is_ok());
}

#[tokio::test]
async fn overdue_invitations_expire_on_validation() {
    let server = create_test_server().await;
    let alice = test_principal("Alice");
    let carol = test_principal("Carol");
    let itinerary = create_itinerary(&server, &alice, "Vegas Trip".to_string(), vec![])
        .await
        .unwrap();

    // Stored directly with a past deadline and a stale pending status.
    let invitation = server
        .store
        .create_invitation(&CreateInvitationParams {
            itinerary_id: itinerary.id,
            email: carol.email.clone(),
            role: Role::Viewer,
            token: format!("{:0>64}", Uuid::new_v4().simple()),
            expires_at: Utc::now() - Duration::minutes(1),
            invited_by: alice.id,
        })
        .await
        .unwrap();

    let err = validate_invitation(&server, &invitation.token).await.unwrap_err();
    assert!(matches!(err, CollabError::Expired));

    // Expiry was recorded, not just reported.
    let stored = server
        .store
        .get_invitation_by_token(&invitation.token)
        .await
        .unwrap();
    assert_eq!(stored.status, InvitationStatus::Expired);

    let err = accept_invitation(&server, &invitation.token, &carol)
        .await
        .unwrap_err();
    assert!(matches!(err, CollabError::Expired));
}

#[tokio::test]
async fn an_expired_invitation_can_be_reissued() {
    let server = create_test_server().await;
    let alice = test_principal("Alice");
    let itinerary = create_itinerary(&server, &alice, "Vegas Trip".to_string(), vec![])
        .await
        .unwrap();

    server
        .store
        .create_invitation(&CreateInvitationParams {
            itinerary_id: itinerary.id,
            email: "carol@example.com".to_string(),
            role: Role::Viewer,
            token: format!("{:0>64}", Uuid::new_v4().simple()),
            expires_at: Utc::now() - Duration::minutes(1),
            invited_by: alice.id,
        })
        .await
        .unwrap();

    // The overdue pending record does not block a fresh invitation.
    let fresh =
        create_invitation(&server, &alice, &itinerary.id, "carol@example.com", Role::Viewer)
            .await
            .unwrap();
    assert_eq!(fresh.status, InvitationStatus::Pending);
}

#[tokio::test]
async fn sweep_expires_only_overdue_pending_records() {
    let server = create_test_server().await;
    let alice = test_principal("Alice");
    let itinerary = create_itinerary(&server, &alice, "Vegas Trip".to_string(), vec![])
        .await
        .unwrap();

    create_invitation(&server, &alice, &itinerary.id, "fresh@example.com", Role::Viewer)
        .await
        .unwrap();
    server
        .store
        .create_invitation(&CreateInvitationParams {
            itinerary_id: itinerary.id,
            email: "stale@example.com".to_string(),
            role: Role::Viewer,
            token: format!("{:0>64}", Uuid::new_v4().simple()),
            expires_at: Utc::now() - Duration::hours(1),
            invited_by: alice.id,
        })
        .await
        .unwrap();

    let swept = sweep_expired_invitations(&server).await.unwrap();
    assert_eq!(swept, 1);
    let swept_again = sweep_expired_invitations(&server).await.unwrap();
    assert_eq!(swept_again, 0);

    let all = list_invitations(&server, &alice, &itinerary.id).await.unwrap();
    let stale = all.iter().find(|i| i.email == "stale@example.com").unwrap();
    let fresh = all.iter().find(|i| i.email == "fresh@example.com").unwrap();
    assert_eq!(stale.status, InvitationStatus::Expired);
    assert_eq!(fresh.status, InvitationStatus::Pending);
}

#[tokio::test]
async fn listing_invitations_is_owner_only() {
    let server = create_test_server().await;
    let alice = test_principal("Alice");
    let editor = test_principal("Ed");
    let itinerary = create_itinerary(&server, &alice, "Vegas Trip".to_string(), vec![])
        .await
        .unwrap();
    server.store.upsert_principal(&editor).await.unwrap();
    server
        .store
        .add_collaborator(&itinerary.id, &editor.id, Role::Editor)
        .await
        .unwrap();

    assert!(list_invitations(&server, &alice, &itinerary.id).await.is_ok());
    let err = list_invitations(&server, &editor, &itinerary.id)
        .await
        .unwrap_err();
    assert!(matches!(err, CollabError::Forbidden(_)));
}

#[tokio::test]
async fn delivery_failure_rolls_the_invitation_back() {
    let server =
        create_test_server_with(email_test_config(), Some(Arc::new(FailingMailer))).await;
    let alice = test_principal("Alice");
    let itinerary = create_itinerary(&server, &alice, "Vegas Trip".to_string(), vec![])
        .await
        .unwrap();

    let err = create_invitation(&server, &alice, &itinerary.id, "carol@example.com", Role::Viewer)
        .await
        .unwrap_err();
    assert!(matches!(err, CollabError::Internal(_)));

    // No dangling record: the same address can be invited again.
    let pending = server
        .store
        .find_pending_invitation(&itinerary.id, "carol@example.com")
        .await
        .unwrap();
    assert!(pending.is_none());
}

#[tokio::test]
async fn delivered_invitations_carry_the_acceptance_link() {
    let mailer = Arc::new(RecordingMailer::default());
    let server = create_test_server_with(email_test_config(), Some(mailer.clone())).await;
    let alice = test_principal("Alice");
    let itinerary = create_itinerary(&server, &alice, "Vegas Trip".to_string(), vec![])
        .await
        .unwrap();

    let invitation =
        create_invitation(&server, &alice, &itinerary.id, "Carol@Example.com", Role::Editor)
            .await
            .unwrap();

    let sent = mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "carol@example.com");
    assert!(sent[0].subject.contains("Vegas Trip"));
    assert!(sent[0]
        .text
        .contains(&format!("/invite?token={}", invitation.token)));
}

#[tokio::test]
async fn invitation_creation_is_rate_limited() {
    let config = ServerConfig {
        rate_limits: RateLimitConfig {
            invite_limit: 2,
            invite_window_secs: 3600,
            ..Default::default()
        },
        ..Default::default()
    };
    let server = create_test_server_with(config, None).await;
    let alice = test_principal("Alice");
    let itinerary = create_itinerary(&server, &alice, "Vegas Trip".to_string(), vec![])
        .await
        .unwrap();

    create_invitation(&server, &alice, &itinerary.id, "one@example.com", Role::Viewer)
        .await
        .unwrap();
    create_invitation(&server, &alice, &itinerary.id, "two@example.com", Role::Viewer)
        .await
        .unwrap();
    let err = create_invitation(&server, &alice, &itinerary.id, "three@example.com", Role::Viewer)
        .await
        .unwrap_err();
    assert!(matches!(err, CollabError::RateLimited));
}
