//! Common test helpers for the collaboration core tests.
//!
//! Provides server construction over in-memory SQLite and the
//! in-memory event bus, principal helpers, and mock mailers.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use felttrip_events_memory::MemoryEventBus;
use felttrip_storage::{Principal, PrincipalId};
use felttrip_store_sqlite::SqliteStore;

use crate::config::{EmailConfig, EmailProviderConfig, ServerConfig};
use crate::email::{EmailError, EmailProvider, InvitationEmailContent};
use crate::server::CollabServer;

/// Create a server with in-memory SQLite and no mailer.
pub async fn create_test_server() -> CollabServer {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let events = Arc::new(MemoryEventBus::new());
    CollabServer::new(store, events, ServerConfig::default(), None)
}

/// Create a server with a custom config and optional mailer.
pub async fn create_test_server_with(
    config: ServerConfig,
    mailer: Option<Arc<dyn EmailProvider>>,
) -> CollabServer {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let events = Arc::new(MemoryEventBus::new());
    CollabServer::new(store, events, config, mailer)
}

/// A config with email delivery nominally enabled, for pairing with a
/// mock mailer.
pub fn email_test_config() -> ServerConfig {
    ServerConfig {
        email: Some(EmailConfig {
            provider: EmailProviderConfig::Smtp {
                host: "localhost".to_string(),
                port: 25,
                username: None,
                password: None,
                use_tls: false,
            },
            from_address: "trips@felttrip.test".to_string(),
            from_name: Some("Felttrip".to_string()),
        }),
        ..Default::default()
    }
}

pub fn test_principal(name: &str) -> Principal {
    Principal {
        id: PrincipalId(Uuid::new_v4()),
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
    }
}

/// One captured outbound invitation email.
#[derive(Clone, Debug)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
}

/// Mailer that records every send instead of delivering.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<SentEmail>>,
}

#[async_trait]
impl EmailProvider for RecordingMailer {
    async fn send_invitation(
        &self,
        to: &str,
        content: &InvitationEmailContent,
        _from_address: &str,
        _from_name: Option<&str>,
    ) -> Result<(), EmailError> {
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: content.subject.clone(),
            text: content.text.clone(),
        });
        Ok(())
    }
}

/// Mailer whose sends always fail, for rollback tests.
pub struct FailingMailer;

#[async_trait]
impl EmailProvider for FailingMailer {
    async fn send_invitation(
        &self,
        _to: &str,
        _content: &InvitationEmailContent,
        _from_address: &str,
        _from_name: Option<&str>,
    ) -> Result<(), EmailError> {
        Err(EmailError::SendFailed("smtp connection refused".to_string()))
    }
}
