//! The shared server state injected into request handlers.

use std::sync::Arc;
use std::time::Duration;

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand_core::OsRng;

use felttrip_events::EventBus;
use felttrip_storage::{can_access, Itinerary, ItineraryId, PrincipalId, Role, Store};

use crate::config::ServerConfig;
use crate::email::EmailProvider;
use crate::rate_limit::RateLimiter;
use crate::CollabError;

/// Process-wide collaboration state: storage, event bus, mailer and
/// rate-limit counters. Constructed once at startup, torn down at
/// shutdown, and passed by reference into every handler.
pub struct CollabServer {
    pub store: Arc<dyn Store>,
    pub events: Arc<dyn EventBus>,
    pub config: ServerConfig,
    mailer: Option<Arc<dyn EmailProvider>>,
    signing_key: SigningKey,
    pub(crate) invite_limiter: RateLimiter,
    pub(crate) publish_limiter: RateLimiter,
}

impl CollabServer {
    pub fn new(
        store: Arc<dyn Store>,
        events: Arc<dyn EventBus>,
        config: ServerConfig,
        mailer: Option<Arc<dyn EmailProvider>>,
    ) -> Self {
        let limits = &config.rate_limits;
        let invite_limiter = RateLimiter::new(
            limits.invite_limit,
            Duration::from_secs(limits.invite_window_secs),
        );
        let publish_limiter = RateLimiter::new(
            limits.publish_limit,
            Duration::from_secs(limits.publish_window_secs),
        );
        Self {
            store,
            events,
            config,
            mailer,
            signing_key: SigningKey::generate(&mut OsRng),
            invite_limiter,
            publish_limiter,
        }
    }

    pub fn mailer(&self) -> Option<&Arc<dyn EmailProvider>> {
        self.mailer.as_ref()
    }

    /// Public half of the key used to sign channel authorizations.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub(crate) fn sign(&self, message: &str) -> String {
        hex::encode(self.signing_key.sign(message.as_bytes()).to_bytes())
    }

    /// Load the itinerary and gate on `required` rank before any state
    /// is touched. `denied` becomes the user-visible Forbidden message.
    pub async fn require_access(
        &self,
        principal: &PrincipalId,
        itinerary_id: &ItineraryId,
        required: Role,
        denied: &str,
    ) -> Result<Itinerary, CollabError> {
        let itinerary = self.store.get_itinerary(itinerary_id).await?;
        if !can_access(Some(&itinerary), principal, required) {
            return Err(CollabError::Forbidden(denied.to_string()));
        }
        Ok(itinerary)
    }
}
