//! Client-side pieces of the collaborative itinerary subsystem: the
//! persisted local optimistic store and the realtime synchronizer.
//!
//! The local store is advisory and local-first: mutated immediately on
//! user action, reconciled against events from other members, and
//! never consulted for access-control decisions.

mod store;
mod sync;

pub use store::LocalItineraryStore;
pub use sync::{EventPublisher, Notification, OpGuard, PendingOps, Synchronizer};
