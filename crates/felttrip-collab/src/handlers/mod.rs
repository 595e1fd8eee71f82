//! Handler functions organized by domain:
//! - itineraries: create, get, list, update, delete, item add/remove
//! - invites: create, validate, accept, list, expiry sweep
//! - channel: subscription authorization and event publishing
//!
//! Every mutation evaluates the access control gate before touching
//! state and returns the updated aggregate.

pub mod channel;
pub mod invites;
pub mod itineraries;
