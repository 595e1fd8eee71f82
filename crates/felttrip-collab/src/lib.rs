//! Server core for collaborative itineraries.
//!
//! Role-gated membership operations, the invitation lifecycle, and the
//! broadcast channel gateway, all running over the [`felttrip_storage::Store`]
//! and [`felttrip_events::EventBus`] abstractions. The [`CollabServer`]
//! is constructed once at process start and injected into request
//! handlers; it holds no per-request state beyond rate-limit counters.

pub mod config;
pub mod email;
mod error;
pub mod handlers;
mod rate_limit;
mod server;

#[cfg(test)]
mod tests;

pub use error::CollabError;
pub use rate_limit::RateLimiter;
pub use server::CollabServer;
