//! Storage abstraction for felttrip itineraries.
//!
//! Backend crates (e.g., felttrip-store-sqlite) implement the [`Store`]
//! trait so the collaboration core doesn't depend on any specific
//! database engine or schema details.

mod access;
mod store;
mod types;

pub use access::can_access;
pub use store::Store;
pub use types::*;

use thiserror::Error;

/// Uniform error type for all storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("conflict")]
    Conflict,
    #[error("backend error: {0}")]
    Backend(String),
}
