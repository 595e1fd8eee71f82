//! Type definitions for felttrip storage.

mod ids;
mod invitations;
mod itineraries;
mod items;
mod principals;
mod roles;

// Re-export all types from submodules
pub use ids::*;
pub use invitations::*;
pub use itineraries::*;
pub use items::*;
pub use principals::*;
pub use roles::*;
