//! The access control evaluator.
//!
//! Every gated operation (membership mutation, invitation creation,
//! channel subscribe/publish) funnels through [`can_access`] before
//! touching state. Role rank comparison lives here and nowhere else.

use crate::types::{Itinerary, PrincipalId, Role};

/// Decide whether `principal` may act on `itinerary` at `required` rank.
///
/// The owner satisfies any required role; a collaborator satisfies it
/// when their role rank is at least the required rank; anyone else is
/// denied. Pure and total: an absent itinerary fails closed.
pub fn can_access(itinerary: Option<&Itinerary>, principal: &PrincipalId, required: Role) -> bool {
    let Some(itinerary) = itinerary else {
        return false;
    };
    match itinerary.role_of(principal) {
        Some(role) => role.includes(&required),
        None => false,
    }
}
