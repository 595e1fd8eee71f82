//! Itinerary aggregate types.

use chrono::{DateTime, Utc};

use super::{Item, ItineraryId, PrincipalId, Role};

/// A principal's membership entry on an itinerary.
///
/// The owner is never listed here; ownership lives on the itinerary
/// record itself.
#[derive(Clone, Debug)]
pub struct Collaborator {
    pub principal_id: PrincipalId,
    pub role: Role,
    pub added_at: DateTime<Utc>,
}

/// Itinerary record with its membership and item set.
#[derive(Clone, Debug)]
pub struct Itinerary {
    pub id: ItineraryId,
    pub name: String,
    pub owner: PrincipalId,
    pub collaborators: Vec<Collaborator>,
    pub items: Vec<Item>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Itinerary {
    /// Role of `principal` on this itinerary, if any.
    pub fn role_of(&self, principal: &PrincipalId) -> Option<Role> {
        if self.owner == *principal {
            return Some(Role::Owner);
        }
        self.collaborators
            .iter()
            .find(|c| c.principal_id == *principal)
            .map(|c| c.role)
    }

    /// Whether `principal` is the owner or a listed collaborator.
    pub fn is_member(&self, principal: &PrincipalId) -> bool {
        self.role_of(principal).is_some()
    }
}

/// Parameters for creating an itinerary
#[derive(Clone, Debug)]
pub struct CreateItineraryParams {
    pub name: String,
    pub owner: PrincipalId,
    pub items: Vec<Item>,
}

/// Partial update applied by [`crate::Store::update_itinerary`].
///
/// `None` fields are left untouched; `items` replaces the whole list.
#[derive(Clone, Debug, Default)]
pub struct ItineraryPatch {
    pub name: Option<String>,
    pub items: Option<Vec<Item>>,
}
