//! Itinerary item types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Semantic kind of an itinerary item.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Destination,
    Tournament,
    /// Free-form entry (notes, reservations, side activities).
    Other(String),
}

impl ItemKind {
    pub fn label(&self) -> &str {
        match self {
            ItemKind::Destination => "destination",
            ItemKind::Tournament => "tournament",
            ItemKind::Other(label) => label,
        }
    }
}

/// A single entry on a shared itinerary.
///
/// Item identity (`id`) is unique within one itinerary; re-adding an
/// existing identity is a no-op rather than a duplicate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub kind: ItemKind,
    pub location: Option<String>,
    pub date: Option<NaiveDate>,
    /// Buy-in in cents, for tournaments.
    pub buy_in_cents: Option<i64>,
    pub priority: Option<String>,
}

impl Item {
    /// Minimal constructor; optional fields start empty.
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            location: None,
            date: None,
            buy_in_cents: None,
            priority: None,
        }
    }
}
