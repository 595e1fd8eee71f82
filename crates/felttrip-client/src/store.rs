//! The local optimistic store.
//!
//! One normalized map keyed by item identity; the destination and
//! tournament views are derived on read by filtering on kind, so adds
//! and removes never have to be mirrored across parallel containers.
//! Persisted as JSON so selections survive reloads.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use felttrip_events::ItineraryEvent;
use felttrip_storage::{Item, ItemKind};

/// Error type for local store persistence.
#[derive(Debug, Error)]
pub enum LocalStoreError {
    #[error("failed to read local store: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse local store: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Client-resident cache of the user's itinerary selections.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LocalItineraryStore {
    /// Unified item map, unique by identity.
    items: HashMap<String, Item>,
    /// Last known itinerary name.
    pub itinerary_name: Option<String>,
    // Transient request state; meaningless across reloads, so it is
    // reset to idle/none on rehydration.
    #[serde(skip)]
    pub loading: bool,
    #[serde(skip)]
    pub error: Option<String>,
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl LocalItineraryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rehydrate from `path`, or start empty if the file doesn't exist
    /// yet. Transient fields come back idle regardless of what the
    /// process was doing when it last saved.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, LocalStoreError> {
        let path = path.as_ref();
        let mut store = match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str::<Self>(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(e.into()),
        };
        store.loading = false;
        store.error = None;
        store.path = Some(path.to_path_buf());
        Ok(store)
    }

    /// Write the current state to the path it was loaded from (no-op
    /// for purely in-memory stores).
    pub fn save(&self) -> Result<(), LocalStoreError> {
        if let Some(path) = &self.path {
            let contents = serde_json::to_string_pretty(self)?;
            std::fs::write(path, contents)?;
        }
        Ok(())
    }

    /// Add an item; false if the identity was already present.
    pub fn add_item(&mut self, item: Item) -> bool {
        if self.items.contains_key(&item.id) {
            return false;
        }
        self.items.insert(item.id.clone(), item);
        true
    }

    /// Remove an item by identity; false if it wasn't there.
    pub fn remove_item(&mut self, item_id: &str) -> bool {
        self.items.remove(item_id).is_some()
    }

    pub fn add_destination(&mut self, item: Item) -> bool {
        self.add_item(Item {
            kind: ItemKind::Destination,
            ..item
        })
    }

    pub fn add_tournament(&mut self, item: Item) -> bool {
        self.add_item(Item {
            kind: ItemKind::Tournament,
            ..item
        })
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.items.contains_key(item_id)
    }

    /// The unified item list.
    pub fn items(&self) -> Vec<&Item> {
        self.items.values().collect()
    }

    /// Derived view: destinations only.
    pub fn destinations(&self) -> Vec<&Item> {
        self.items
            .values()
            .filter(|i| i.kind == ItemKind::Destination)
            .collect()
    }

    /// Derived view: tournaments only.
    pub fn tournaments(&self) -> Vec<&Item> {
        self.items
            .values()
            .filter(|i| i.kind == ItemKind::Tournament)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Merge a remote domain event into local state; true if anything
    /// changed. Replayed events fall out as no-ops because adds and
    /// removes are keyed by identity.
    pub fn apply(&mut self, event: &ItineraryEvent) -> bool {
        match event {
            ItineraryEvent::ItineraryUpdated { name, .. } => {
                if self.itinerary_name.as_deref() == Some(name) {
                    false
                } else {
                    self.itinerary_name = Some(name.clone());
                    true
                }
            }
            ItineraryEvent::DestinationAdded { item }
            | ItineraryEvent::TournamentAdded { item } => self.add_item(item.clone()),
            ItineraryEvent::DestinationRemoved { item_id }
            | ItineraryEvent::TournamentRemoved { item_id } => self.remove_item(item_id),
            // Membership changes don't touch the item cache.
            ItineraryEvent::CollaboratorAdded { .. }
            | ItineraryEvent::CollaboratorRemoved { .. } => false,
        }
    }
}
