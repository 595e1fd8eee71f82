//! Itinerary handlers: create, get, list, update, delete, items.

use tracing::info;

use felttrip_storage::{
    CreateItineraryParams, Itinerary, ItineraryId, ItineraryPatch, Item, Principal, PrincipalId,
    Role, Store,
};

use crate::server::CollabServer;
use crate::CollabError;

pub async fn create_itinerary(
    server: &CollabServer,
    principal: &Principal,
    name: String,
    items: Vec<Item>,
) -> Result<Itinerary, CollabError> {
    if name.trim().is_empty() {
        return Err(CollabError::Invalid("itinerary name must not be empty".to_string()));
    }
    server.store.upsert_principal(principal).await?;

    let itinerary = server
        .store
        .create_itinerary(&CreateItineraryParams {
            name,
            owner: principal.id,
            items,
        })
        .await?;
    info!(itinerary = %itinerary.id, owner = %principal.id, "itinerary created");
    Ok(itinerary)
}

pub async fn get_itinerary(
    server: &CollabServer,
    principal: &PrincipalId,
    itinerary_id: &ItineraryId,
) -> Result<Itinerary, CollabError> {
    server
        .require_access(
            principal,
            itinerary_id,
            Role::Viewer,
            "You do not have access to this itinerary",
        )
        .await
}

/// All itineraries the principal owns or collaborates on. The store
/// query is scoped to the principal, so nothing else can leak.
pub async fn list_itineraries(
    server: &CollabServer,
    principal: &PrincipalId,
) -> Result<Vec<Itinerary>, CollabError> {
    Ok(server.store.list_itineraries_for(principal).await?)
}

pub async fn update_itinerary(
    server: &CollabServer,
    principal: &PrincipalId,
    itinerary_id: &ItineraryId,
    patch: ItineraryPatch,
) -> Result<Itinerary, CollabError> {
    if let Some(name) = &patch.name {
        if name.trim().is_empty() {
            return Err(CollabError::Invalid("itinerary name must not be empty".to_string()));
        }
    }
    server
        .require_access(
            principal,
            itinerary_id,
            Role::Editor,
            "Only editors can modify this itinerary",
        )
        .await?;

    let updated = server.store.update_itinerary(itinerary_id, &patch).await?;
    info!(itinerary = %itinerary_id, by = %principal, "itinerary updated");
    Ok(updated)
}

pub async fn delete_itinerary(
    server: &CollabServer,
    principal: &PrincipalId,
    itinerary_id: &ItineraryId,
) -> Result<(), CollabError> {
    server
        .require_access(
            principal,
            itinerary_id,
            Role::Owner,
            "Only the owner can delete this itinerary",
        )
        .await?;

    server.store.delete_itinerary(itinerary_id).await?;
    info!(itinerary = %itinerary_id, by = %principal, "itinerary deleted");
    Ok(())
}

/// Idempotent add: re-adding an identity already present (e.g. a
/// replayed broadcast event) changes nothing.
pub async fn add_item(
    server: &CollabServer,
    principal: &PrincipalId,
    itinerary_id: &ItineraryId,
    item: Item,
) -> Result<Itinerary, CollabError> {
    if item.id.trim().is_empty() {
        return Err(CollabError::Invalid("item id must not be empty".to_string()));
    }
    server
        .require_access(
            principal,
            itinerary_id,
            Role::Editor,
            "Only editors can add items",
        )
        .await?;

    Ok(server.store.add_item(itinerary_id, &item).await?)
}

/// Idempotent remove: removing an absent identity is a no-op.
pub async fn remove_item(
    server: &CollabServer,
    principal: &PrincipalId,
    itinerary_id: &ItineraryId,
    item_id: &str,
) -> Result<Itinerary, CollabError> {
    server
        .require_access(
            principal,
            itinerary_id,
            Role::Editor,
            "Only editors can remove items",
        )
        .await?;

    Ok(server.store.remove_item(itinerary_id, item_id).await?)
}

pub async fn remove_collaborator(
    server: &CollabServer,
    principal: &PrincipalId,
    itinerary_id: &ItineraryId,
    collaborator: &PrincipalId,
) -> Result<Itinerary, CollabError> {
    server
        .require_access(
            principal,
            itinerary_id,
            Role::Owner,
            "Only the owner can remove collaborators",
        )
        .await?;

    server
        .store
        .remove_collaborator(itinerary_id, collaborator)
        .await?;
    info!(itinerary = %itinerary_id, removed = %collaborator, "collaborator removed");
    Ok(server.store.get_itinerary(itinerary_id).await?)
}
