/**
 * Item Handlers
 *
 * CRUD over the in-memory item store:
 *
 * - `GET /api/items` - list items
 * - `POST /api/items` - create an item (201)
 * - `GET /api/items/{id}` - fetch one item
 * - `PUT /api/items/{id}` - replace an item
 * - `PATCH /api/items/{id}` - partially update an item
 * - `DELETE /api/items/{id}` - delete an item (204)
 *
 * Failures are `BackendError`s: empty name (400), unknown id (404),
 * duplicate name (409).
 */

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::backend::error::BackendError;
use crate::backend::items::state::{Item, ItemInput, ItemPatch, ItemStore};

pub type SharedItems = Arc<RwLock<ItemStore>>;

pub async fn list_items(State(items): State<SharedItems>) -> Json<Vec<Item>> {
    Json(items.read().await.list())
}

pub async fn create_item(
    State(items): State<SharedItems>,
    Json(input): Json<ItemInput>,
) -> Result<(StatusCode, Json<Item>), BackendError> {
    let item = items.write().await.create(input)?;
    tracing::info!(item_id = item.id, name = %item.name, "Item created");
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn get_item(State(items): State<SharedItems>, Path(id): Path<u64>) -> Result<Json<Item>, BackendError> {
    let items = items.read().await;
    Ok(Json(items.get(id)?.clone()))
}

pub async fn replace_item(
    State(items): State<SharedItems>,
    Path(id): Path<u64>,
    Json(input): Json<ItemInput>,
) -> Result<Json<Item>, BackendError> {
    Ok(Json(items.write().await.replace(id, input)?))
}

pub async fn patch_item(
    State(items): State<SharedItems>,
    Path(id): Path<u64>,
    Json(patch): Json<ItemPatch>,
) -> Result<Json<Item>, BackendError> {
    Ok(Json(items.write().await.patch(id, patch)?))
}

pub async fn delete_item(State(items): State<SharedItems>, Path(id): Path<u64>) -> Result<StatusCode, BackendError> {
    let removed = items.write().await.remove(id)?;
    tracing::info!(item_id = removed.id, "Item deleted");
    Ok(StatusCode::NO_CONTENT)
}
