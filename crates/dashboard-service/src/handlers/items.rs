//! Item API handlers.
//!
//! - `GET /api/items` - list, newest first
//! - `POST /api/items` - create
//! - `PUT /api/items/:id` - update
//! - `DELETE /api/items/:id` - delete (idempotent)
//!
//! All routes sit behind the authorization gate. Store failures surface as a
//! generic 500; the detail is logged by `DashboardError`.

use crate::errors::DashboardError;
use crate::models::{
    ItemFields, ItemRequest, ItemResponse, ItemStatus, ItemsResponse, SuccessResponse,
};
use crate::routes::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::instrument;

const FIELDS_REQUIRED_MESSAGE: &str = "Name and description are required";

/// Validate an item body into storable fields.
///
/// Name and description are trimmed and must be non-empty. A missing or
/// blank status defaults to `active`.
pub fn validate_item_request(request: ItemRequest) -> Result<ItemFields, DashboardError> {
    let name = request.name.as_deref().map(str::trim).unwrap_or_default();
    let description = request
        .description
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();

    if name.is_empty() || description.is_empty() {
        return Err(DashboardError::BadRequest(
            FIELDS_REQUIRED_MESSAGE.to_string(),
        ));
    }

    let status = match request.status.as_deref().map(str::trim) {
        None | Some("") => ItemStatus::default(),
        Some(raw) => raw
            .parse::<ItemStatus>()
            .map_err(|e| DashboardError::BadRequest(e.to_string()))?,
    };

    Ok(ItemFields {
        name: name.to_string(),
        description: description.to_string(),
        status,
    })
}

/// Handler for `GET /api/items`.
#[instrument(skip_all, name = "dashboard.handlers.list_items")]
pub async fn list_items(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ItemsResponse>, DashboardError> {
    let items = state.item_store.list().await?;
    Ok(Json(ItemsResponse { items }))
}

/// Handler for `POST /api/items`.
#[instrument(skip_all, name = "dashboard.handlers.create_item")]
pub async fn create_item(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ItemRequest>,
) -> Result<(StatusCode, Json<ItemResponse>), DashboardError> {
    let fields = validate_item_request(request)?;
    let item = state.item_store.create(fields).await?;

    tracing::info!(target: "dashboard.items", item_id = %item.id, status = %item.status, "Item created");
    Ok((StatusCode::CREATED, Json(ItemResponse { item })))
}

/// Handler for `PUT /api/items/:id`.
///
/// `createdAt` is preserved and `updatedAt` moves to now.
#[instrument(skip_all, name = "dashboard.handlers.update_item", fields(item_id = %id))]
pub async fn update_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<ItemRequest>,
) -> Result<Json<SuccessResponse>, DashboardError> {
    let fields = validate_item_request(request)?;

    match state.item_store.update(&id, fields).await? {
        Some(_) => {
            tracing::info!(target: "dashboard.items", item_id = %id, "Item updated");
            Ok(Json(SuccessResponse::ok()))
        }
        None => Err(DashboardError::NotFound("Item not found".to_string())),
    }
}

/// Handler for `DELETE /api/items/:id`.
#[instrument(skip_all, name = "dashboard.handlers.delete_item", fields(item_id = %id))]
pub async fn delete_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, DashboardError> {
    state.item_store.delete(&id).await?;

    tracing::info!(target: "dashboard.items", item_id = %id, "Item deleted");
    Ok(Json(SuccessResponse::ok()))
}
