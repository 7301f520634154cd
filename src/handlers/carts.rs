//! Cart endpoints. Everything here is scoped to the authenticated user.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    entities::cart_item,
    errors::ServiceError,
    services::carts::{AddToCartRequest, CartView, UpdateQuantityRequest},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/items", axum::routing::post(add_item))
        .route("/items/:id", put(update_quantity).delete(remove_item))
}

async fn get_cart(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<CartView>, ServiceError> {
    let view = state.carts.get_cart(user.user_id).await?;
    Ok(Json(view))
}

async fn add_item(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(request): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<cart_item::Model>), ServiceError> {
    let item = state.carts.add_item(user.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn update_quantity(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateQuantityRequest>,
) -> Result<Json<cart_item::Model>, ServiceError> {
    let item = state.carts.update_quantity(user.user_id, id, request).await?;
    Ok(Json(item))
}

async fn remove_item(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.carts.remove_item(user.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn clear_cart(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let removed = state.carts.clear_cart(user.user_id).await?;
    Ok(Json(json!({ "removed": removed })))
}
