//! Address book endpoints, scoped to the authenticated user.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    entities::address,
    errors::ServiceError,
    services::addresses::SaveAddressRequest,
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_addresses).post(create_address))
        .route("/:id", put(update_address).delete(delete_address))
        .route("/:id/default", post(set_default))
}

async fn list_addresses(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<address::Model>>, ServiceError> {
    let addresses = state.addresses.list(user.user_id).await?;
    Ok(Json(addresses))
}

async fn create_address(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(request): Json<SaveAddressRequest>,
) -> Result<(StatusCode, Json<address::Model>), ServiceError> {
    let created = state.addresses.create(user.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_address(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<SaveAddressRequest>,
) -> Result<Json<address::Model>, ServiceError> {
    let updated = state.addresses.update(user.user_id, id, request).await?;
    Ok(Json(updated))
}

async fn set_default(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<address::Model>, ServiceError> {
    let updated = state.addresses.set_default(user.user_id, id).await?;
    Ok(Json(updated))
}

async fn delete_address(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.addresses.delete(user.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
