//! Store status endpoint.
//!
//! The open/closed flag is a singleton row maintained out-of-band (an
//! operator flips it); this service only reads it. A missing row means
//! the store has never been closed manually and reads as open.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use sea_orm::EntityTrait;
use serde::Serialize;

use crate::{
    entities::store_status::Entity as StoreStatusEntity, errors::ServiceError, AppState,
};

const SETTINGS_ROW_ID: i32 = 1;

#[derive(Debug, Serialize)]
pub struct StoreStatusResponse {
    pub is_open: bool,
    pub is_manual_closed: bool,
    pub server_time: chrono::DateTime<Utc>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/status", get(store_status))
}

async fn store_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StoreStatusResponse>, ServiceError> {
    let row = StoreStatusEntity::find_by_id(SETTINGS_ROW_ID)
        .one(&*state.db)
        .await?;

    let is_manual_closed = row.map(|r| r.is_manual_closed).unwrap_or(false);

    Ok(Json(StoreStatusResponse {
        is_open: !is_manual_closed,
        is_manual_closed,
        server_time: Utc::now(),
    }))
}
