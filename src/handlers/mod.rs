use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::json;

use crate::AppState;

pub mod addresses;
pub mod carts;
pub mod orders;
pub mod store;

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Full route table. Auth is enforced per-handler by the extractors,
/// not per-route here.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/orders", orders::routes())
        .nest("/api/cart", carts::routes())
        .nest("/api/addresses", addresses::routes())
        .nest("/api/store", store::routes())
}
