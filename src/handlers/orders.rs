//! Order endpoints: checkout, queries, lifecycle actions, and the
//! admin live feed.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::{get, post, put},
    Json, Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    auth::{AdminUser, AuthenticatedUser},
    entities::order,
    errors::ServiceError,
    services::{
        orders::{CreateOrderRequest, OrderDetails, OrderListQuery, OrderPage},
        OrderStatus,
    },
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_order).get(list_my_orders))
        .route("/all", get(list_all_orders))
        .route("/feed", get(live_feed))
        .route("/:id", get(get_order))
        .route("/:id/cancel", post(cancel_order))
        .route("/:id/return", post(initiate_return))
        .route("/:id/return/cancel", post(cancel_return))
        .route("/:id/status", put(update_status))
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderDetails>), ServiceError> {
    let details = state.orders.create_order(user.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(details)))
}

async fn list_my_orders(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<OrderPage>, ServiceError> {
    let page = state.orders.list_orders(user.user_id, query).await?;
    Ok(Json(page))
}

async fn list_all_orders(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<OrderPage>, ServiceError> {
    let page = state.orders.list_all_orders(query).await?;
    Ok(Json(page))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderDetails>, ServiceError> {
    let details = state.orders.get_order(id, &user).await?;
    Ok(Json(details))
}

async fn cancel_order(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<order::Model>, ServiceError> {
    let updated = state.order_status.cancel_order(id, user).await?;
    Ok(Json(updated))
}

async fn initiate_return(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<order::Model>, ServiceError> {
    let updated = state
        .order_status
        .update_status(id, OrderStatus::ReturnInitiated, user)
        .await?;
    Ok(Json(updated))
}

async fn cancel_return(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<order::Model>, ServiceError> {
    let updated = state
        .order_status
        .update_status(id, OrderStatus::ReturnCancelled, user)
        .await?;
    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
struct UpdateStatusRequest {
    status: String,
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<order::Model>, ServiceError> {
    let new_status = OrderStatus::parse(&request.status)?;
    let updated = state.order_status.update_status(id, new_status, user).await?;
    Ok(Json(updated))
}

/// Server-sent event stream of order events for the operations
/// dashboard. Lagging consumers skip missed events rather than
/// stalling the feed.
async fn live_feed(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ServiceError> {
    let rx = state
        .live_feed
        .as_ref()
        .ok_or_else(|| ServiceError::NotFound("Live feed is not enabled".into()))?
        .subscribe();

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let sse = match serde_json::to_string(&event) {
                        Ok(body) => SseEvent::default().data(body),
                        Err(e) => {
                            warn!(error = %e, "failed to serialize order event for feed");
                            continue;
                        }
                    };
                    return Some((Ok(sse), rx));
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "live feed consumer lagged");
                    continue;
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
