//! Storefront backend: cart, address book, geo-banded delivery
//! pricing, atomic checkout, and the order lifecycle state machine with
//! best-effort event fan-out.

use std::sync::Arc;
use std::time::Duration;

use axum::{http::HeaderValue, Extension, Router};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::warn;

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod services;

use auth::TokenVerifier;
use config::AppConfig;
use db::DbPool;
use events::{EventSender, LiveFeed};
use services::{AddressService, CartService, OrderService, OrderStatusService};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared application state handed to every handler.
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: AppConfig,
    pub orders: OrderService,
    pub order_status: OrderStatusService,
    pub carts: CartService,
    pub addresses: AddressService,
    pub live_feed: Option<LiveFeed>,
}

impl AppState {
    pub fn new(
        db: Arc<DbPool>,
        config: AppConfig,
        event_sender: Option<Arc<EventSender>>,
        live_feed: Option<LiveFeed>,
    ) -> Self {
        let delivery = config.delivery.clone();
        Self {
            orders: OrderService::new(db.clone(), delivery.clone(), event_sender.clone()),
            order_status: OrderStatusService::new(db.clone(), event_sender),
            carts: CartService::new(db.clone(), delivery.clone()),
            addresses: AddressService::new(db.clone(), delivery),
            live_feed,
            db,
            config,
        }
    }
}

/// Builds the application router with the ambient middleware stack.
pub fn app(state: Arc<AppState>) -> Router {
    let verifier = Arc::new(TokenVerifier::new(&state.config.jwt_secret));
    let cors = cors_layer(&state.config);

    handlers::api_router()
        .with_state(state)
        .layer(Extension(verifier))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let Some(origins) = &config.cors_allowed_origins else {
        return CorsLayer::permissive();
    };

    let parsed: Vec<HeaderValue> = origins
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin, error = %e, "ignoring unparsable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}
