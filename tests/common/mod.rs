//! Shared fixtures for the integration tests: an in-memory sqlite
//! database with the schema derived from the entities, plus seeding
//! helpers.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ConnectionTrait, Database, DatabaseConnection, Schema,
};
use uuid::Uuid;

use storefront_api::config::DeliveryConfig;
use storefront_api::entities::{address, cart_item, order, product, product_variant};
use storefront_api::events::EventSender;
use storefront_api::services::{OrderService, OrderStatusService};

pub async fn setup_db() -> Arc<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("sqlite in-memory connection");

    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let statements = vec![
        schema.create_table_from_entity(storefront_api::entities::Product),
        schema.create_table_from_entity(storefront_api::entities::ProductVariant),
        schema.create_table_from_entity(storefront_api::entities::CartItem),
        schema.create_table_from_entity(storefront_api::entities::Address),
        schema.create_table_from_entity(storefront_api::entities::Order),
        schema.create_table_from_entity(storefront_api::entities::OrderItem),
        schema.create_table_from_entity(storefront_api::entities::StoreStatus),
    ];
    for stmt in statements {
        db.execute(backend.build(&stmt)).await.expect("create table");
    }

    Arc::new(db)
}

/// Delivery policy used across the tests: free within 5 km, then 40
/// and 60, 100 beyond 12 km, flat 40 without coordinates, and a 40
/// surcharge below a 350 subtotal.
pub fn test_delivery_config() -> DeliveryConfig {
    DeliveryConfig {
        store_latitude: 22.9987,
        store_longitude: 72.6012,
        ..Default::default()
    }
}

pub fn order_service(db: Arc<DatabaseConnection>, events: Option<Arc<EventSender>>) -> OrderService {
    OrderService::new(db, test_delivery_config(), events)
}

pub fn status_service(
    db: Arc<DatabaseConnection>,
    events: Option<Arc<EventSender>>,
) -> OrderStatusService {
    OrderStatusService::new(db, events)
}

pub async fn seed_product(db: &DatabaseConnection, name: &str, is_active: bool) -> product::Model {
    let now = Utc::now();
    product::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        image_url: Set(None),
        is_active: Set(is_active),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("insert product")
}

pub async fn seed_variant(
    db: &DatabaseConnection,
    product_id: Uuid,
    price: Decimal,
    is_default: bool,
    is_active: bool,
) -> product_variant::Model {
    let now = Utc::now();
    product_variant::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        price: Set(price),
        original_price: Set(None),
        weight: Set(None),
        unit: Set(Some("kg".to_string())),
        image_url: Set(None),
        is_default: Set(is_default),
        is_active: Set(is_active),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("insert variant")
}

pub async fn seed_cart_item(
    db: &DatabaseConnection,
    user_id: Uuid,
    product_id: Uuid,
    variant_id: Option<Uuid>,
    quantity: i32,
) -> cart_item::Model {
    let now = Utc::now();
    cart_item::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        product_id: Set(product_id),
        variant_id: Set(variant_id),
        quantity: Set(quantity),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("insert cart item")
}

/// Address without coordinates: checkout falls back to the stored or
/// flat fee.
pub async fn seed_address(db: &DatabaseConnection, user_id: Uuid) -> address::Model {
    seed_address_at(db, user_id, None, None).await
}

pub async fn seed_address_at(
    db: &DatabaseConnection,
    user_id: Uuid,
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> address::Model {
    let now = Utc::now();
    address::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        address_line1: Set("12 Market Street".to_string()),
        area: Set(Some("Maninagar".to_string())),
        city: Set("Ahmedabad".to_string()),
        state: Set("Gujarat".to_string()),
        pincode: Set("380008".to_string()),
        landmark: Set(None),
        latitude: Set(latitude),
        longitude: Set(longitude),
        address_type: Set("home".to_string()),
        is_default: Set(true),
        delivery_fee: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("insert address")
}

/// Inserts an order row directly, bypassing checkout, for lifecycle
/// tests that need a specific starting status.
pub async fn seed_order(
    db: &DatabaseConnection,
    user_id: Uuid,
    address_id: Uuid,
    status: &str,
) -> order::Model {
    let now = Utc::now();
    order::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_number: Set(format!(
            "ORD-{}",
            &Uuid::new_v4().simple().to_string()[..8].to_uppercase()
        )),
        user_id: Set(user_id),
        address_id: Set(address_id),
        subtotal: Set(Decimal::from(500)),
        delivery_fee: Set(Decimal::ZERO),
        small_cart_surcharge: Set(None),
        total: Set(Decimal::from(500)),
        status: Set(status.to_string()),
        payment_method: Set("cod".to_string()),
        payment_status: Set("pending".to_string()),
        delivery_instructions: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("insert order")
}
