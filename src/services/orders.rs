//! Order assembly: turns a cart into a priced, persisted order in one
//! transaction, plus the owner/admin order queries.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthenticatedUser,
    config::DeliveryConfig,
    db::DbPool,
    entities::{
        address::{self, Entity as AddressEntity},
        cart_item::{self, Entity as CartItemEntity},
        order::{self, Entity as OrderEntity},
        order_item::{self, Entity as OrderItemEntity},
        product::{self, Entity as ProductEntity},
        product_variant::{self, Entity as ProductVariantEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{delivery, variants},
};

const ORDER_NUMBER_PREFIX: &str = "ORD-";
// No 0/O/1/I/L to keep the numbers readable over the phone. Eight
// characters keep the birthday-collision odds negligible at realistic
// order volumes; the unique constraint plus a retry covers the rest.
const ORDER_NUMBER_CHARSET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const ORDER_NUMBER_SUFFIX_LEN: usize = 8;
const ORDER_NUMBER_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub address_id: Uuid,
    pub payment_method: Option<String>,
    #[validate(length(max = 500))]
    pub delivery_instructions: Option<String>,
    /// Pre-quoted fee carried over from the client, e.g. when the
    /// address screen already showed one. Recomputed server-side when
    /// absent.
    pub delivery_fee: Option<Decimal>,
}

/// Listing filters shared by the customer and admin order queries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
    /// Only orders created in the last N days.
    pub days: Option<i64>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct OrderPage {
    pub orders: Vec<order::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

#[derive(Debug, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    delivery: DeliveryConfig,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderService {
    pub fn new(
        db: Arc<DbPool>,
        delivery: DeliveryConfig,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db,
            delivery,
            event_sender,
        }
    }

    /// Converts the caller's cart into an order.
    ///
    /// Pricing is resolved from the current catalog before the write
    /// transaction opens; the insert of the order, its lines, and the
    /// cart clear then commit or roll back together. A validation
    /// failure on any cart line fails the whole conversion.
    #[instrument(skip(self, request), fields(user_id = %user_id, address_id = %request.address_id))]
    pub async fn create_order(
        &self,
        user_id: Uuid,
        request: CreateOrderRequest,
    ) -> Result<OrderDetails, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        if let Some(fee) = request.delivery_fee {
            if fee < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "delivery_fee cannot be negative".into(),
                ));
            }
        }

        let cart_items = CartItemEntity::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .all(&*self.db)
            .await?;
        if cart_items.is_empty() {
            return Err(ServiceError::CartEmpty);
        }

        let address = AddressEntity::find_by_id(request.address_id)
            .filter(address::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Address {} not found", request.address_id))
            })?;

        let priced_lines = self.price_cart_lines(&cart_items).await?;
        let subtotal: Decimal = priced_lines.iter().map(|line| line.subtotal).sum();

        let delivery_fee = self.resolve_delivery_fee(request.delivery_fee, &address);
        let surcharge = delivery::surcharge_for(&self.delivery, subtotal);
        let total = subtotal + delivery_fee + surcharge.unwrap_or(Decimal::ZERO);

        let now = Utc::now();

        // The order number carries a unique constraint; on the rare
        // collision the whole transaction is retried with a fresh one.
        let mut last_err = None;
        for attempt in 0..ORDER_NUMBER_ATTEMPTS {
            let order_id = Uuid::new_v4();
            let order_number = generate_order_number();

            let txn = self.db.begin().await.map_err(|e| {
                error!(error = %e, "failed to begin order transaction");
                ServiceError::DatabaseError(e)
            })?;

            let order_model = order::ActiveModel {
                id: Set(order_id),
                order_number: Set(order_number.clone()),
                user_id: Set(user_id),
                address_id: Set(address.id),
                subtotal: Set(subtotal),
                delivery_fee: Set(delivery_fee),
                small_cart_surcharge: Set(surcharge),
                total: Set(total),
                status: Set(super::order_status::OrderStatus::Pending.to_string()),
                payment_method: Set(
                    request
                        .payment_method
                        .clone()
                        .unwrap_or_else(|| "cod".to_string()),
                ),
                payment_status: Set("pending".to_string()),
                delivery_instructions: Set(request.delivery_instructions.clone()),
                created_at: Set(now),
                updated_at: Set(now),
            };
            let created = match OrderEntity::insert(order_model)
                .exec_with_returning(&txn)
                .await
            {
                Ok(model) => model,
                Err(e) if is_unique_violation(&e) => {
                    warn!(%order_number, attempt, "order number collided, regenerating");
                    let _ = txn.rollback().await;
                    last_err = Some(e);
                    continue;
                }
                Err(e) => return Err(ServiceError::DatabaseError(e)),
            };

            let item_models: Vec<order_item::ActiveModel> = priced_lines
                .iter()
                .map(|line| order_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    order_id: Set(order_id),
                    product_id: Set(line.product_id),
                    variant_id: Set(line.variant_id),
                    quantity: Set(line.quantity),
                    unit_price: Set(line.unit_price),
                    subtotal: Set(line.subtotal),
                    created_at: Set(now),
                })
                .collect();
            OrderItemEntity::insert_many(item_models).exec(&txn).await?;

            CartItemEntity::delete_many()
                .filter(cart_item::Column::UserId.eq(user_id))
                .exec(&txn)
                .await?;

            txn.commit().await.map_err(|e| {
                error!(error = %e, order_id = %order_id, "failed to commit order transaction");
                ServiceError::DatabaseError(e)
            })?;

            info!(
                order_id = %order_id,
                order_number = %order_number,
                %subtotal,
                %delivery_fee,
                %total,
                "order created"
            );

            if let Some(event_sender) = &self.event_sender {
                if let Err(e) = event_sender
                    .send(Event::OrderCreated {
                        order: created.clone(),
                    })
                    .await
                {
                    warn!(error = %e, order_id = %order_id, "failed to enqueue order created event");
                }
            }

            let items = OrderItemEntity::find()
                .filter(order_item::Column::OrderId.eq(order_id))
                .all(&*self.db)
                .await?;

            return Ok(OrderDetails {
                order: created,
                items,
            });
        }

        error!(
            attempts = ORDER_NUMBER_ATTEMPTS,
            "exhausted order number attempts"
        );
        Err(ServiceError::DatabaseError(last_err.unwrap_or_else(|| {
            sea_orm::DbErr::Custom("order number generation exhausted".into())
        })))
    }

    /// Fetches one order with its lines. Customers see only their own
    /// orders; a foreign id reads as missing.
    #[instrument(skip(self, actor), fields(order_id = %order_id))]
    pub async fn get_order(
        &self,
        order_id: Uuid,
        actor: &AuthenticatedUser,
    ) -> Result<OrderDetails, ServiceError> {
        let order = OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if !actor.is_admin() && order.user_id != actor.user_id {
            return Err(ServiceError::NotFound(format!(
                "Order {} not found",
                order_id
            )));
        }

        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;

        Ok(OrderDetails { order, items })
    }

    /// Lists one customer's orders, newest first.
    pub async fn list_orders(
        &self,
        user_id: Uuid,
        query: OrderListQuery,
    ) -> Result<OrderPage, ServiceError> {
        let mut select = OrderEntity::find().filter(order::Column::UserId.eq(user_id));
        select = Self::apply_filters(select, &query)?;
        self.paginate(select, &query).await
    }

    /// Admin view across all customers.
    pub async fn list_all_orders(&self, query: OrderListQuery) -> Result<OrderPage, ServiceError> {
        let mut select = OrderEntity::find();
        select = Self::apply_filters(select, &query)?;
        self.paginate(select, &query).await
    }

    fn apply_filters(
        mut select: sea_orm::Select<OrderEntity>,
        query: &OrderListQuery,
    ) -> Result<sea_orm::Select<OrderEntity>, ServiceError> {
        if let Some(status) = &query.status {
            // Parse to reject unknown filters with a client error
            // instead of silently returning nothing.
            let status = super::order_status::OrderStatus::parse(status)?;
            select = select.filter(order::Column::Status.eq(status.to_string()));
        }
        if let Some(days) = query.days {
            if days <= 0 {
                return Err(ServiceError::ValidationError(
                    "days must be a positive number".into(),
                ));
            }
            let cutoff = Utc::now() - Duration::days(days);
            select = select.filter(order::Column::CreatedAt.gte(cutoff));
        }
        Ok(select)
    }

    async fn paginate(
        &self,
        select: sea_orm::Select<OrderEntity>,
        query: &OrderListQuery,
    ) -> Result<OrderPage, ServiceError> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

        let paginator = select
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page - 1).await?;

        Ok(OrderPage {
            orders,
            total,
            page,
            per_page,
        })
    }

    /// Prices every cart line against the current catalog.
    async fn price_cart_lines(
        &self,
        cart_items: &[cart_item::Model],
    ) -> Result<Vec<PricedLine>, ServiceError> {
        let product_ids: Vec<Uuid> = cart_items.iter().map(|item| item.product_id).collect();

        let products = ProductEntity::find()
            .filter(product::Column::Id.is_in(product_ids.clone()))
            .all(&*self.db)
            .await?;
        let all_variants = ProductVariantEntity::find()
            .filter(product_variant::Column::ProductId.is_in(product_ids))
            .all(&*self.db)
            .await?;

        let mut lines = Vec::with_capacity(cart_items.len());
        for item in cart_items {
            let product = products
                .iter()
                .find(|p| p.id == item.product_id)
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", item.product_id))
                })?;
            if !product.is_active {
                return Err(ServiceError::ValidationError(format!(
                    "product '{}' is no longer available",
                    product.name
                )));
            }

            let resolved = variants::resolve(item.product_id, &all_variants, item.variant_id)?;
            if resolved.may_be_stale() {
                warn!(
                    product_id = %item.product_id,
                    variant_id = %resolved.variant.id,
                    "pricing order line from an inactive variant"
                );
            }

            let unit_price = resolved.variant.price;
            lines.push(PricedLine {
                product_id: item.product_id,
                variant_id: Some(resolved.variant.id),
                quantity: item.quantity,
                unit_price,
                subtotal: unit_price * Decimal::from(item.quantity),
            });
        }

        Ok(lines)
    }

    /// Fee precedence: explicit client fee, then a geo quote from the
    /// address coordinates, then the fee stored on the address, then
    /// the flat fallback.
    fn resolve_delivery_fee(&self, explicit: Option<Decimal>, address: &address::Model) -> Decimal {
        if let Some(fee) = explicit {
            return fee;
        }

        if let (Some(lat), Some(lng)) = (address.latitude, address.longitude) {
            match delivery::quote(&self.delivery, delivery::Coordinates::new(lat, lng)) {
                Ok(q) => return q.fee,
                Err(e) => {
                    warn!(
                        address_id = %address.id,
                        error = %e,
                        "stored coordinates unusable, falling back to flat fee"
                    );
                }
            }
        }

        address
            .delivery_fee
            .unwrap_or(self.delivery.flat_fallback_fee)
    }
}

struct PricedLine {
    product_id: Uuid,
    variant_id: Option<Uuid>,
    quantity: i32,
    unit_price: Decimal,
    subtotal: Decimal,
}

fn is_unique_violation(err: &sea_orm::DbErr) -> bool {
    matches!(
        err.sql_err(),
        Some(sea_orm::SqlErr::UniqueConstraintViolation(_))
    )
}

/// `ORD-` followed by a random suffix from the unambiguous charset.
fn generate_order_number() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ORDER_NUMBER_SUFFIX_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..ORDER_NUMBER_CHARSET.len());
            ORDER_NUMBER_CHARSET[idx] as char
        })
        .collect();
    format!("{}{}", ORDER_NUMBER_PREFIX, suffix)
}
