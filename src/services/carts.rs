//! Cart reads and writes.
//!
//! The cart stores references, not prices: every read re-resolves the
//! effective variant so the quoted amounts always reflect the current
//! catalog. Checkout does its own resolution pass; the figures here are
//! a preview, not a commitment.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::DeliveryConfig,
    db::DbPool,
    entities::{
        cart_item::{self, Entity as CartItemEntity},
        product::{self, Entity as ProductEntity},
        product_variant::{self, Entity as ProductVariantEntity},
    },
    errors::ServiceError,
    services::{delivery, variants},
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    /// Pins an exact variant; `None` tracks the product default.
    pub variant_id: Option<Uuid>,
    #[validate(range(min = 1, max = 99))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateQuantityRequest {
    #[validate(range(min = 1, max = 99))]
    pub quantity: i32,
}

/// One cart line priced against the current catalog.
#[derive(Debug, Serialize)]
pub struct CartLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub image_url: Option<String>,
    pub variant: variants::ResolvedVariant,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_subtotal: Decimal,
}

#[derive(Debug, Serialize)]
pub struct CartSummary {
    pub subtotal: Decimal,
    /// Catalog savings: sum of (original_price - price) over lines
    /// where an original price is recorded.
    pub savings: Decimal,
    pub small_cart_surcharge: Option<Decimal>,
    pub item_count: i32,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub summary: CartSummary,
}

#[derive(Clone)]
pub struct CartService {
    db: Arc<DbPool>,
    delivery: DeliveryConfig,
}

impl CartService {
    pub fn new(db: Arc<DbPool>, delivery: DeliveryConfig) -> Self {
        Self { db, delivery }
    }

    /// Reads the cart with every line re-priced. Lines whose product
    /// has vanished from the catalog are skipped rather than failing
    /// the whole read.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_cart(&self, user_id: Uuid) -> Result<CartView, ServiceError> {
        let items = CartItemEntity::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
        let products = ProductEntity::find()
            .filter(product::Column::Id.is_in(product_ids.clone()))
            .all(&*self.db)
            .await?;
        let all_variants = ProductVariantEntity::find()
            .filter(product_variant::Column::ProductId.is_in(product_ids))
            .all(&*self.db)
            .await?;

        let mut lines = Vec::with_capacity(items.len());
        let mut subtotal = Decimal::ZERO;
        let mut savings = Decimal::ZERO;
        let mut item_count = 0;

        for item in items {
            let Some(product) = products.iter().find(|p| p.id == item.product_id) else {
                continue;
            };
            let Ok(resolved) = variants::resolve(item.product_id, &all_variants, item.variant_id)
            else {
                continue;
            };

            let unit_price = resolved.variant.price;
            let line_subtotal = unit_price * Decimal::from(item.quantity);
            subtotal += line_subtotal;
            item_count += item.quantity;
            if let Some(original) = resolved.variant.original_price {
                if original > unit_price {
                    savings += (original - unit_price) * Decimal::from(item.quantity);
                }
            }

            lines.push(CartLine {
                id: item.id,
                product_id: product.id,
                product_name: product.name.clone(),
                image_url: product.image_url.clone(),
                variant: resolved,
                quantity: item.quantity,
                unit_price,
                line_subtotal,
            });
        }

        Ok(CartView {
            items: lines,
            summary: CartSummary {
                subtotal,
                savings,
                small_cart_surcharge: delivery::surcharge_for(&self.delivery, subtotal),
                item_count,
            },
        })
    }

    /// Adds a line, merging quantity into an existing line for the same
    /// product and pin.
    #[instrument(skip(self, request), fields(user_id = %user_id, product_id = %request.product_id))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        request: AddToCartRequest,
    ) -> Result<cart_item::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let product = ProductEntity::find_by_id(request.product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", request.product_id))
            })?;
        if !product.is_active {
            return Err(ServiceError::ValidationError(format!(
                "product '{}' is no longer available",
                product.name
            )));
        }

        // A pinned variant must resolve now; adding a dead pin to the
        // cart would only defer the failure to checkout.
        if request.variant_id.is_some() {
            let product_variants = ProductVariantEntity::find()
                .filter(product_variant::Column::ProductId.eq(request.product_id))
                .all(&*self.db)
                .await?;
            variants::resolve(request.product_id, &product_variants, request.variant_id)?;
        }

        let existing = CartItemEntity::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::ProductId.eq(request.product_id))
            .filter(match request.variant_id {
                Some(id) => cart_item::Column::VariantId.eq(id),
                None => cart_item::Column::VariantId.is_null(),
            })
            .one(&*self.db)
            .await?;

        let saved = match existing {
            Some(item) => {
                let merged = item.quantity + request.quantity;
                let mut active: cart_item::ActiveModel = item.into();
                active.quantity = Set(merged);
                active.updated_at = Set(Utc::now());
                active.update(&*self.db).await?
            }
            None => {
                let now = Utc::now();
                let active = cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    product_id: Set(request.product_id),
                    variant_id: Set(request.variant_id),
                    quantity: Set(request.quantity),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                active.insert(&*self.db).await?
            }
        };

        info!(cart_item_id = %saved.id, quantity = saved.quantity, "cart line saved");
        Ok(saved)
    }

    #[instrument(skip(self), fields(user_id = %user_id, item_id = %item_id))]
    pub async fn update_quantity(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        request: UpdateQuantityRequest,
    ) -> Result<cart_item::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let item = CartItemEntity::find_by_id(item_id)
            .filter(cart_item::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))?;

        let mut active: cart_item::ActiveModel = item.into();
        active.quantity = Set(request.quantity);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    #[instrument(skip(self), fields(user_id = %user_id, item_id = %item_id))]
    pub async fn remove_item(&self, user_id: Uuid, item_id: Uuid) -> Result<(), ServiceError> {
        let result = CartItemEntity::delete_many()
            .filter(cart_item::Column::Id.eq(item_id))
            .filter(cart_item::Column::UserId.eq(user_id))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Cart item {} not found",
                item_id
            )));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn clear_cart(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        let result = CartItemEntity::delete_many()
            .filter(cart_item::Column::UserId.eq(user_id))
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected)
    }
}
