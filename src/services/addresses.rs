//! User-scoped address book.
//!
//! The default flag is exclusive per user: promoting an address demotes
//! the previous default inside the same transaction. When coordinates
//! are supplied, the delivery fee is quoted once at save time and
//! stored as a display hint.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use serde::Deserialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::DeliveryConfig,
    db::DbPool,
    entities::address::{self, Entity as AddressEntity},
    errors::ServiceError,
    services::delivery,
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SaveAddressRequest {
    #[validate(length(min = 1, max = 200))]
    pub address_line1: String,
    #[validate(length(max = 100))]
    pub area: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 100))]
    pub state: String,
    #[validate(length(min = 4, max = 10))]
    pub pincode: String,
    #[validate(length(max = 200))]
    pub landmark: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// home / work / other; free-form label, not an enum.
    #[validate(length(max = 20))]
    pub address_type: Option<String>,
    pub is_default: Option<bool>,
}

#[derive(Clone)]
pub struct AddressService {
    db: Arc<DbPool>,
    delivery: DeliveryConfig,
}

impl AddressService {
    pub fn new(db: Arc<DbPool>, delivery: DeliveryConfig) -> Self {
        Self { db, delivery }
    }

    /// Lists the user's addresses, default first.
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<address::Model>, ServiceError> {
        Ok(AddressEntity::find()
            .filter(address::Column::UserId.eq(user_id))
            .order_by_desc(address::Column::IsDefault)
            .order_by_desc(address::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn create(
        &self,
        user_id: Uuid,
        request: SaveAddressRequest,
    ) -> Result<address::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let delivery_fee = self.quote_fee(&request);
        let make_default = request.is_default.unwrap_or(false);
        let now = Utc::now();

        let txn = self.db.begin().await?;

        if make_default {
            self.demote_current_default(&txn, user_id).await?;
        }

        let active = address::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            address_line1: Set(request.address_line1),
            area: Set(request.area),
            city: Set(request.city),
            state: Set(request.state),
            pincode: Set(request.pincode),
            landmark: Set(request.landmark),
            latitude: Set(request.latitude),
            longitude: Set(request.longitude),
            address_type: Set(request.address_type.unwrap_or_else(|| "home".to_string())),
            is_default: Set(make_default),
            delivery_fee: Set(delivery_fee),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = active.insert(&txn).await?;

        txn.commit().await?;

        info!(address_id = %created.id, is_default = created.is_default, "address created");
        Ok(created)
    }

    #[instrument(skip(self, request), fields(user_id = %user_id, address_id = %address_id))]
    pub async fn update(
        &self,
        user_id: Uuid,
        address_id: Uuid,
        request: SaveAddressRequest,
    ) -> Result<address::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let delivery_fee = self.quote_fee(&request);
        let make_default = request.is_default.unwrap_or(false);

        let txn = self.db.begin().await?;

        let existing = AddressEntity::find_by_id(address_id)
            .filter(address::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Address {} not found", address_id)))?;

        if make_default && !existing.is_default {
            self.demote_current_default(&txn, user_id).await?;
        }

        let was_default = existing.is_default;
        let mut active: address::ActiveModel = existing.into();
        active.address_line1 = Set(request.address_line1);
        active.area = Set(request.area);
        active.city = Set(request.city);
        active.state = Set(request.state);
        active.pincode = Set(request.pincode);
        active.landmark = Set(request.landmark);
        active.latitude = Set(request.latitude);
        active.longitude = Set(request.longitude);
        if let Some(address_type) = request.address_type {
            active.address_type = Set(address_type);
        }
        active.is_default = Set(make_default || was_default && request.is_default.is_none());
        active.delivery_fee = Set(delivery_fee);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        txn.commit().await?;
        Ok(updated)
    }

    /// Promotes one address to default, demoting the previous default
    /// in the same transaction.
    #[instrument(skip(self), fields(user_id = %user_id, address_id = %address_id))]
    pub async fn set_default(
        &self,
        user_id: Uuid,
        address_id: Uuid,
    ) -> Result<address::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let target = AddressEntity::find_by_id(address_id)
            .filter(address::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Address {} not found", address_id)))?;

        self.demote_current_default(&txn, user_id).await?;

        let mut active: address::ActiveModel = target.into();
        active.is_default = Set(true);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        txn.commit().await?;
        Ok(updated)
    }

    #[instrument(skip(self), fields(user_id = %user_id, address_id = %address_id))]
    pub async fn delete(&self, user_id: Uuid, address_id: Uuid) -> Result<(), ServiceError> {
        let result = AddressEntity::delete_many()
            .filter(address::Column::Id.eq(address_id))
            .filter(address::Column::UserId.eq(user_id))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Address {} not found",
                address_id
            )));
        }
        Ok(())
    }

    async fn demote_current_default(
        &self,
        txn: &sea_orm::DatabaseTransaction,
        user_id: Uuid,
    ) -> Result<(), ServiceError> {
        AddressEntity::update_many()
            .col_expr(
                address::Column::IsDefault,
                sea_orm::sea_query::Expr::value(false),
            )
            .filter(address::Column::UserId.eq(user_id))
            .filter(address::Column::IsDefault.eq(true))
            .exec(txn)
            .await?;
        Ok(())
    }

    fn quote_fee(&self, request: &SaveAddressRequest) -> Option<Decimal> {
        let (lat, lng) = (request.latitude?, request.longitude?);
        match delivery::quote(&self.delivery, delivery::Coordinates::new(lat, lng)) {
            Ok(q) => Some(q.fee),
            Err(e) => {
                warn!(error = %e, "could not quote delivery fee for address");
                None
            }
        }
    }
}
