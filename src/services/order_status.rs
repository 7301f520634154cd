//! Order status state machine: transition validation, authorization,
//! and the fan-out side effect on every successful transition.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, EntityTrait, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    db::DbPool,
    entities::{
        address::Entity as AddressEntity,
        order::{ActiveModel as OrderActiveModel, Entity as OrderEntity, Model as OrderModel},
    },
    errors::ServiceError,
    events::{Event, EventSender, ReturnContext},
};

/// Order status enumeration. The serialized snake_case strings are the
/// persisted wire values and must not change.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    OutForDelivery,
    Delivered,
    Cancelled,
    ReturnInitiated,
    ReturnCompleted,
    ReturnCancelled,
}

impl OrderStatus {
    /// Parses a wire value, mapping failures to the caller-visible
    /// `InvalidStatus` error.
    pub fn parse(value: &str) -> Result<Self, ServiceError> {
        Self::from_str(value).map_err(|_| ServiceError::InvalidStatus(value.to_string()))
    }

    pub fn is_return_class(&self) -> bool {
        matches!(
            self,
            OrderStatus::ReturnInitiated
                | OrderStatus::ReturnCompleted
                | OrderStatus::ReturnCancelled
        )
    }

    /// Transitions a customer may request on their own order. Everything
    /// else is admin-gated.
    fn customer_may_request(&self) -> bool {
        matches!(
            self,
            OrderStatus::ReturnInitiated | OrderStatus::ReturnCancelled
        )
    }
}

/// Controller for the order status state machine.
#[derive(Clone)]
pub struct OrderStatusService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderStatusService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// Applies a status transition.
    ///
    /// Authorization comes before the transition table: a caller without
    /// rights is rejected without revealing whether the transition would
    /// have been valid. The two customer return actions bypass the admin
    /// gate but still enforce their exact-current-state preconditions.
    #[instrument(skip(self, actor), fields(order_id = %order_id, new_status = %new_status, actor_id = %actor.user_id))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
        actor: AuthenticatedUser,
    ) -> Result<OrderModel, ServiceError> {
        if !new_status.customer_may_request() && !actor.is_admin() {
            return Err(ServiceError::Forbidden("Admin access required".into()));
        }

        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "failed to begin status transition transaction");
            ServiceError::DatabaseError(e)
        })?;

        let current = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        // Customers may only touch their own orders; a foreign order id
        // reads as missing rather than confirming its existence.
        if !actor.is_admin() && current.user_id != actor.user_id {
            return Err(ServiceError::NotFound(format!(
                "Order {} not found",
                order_id
            )));
        }

        let old_status = OrderStatus::parse(&current.status)?;
        Self::check_transition(old_status, new_status)?;

        let mut active: OrderActiveModel = current.into();
        active.status = Set(new_status.to_string());
        active.updated_at = Set(Utc::now());

        let updated = active.update(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "failed to persist status transition");
            ServiceError::DatabaseError(e)
        })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "failed to commit status transition");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            order_id = %order_id,
            old_status = %old_status,
            new_status = %new_status,
            "order status updated"
        );

        // Stock adjustment on cancellation/return is deliberately not
        // performed in this version; increment_stock stays unused.

        self.emit_status_event(&updated, old_status, new_status).await;

        Ok(updated)
    }

    /// Cancels an order on behalf of its owner (or an admin). Allowed
    /// whenever the order is neither delivered nor already cancelled.
    #[instrument(skip(self, actor), fields(order_id = %order_id, actor_id = %actor.user_id))]
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        actor: AuthenticatedUser,
    ) -> Result<OrderModel, ServiceError> {
        let txn = self.db.begin().await?;

        let current = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if !actor.is_admin() && current.user_id != actor.user_id {
            return Err(ServiceError::NotFound(format!(
                "Order {} not found",
                order_id
            )));
        }

        let old_status = OrderStatus::parse(&current.status)?;
        if matches!(old_status, OrderStatus::Delivered | OrderStatus::Cancelled) {
            return Err(ServiceError::IneligibleTransition(format!(
                "cannot cancel an order in status '{}'",
                old_status
            )));
        }

        let mut active: OrderActiveModel = current.into();
        active.status = Set(OrderStatus::Cancelled.to_string());
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        info!(order_id = %order_id, old_status = %old_status, "order cancelled");

        self.emit_status_event(&updated, old_status, OrderStatus::Cancelled)
            .await;

        Ok(updated)
    }

    /// The transition table. Forward progression is a strict chain;
    /// cancellation is reachable from every pre-delivery state; the
    /// return sub-flow hangs off `delivered`. `return_completed` is
    /// only reachable from `return_initiated` even for admins.
    fn check_transition(from: OrderStatus, to: OrderStatus) -> Result<(), ServiceError> {
        use OrderStatus::*;

        let allowed = match (from, to) {
            (Pending, Confirmed) => true,
            (Confirmed, Processing) => true,
            (Processing, OutForDelivery) => true,
            (OutForDelivery, Delivered) => true,

            (Pending | Confirmed | Processing | OutForDelivery, Cancelled) => true,

            (Delivered, ReturnInitiated) => true,
            (ReturnInitiated, ReturnCompleted) => true,
            (ReturnInitiated, ReturnCancelled) => true,

            // Includes from == to: re-asserting a status would persist
            // an update and re-emit the event to every observer.
            _ => false,
        };

        if allowed {
            Ok(())
        } else {
            Err(ServiceError::IneligibleTransition(format!(
                "cannot transition from '{}' to '{}'",
                from, to
            )))
        }
    }

    /// Emits the post-transition event. Return-class transitions carry
    /// the owning user and the delivery address so downstream observers
    /// can arrange the pickup. Failures are logged and swallowed.
    async fn emit_status_event(
        &self,
        updated: &OrderModel,
        old_status: OrderStatus,
        new_status: OrderStatus,
    ) {
        let Some(event_sender) = &self.event_sender else {
            return;
        };

        let return_context = if new_status.is_return_class() {
            let address = AddressEntity::find_by_id(updated.address_id)
                .one(&*self.db)
                .await
                .unwrap_or_else(|e| {
                    warn!(error = %e, order_id = %updated.id, "failed to load address for return event");
                    None
                });
            Some(ReturnContext {
                user_id: updated.user_id,
                address,
            })
        } else {
            None
        };

        let event = Event::OrderStatusChanged {
            order: updated.clone(),
            old_status: old_status.to_string(),
            new_status: new_status.to_string(),
            return_context,
        };

        if let Err(e) = event_sender.send(event).await {
            warn!(error = %e, order_id = %updated.id, "failed to enqueue status change event");
        }
    }
}
