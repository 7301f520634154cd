//! Status state machine integration tests, including the customer
//! return sub-flow and the asymmetric permission rules.

mod common;

use std::sync::Arc;

use sea_orm::EntityTrait;
use uuid::Uuid;

use storefront_api::auth::AuthenticatedUser;
use storefront_api::entities::Order;
use storefront_api::errors::ServiceError;
use storefront_api::events;
use storefront_api::services::OrderStatus;

#[tokio::test]
async fn admin_walks_the_forward_chain() {
    let db = common::setup_db().await;
    let service = common::status_service(db.clone(), None);
    let admin = AuthenticatedUser::admin(Uuid::new_v4());

    let user_id = Uuid::new_v4();
    let address = common::seed_address(&db, user_id).await;
    let order = common::seed_order(&db, user_id, address.id, "pending").await;

    for status in [
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
    ] {
        let updated = service.update_status(order.id, status, admin).await.unwrap();
        assert_eq!(updated.status, status.to_string());
    }
}

#[tokio::test]
async fn forward_chain_cannot_skip_states() {
    let db = common::setup_db().await;
    let service = common::status_service(db.clone(), None);
    let admin = AuthenticatedUser::admin(Uuid::new_v4());

    let user_id = Uuid::new_v4();
    let address = common::seed_address(&db, user_id).await;
    let order = common::seed_order(&db, user_id, address.id, "pending").await;

    let err = service
        .update_status(order.id, OrderStatus::Delivered, admin)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::IneligibleTransition(_)));

    // The rejected transition must leave the row untouched.
    let stored = Order::find_by_id(order.id).one(&*db).await.unwrap().unwrap();
    assert_eq!(stored.status, "pending");
}

#[tokio::test]
async fn customers_cannot_drive_the_forward_chain() {
    let db = common::setup_db().await;
    let service = common::status_service(db.clone(), None);

    let user_id = Uuid::new_v4();
    let address = common::seed_address(&db, user_id).await;
    let order = common::seed_order(&db, user_id, address.id, "pending").await;

    // Even on their own order.
    let owner = AuthenticatedUser::customer(user_id);
    let err = service
        .update_status(order.id, OrderStatus::Confirmed, owner)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn customer_initiates_a_return_only_from_delivered() {
    let db = common::setup_db().await;
    let service = common::status_service(db.clone(), None);

    let user_id = Uuid::new_v4();
    let owner = AuthenticatedUser::customer(user_id);
    let address = common::seed_address(&db, user_id).await;

    let delivered = common::seed_order(&db, user_id, address.id, "delivered").await;
    let updated = service
        .update_status(delivered.id, OrderStatus::ReturnInitiated, owner)
        .await
        .unwrap();
    assert_eq!(updated.status, "return_initiated");

    let in_flight = common::seed_order(&db, user_id, address.id, "out_for_delivery").await;
    let err = service
        .update_status(in_flight.id, OrderStatus::ReturnInitiated, owner)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::IneligibleTransition(_)));
}

#[tokio::test]
async fn repeating_a_return_action_is_rejected() {
    let db = common::setup_db().await;
    let (sender, mut rx) = events::channel(8);
    let service = common::status_service(db.clone(), Some(Arc::new(sender)));

    let user_id = Uuid::new_v4();
    let owner = AuthenticatedUser::customer(user_id);
    let address = common::seed_address(&db, user_id).await;

    // Already in return_initiated: asking again must not "succeed",
    // update the row, or emit a second return event.
    let open_return = common::seed_order(&db, user_id, address.id, "return_initiated").await;
    let err = service
        .update_status(open_return.id, OrderStatus::ReturnInitiated, owner)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::IneligibleTransition(_)));
    assert!(rx.try_recv().is_err());

    let cancelled_return =
        common::seed_order(&db, user_id, address.id, "return_cancelled").await;
    let err = service
        .update_status(cancelled_return.id, OrderStatus::ReturnCancelled, owner)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::IneligibleTransition(_)));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn return_cancel_requires_an_open_return() {
    let db = common::setup_db().await;
    let service = common::status_service(db.clone(), None);

    let user_id = Uuid::new_v4();
    let owner = AuthenticatedUser::customer(user_id);
    let address = common::seed_address(&db, user_id).await;

    let open_return = common::seed_order(&db, user_id, address.id, "return_initiated").await;
    let updated = service
        .update_status(open_return.id, OrderStatus::ReturnCancelled, owner)
        .await
        .unwrap();
    assert_eq!(updated.status, "return_cancelled");

    // No open return, nothing to cancel, admin or not.
    let delivered = common::seed_order(&db, user_id, address.id, "delivered").await;
    let err = service
        .update_status(delivered.id, OrderStatus::ReturnCancelled, owner)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::IneligibleTransition(_)));

    let admin = AuthenticatedUser::admin(Uuid::new_v4());
    let err = service
        .update_status(delivered.id, OrderStatus::ReturnCancelled, admin)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::IneligibleTransition(_)));
}

#[tokio::test]
async fn return_completion_is_admin_only() {
    let db = common::setup_db().await;
    let service = common::status_service(db.clone(), None);

    let user_id = Uuid::new_v4();
    let address = common::seed_address(&db, user_id).await;
    let order = common::seed_order(&db, user_id, address.id, "return_initiated").await;

    let owner = AuthenticatedUser::customer(user_id);
    let err = service
        .update_status(order.id, OrderStatus::ReturnCompleted, owner)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let admin = AuthenticatedUser::admin(Uuid::new_v4());
    let updated = service
        .update_status(order.id, OrderStatus::ReturnCompleted, admin)
        .await
        .unwrap();
    assert_eq!(updated.status, "return_completed");
}

#[tokio::test]
async fn customers_cannot_touch_foreign_orders() {
    let db = common::setup_db().await;
    let service = common::status_service(db.clone(), None);

    let owner_id = Uuid::new_v4();
    let address = common::seed_address(&db, owner_id).await;
    let order = common::seed_order(&db, owner_id, address.id, "delivered").await;

    let stranger = AuthenticatedUser::customer(Uuid::new_v4());
    let err = service
        .update_status(order.id, OrderStatus::ReturnInitiated, stranger)
        .await
        .unwrap_err();
    // Reads as missing rather than confirming the order exists.
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn cancel_is_blocked_after_delivery() {
    let db = common::setup_db().await;
    let service = common::status_service(db.clone(), None);

    let user_id = Uuid::new_v4();
    let owner = AuthenticatedUser::customer(user_id);
    let address = common::seed_address(&db, user_id).await;

    let pending = common::seed_order(&db, user_id, address.id, "pending").await;
    let updated = service.cancel_order(pending.id, owner).await.unwrap();
    assert_eq!(updated.status, "cancelled");

    let delivered = common::seed_order(&db, user_id, address.id, "delivered").await;
    let err = service.cancel_order(delivered.id, owner).await.unwrap_err();
    assert!(matches!(err, ServiceError::IneligibleTransition(_)));

    let cancelled = common::seed_order(&db, user_id, address.id, "cancelled").await;
    let err = service.cancel_order(cancelled.id, owner).await.unwrap_err();
    assert!(matches!(err, ServiceError::IneligibleTransition(_)));
}

#[tokio::test]
async fn return_transitions_carry_user_and_address_context() {
    let db = common::setup_db().await;
    let (sender, mut rx) = events::channel(8);
    let service = common::status_service(db.clone(), Some(Arc::new(sender)));

    let user_id = Uuid::new_v4();
    let owner = AuthenticatedUser::customer(user_id);
    let address = common::seed_address(&db, user_id).await;
    let order = common::seed_order(&db, user_id, address.id, "delivered").await;

    service
        .update_status(order.id, OrderStatus::ReturnInitiated, owner)
        .await
        .unwrap();

    match rx.recv().await.unwrap() {
        events::Event::OrderStatusChanged {
            old_status,
            new_status,
            return_context,
            ..
        } => {
            assert_eq!(old_status, "delivered");
            assert_eq!(new_status, "return_initiated");
            let ctx = return_context.expect("return context");
            assert_eq!(ctx.user_id, user_id);
            assert_eq!(ctx.address.expect("address").id, address.id);
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn plain_transitions_have_no_return_context() {
    let db = common::setup_db().await;
    let (sender, mut rx) = events::channel(8);
    let service = common::status_service(db.clone(), Some(Arc::new(sender)));
    let admin = AuthenticatedUser::admin(Uuid::new_v4());

    let user_id = Uuid::new_v4();
    let address = common::seed_address(&db, user_id).await;
    let order = common::seed_order(&db, user_id, address.id, "pending").await;

    service
        .update_status(order.id, OrderStatus::Confirmed, admin)
        .await
        .unwrap();

    match rx.recv().await.unwrap() {
        events::Event::OrderStatusChanged { return_context, .. } => {
            assert!(return_context.is_none());
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn transition_succeeds_when_the_event_channel_is_gone() {
    let db = common::setup_db().await;
    let (sender, rx) = events::channel(1);
    // Dropping the receiver makes every send fail; the transition must
    // still commit.
    drop(rx);
    let service = common::status_service(db.clone(), Some(Arc::new(sender)));
    let admin = AuthenticatedUser::admin(Uuid::new_v4());

    let user_id = Uuid::new_v4();
    let address = common::seed_address(&db, user_id).await;
    let order = common::seed_order(&db, user_id, address.id, "pending").await;

    let updated = service
        .update_status(order.id, OrderStatus::Confirmed, admin)
        .await
        .unwrap();
    assert_eq!(updated.status, "confirmed");

    let stored = Order::find_by_id(order.id).one(&*db).await.unwrap().unwrap();
    assert_eq!(stored.status, "confirmed");
}
