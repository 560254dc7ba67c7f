mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{
    TestApp, add_to_cart, admin, checkout_request, create_product, setup, setup_shared, stock_of,
    user,
};
use storefront_api::{
    domain::order::{ADMIN_CANCELLATION_REASON, DEFAULT_CANCELLATION_REASON},
    dto::orders::{
        AddNoteRequest, CancelOrderRequest, CheckoutReceipt, UpdateDeliveryRequest,
        UpdateOrderStatusRequest,
    },
    entity::sea_orm_active_enums::OrderStatus,
    error::AppError,
    middleware::auth::AuthUser,
    routes::params::OrderListQuery,
    services::{admin_service, checkout_service, order_service, product_service},
    state::AppState,
};

async fn place(
    state: &AppState,
    buyer: &AuthUser,
    product_id: uuid::Uuid,
    quantity: i32,
    reference: &str,
) -> anyhow::Result<CheckoutReceipt> {
    add_to_cart(state, buyer, product_id, quantity).await?;
    let receipt = checkout_service::checkout(state, buyer, checkout_request(reference))
        .await?
        .data
        .expect("receipt");
    Ok(receipt)
}

fn status(value: &str) -> UpdateOrderStatusRequest {
    UpdateOrderStatusRequest {
        status: value.to_string(),
    }
}

#[tokio::test]
async fn cancel_restores_stock_exactly_once() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let buyer = user();

    let product = create_product(state, "Ferris Mug", 1200, 5).await?;
    let receipt = place(state, &buyer, product.id, 2, "ref_cancel").await?;
    assert_eq!(stock_of(state, product.id).await?, 3);

    let cancelled = order_service::cancel_order(
        state,
        &buyer,
        &receipt.order_id,
        CancelOrderRequest::default(),
    )
    .await?
    .data
    .expect("order");
    assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
    assert_eq!(
        cancelled.order.cancellation_reason.as_deref(),
        Some(DEFAULT_CANCELLATION_REASON)
    );
    assert_eq!(stock_of(state, product.id).await?, 5);

    let err = order_service::cancel_order(
        state,
        &buyer,
        &receipt.order_id,
        CancelOrderRequest::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotCancellable { ref status } if status == "cancelled"));
    assert_eq!(stock_of(state, product.id).await?, 5);
    Ok(())
}

#[tokio::test]
async fn owners_only_see_and_cancel_their_orders() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let buyer = user();
    let stranger = user();

    let product = create_product(state, "Ferris Mug", 1200, 5).await?;
    let receipt = place(state, &buyer, product.id, 1, "ref_owner").await?;

    let err = order_service::get_order(state, &stranger, &receipt.order_id)
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::NOT_FOUND);

    let err = order_service::cancel_order(
        state,
        &stranger,
        &receipt.id.to_string(),
        CancelOrderRequest {
            reason: Some("not mine".into()),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(stock_of(state, product.id).await?, 4);

    let by_uuid = order_service::get_order(state, &buyer, &receipt.id.to_string())
        .await?
        .data
        .expect("order");
    assert_eq!(by_uuid.order.order_id, receipt.order_id);

    let admin_view = admin_service::get_order_admin(state, &admin(), &receipt.order_id)
        .await?
        .data
        .expect("order");
    assert_eq!(admin_view.order.user_id, buyer.user_id);
    Ok(())
}

#[tokio::test]
async fn shipped_orders_cannot_be_cancelled_by_owner() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let buyer = user();
    let staff = admin();

    let product = create_product(state, "Axum Hoodie", 5500, 5).await?;
    let receipt = place(state, &buyer, product.id, 1, "ref_shipped").await?;

    order_service::update_status(state, &staff, &receipt.order_id, status("shipped")).await?;

    let err = order_service::cancel_order(
        state,
        &buyer,
        &receipt.order_id,
        CancelOrderRequest::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotCancellable { ref status } if status == "shipped"));
    assert_eq!(stock_of(state, product.id).await?, 4);
    Ok(())
}

#[tokio::test]
async fn delivered_orders_cannot_be_cancelled_by_owner() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let buyer = user();
    let staff = admin();

    let product = create_product(state, "Ferris Mug", 1200, 5).await?;
    let receipt = place(state, &buyer, product.id, 2, "ref_delivered").await?;
    order_service::update_delivery(
        state,
        &staff,
        &receipt.order_id,
        UpdateDeliveryRequest {
            delivered_at: Some(Utc::now()),
            ..Default::default()
        },
    )
    .await?;

    let err = order_service::cancel_order(
        state,
        &buyer,
        &receipt.order_id,
        CancelOrderRequest::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotCancellable { ref status } if status == "delivered"));
    assert_eq!(stock_of(state, product.id).await?, 3);

    let detail = order_service::get_order(state, &buyer, &receipt.order_id)
        .await?
        .data
        .expect("order");
    assert_eq!(detail.order.status, OrderStatus::Delivered);
    assert!(detail.order.cancellation_reason.is_none());
    Ok(())
}

#[tokio::test]
async fn stale_status_writes_do_not_override_newer_status() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let buyer = user();
    let staff = admin();

    let product = create_product(state, "Crab Plush", 3000, 5).await?;
    let cancelled = place(state, &buyer, product.id, 1, "ref_stale_a").await?;
    let shipped = place(state, &buyer, product.id, 1, "ref_stale_b").await?;

    // Snapshots taken before the competing writes land.
    let stale_cancelled = order_service::resolve_order(&state.orm, &cancelled.order_id, None).await?;
    let stale_shipped = order_service::resolve_order(&state.orm, &shipped.order_id, None).await?;

    order_service::cancel_order(
        state,
        &buyer,
        &cancelled.order_id,
        CancelOrderRequest::default(),
    )
    .await?;
    order_service::update_status(state, &staff, &shipped.order_id, status("shipped")).await?;

    let err = order_service::set_status_if(
        &state.orm,
        &stale_cancelled,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        Vec::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidStatus(_)));
    let current = order_service::resolve_order(&state.orm, &cancelled.order_id, None).await?;
    assert_eq!(current.status, OrderStatus::Cancelled);
    assert_eq!(stock_of(state, product.id).await?, 4);

    let err = order_service::set_status_if(
        &state.orm,
        &stale_shipped,
        OrderStatus::Processing,
        OrderStatus::Delivered,
        Vec::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidStatus(ref message) if message.contains("shipped")));
    let current = order_service::resolve_order(&state.orm, &shipped.order_id, None).await?;
    assert_eq!(current.status, OrderStatus::Shipped);

    let moved = order_service::set_status_if(
        &state.orm,
        &stale_shipped,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        Vec::new(),
    )
    .await?;
    assert_eq!(moved.status, OrderStatus::Delivered);
    Ok(())
}

#[tokio::test]
async fn admin_cancel_restocks_and_is_terminal() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let buyer = user();
    let staff = admin();

    let product = create_product(state, "Crab Plush", 3000, 4).await?;
    let receipt = place(state, &buyer, product.id, 3, "ref_admin").await?;
    order_service::update_status(state, &staff, &receipt.order_id, status("shipped")).await?;

    let cancelled =
        order_service::update_status(state, &staff, &receipt.order_id, status("cancelled"))
            .await?
            .data
            .expect("order");
    assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
    assert_eq!(
        cancelled.order.cancellation_reason.as_deref(),
        Some(ADMIN_CANCELLATION_REASON)
    );
    assert_eq!(stock_of(state, product.id).await?, 4);

    let err = order_service::update_status(state, &staff, &receipt.order_id, status("processing"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStatus(_)));

    // Repeating the terminal status is not a second cancellation.
    order_service::update_status(state, &staff, &receipt.order_id, status("cancelled")).await?;
    assert_eq!(stock_of(state, product.id).await?, 4);
    Ok(())
}

#[tokio::test]
async fn status_updates_are_admin_only_and_validated() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let buyer = user();

    let product = create_product(state, "Ferris Mug", 1200, 5).await?;
    let receipt = place(state, &buyer, product.id, 1, "ref_rbac").await?;

    let err = order_service::update_status(state, &buyer, &receipt.order_id, status("shipped"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let err = order_service::update_status(state, &admin(), &receipt.order_id, status("lost"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStatus(_)));
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn delivery_updates_drive_status() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let buyer = user();
    let staff = admin();

    let product = create_product(state, "Ferris Mug", 1200, 5).await?;
    let receipt = place(state, &buyer, product.id, 1, "ref_delivery").await?;

    let shipped = order_service::update_delivery(
        state,
        &staff,
        &receipt.order_id,
        UpdateDeliveryRequest {
            tracking_number: Some(" TRK-001 ".into()),
            estimated_delivery: Some(Utc::now() + Duration::hours(50)),
            delivered_at: None,
        },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(shipped.order.status, OrderStatus::Shipped);
    assert_eq!(shipped.order.tracking_number.as_deref(), Some("TRK-001"));
    assert_eq!(shipped.days_until_delivery, Some(3));

    let delivered = order_service::update_delivery(
        state,
        &staff,
        &receipt.order_id,
        UpdateDeliveryRequest {
            delivered_at: Some(Utc::now()),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(delivered.order.status, OrderStatus::Delivered);
    assert!(delivered.order.delivered_at.is_some());
    assert_eq!(delivered.order.tracking_number.as_deref(), Some("TRK-001"));
    Ok(())
}

#[tokio::test]
async fn notes_are_attached_in_order() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let buyer = user();
    let staff = admin();

    let product = create_product(state, "Ferris Mug", 1200, 5).await?;
    let receipt = place(state, &buyer, product.id, 1, "ref_notes").await?;

    let err = order_service::add_note(
        state,
        &staff,
        &receipt.order_id,
        AddNoteRequest {
            message: "   ".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidRequest(_)));

    let detail = order_service::add_note(
        state,
        &staff,
        &receipt.order_id,
        AddNoteRequest {
            message: "Packed with care".into(),
        },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(detail.notes.len(), 1);
    assert_eq!(detail.notes[0].message, "Packed with care");
    Ok(())
}

#[tokio::test]
async fn stats_group_by_status_busiest_first() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let buyer = user();
    let other = user();
    let staff = admin();

    let product = create_product(state, "Rust Sticker Pack", 500, 50).await?;
    let first = place(state, &buyer, product.id, 1, "ref_s1").await?;
    place(state, &buyer, product.id, 2, "ref_s2").await?;
    place(state, &buyer, product.id, 3, "ref_s3").await?;
    place(state, &other, product.id, 1, "ref_s4").await?;

    order_service::cancel_order(
        state,
        &buyer,
        &first.order_id,
        CancelOrderRequest::default(),
    )
    .await?;

    let mine = order_service::user_stats(state, &buyer)
        .await?
        .data
        .expect("stats")
        .items;
    assert_eq!(mine.len(), 2);
    assert_eq!(mine[0].status, OrderStatus::Processing);
    assert_eq!(mine[0].count, 2);
    assert_eq!(mine[1].status, OrderStatus::Cancelled);
    assert_eq!(mine[1].count, 1);
    // 500 + 1000 + 1500 subtotal, plus 1000 shipping each, plus 10% tax
    assert_eq!(mine[0].total_revenue, (1000 + 1000 + 100) + (1500 + 1000 + 150));

    let err = order_service::admin_stats(state, &buyer).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let all = order_service::admin_stats(state, &staff)
        .await?
        .data
        .expect("stats")
        .items;
    assert_eq!(all[0].status, OrderStatus::Processing);
    assert_eq!(all[0].count, 3);
    assert_eq!(all[0].total_revenue, mine[0].total_revenue + (500 + 1000 + 50));
    assert_eq!(all[1].status, OrderStatus::Cancelled);
    assert_eq!(all[1].total_revenue, 500 + 1000 + 50);
    Ok(())
}

#[tokio::test]
async fn listings_filter_by_owner_and_status() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let buyer = user();
    let other = user();
    let staff = admin();

    let product = create_product(state, "Ferris Mug", 1200, 20).await?;
    place(state, &buyer, product.id, 1, "ref_l1").await?;
    let shipped = place(state, &buyer, product.id, 1, "ref_l2").await?;
    place(state, &other, product.id, 1, "ref_l3").await?;
    order_service::update_status(state, &staff, &shipped.order_id, status("shipped")).await?;

    let mine = order_service::list_orders(state, &buyer, OrderListQuery::default())
        .await?
        .data
        .expect("orders")
        .items;
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|order| order.user_id == buyer.user_id));

    let query = OrderListQuery {
        status: Some("shipped".into()),
        ..Default::default()
    };
    let all_shipped = admin_service::list_all_orders(state, &staff, query)
        .await?
        .data
        .expect("orders")
        .items;
    assert_eq!(all_shipped.len(), 1);
    assert_eq!(all_shipped[0].order_id, shipped.order_id);

    let err = admin_service::list_all_orders(state, &buyer, OrderListQuery::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    Ok(())
}

async fn race_decrements(app: TestApp) -> anyhow::Result<()> {
    let state = Arc::new(app.state);
    let product_id = create_product(&state, "Crab Plush", 3000, 10).await?.id;

    let mut handles = Vec::new();
    for _ in 0..15 {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            product_service::decrease_stock(&state.orm, product_id, 1).await
        }));
    }

    let mut sold = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => sold += 1,
            Err(AppError::InsufficientStock { .. }) => {}
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }
    assert_eq!(sold, 10);
    assert_eq!(stock_of(&state, product_id).await?, 0);
    Ok(())
}

#[tokio::test]
async fn concurrent_decrements_never_oversell() -> anyhow::Result<()> {
    race_decrements(setup().await?).await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_decrements_never_oversell_on_pooled_database() -> anyhow::Result<()> {
    let Some(app) = setup_shared().await? else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return Ok(());
    };
    race_decrements(app).await
}
