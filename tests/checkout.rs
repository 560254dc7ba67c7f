mod common;

use axum::http::StatusCode;
use common::{add_to_cart, checkout_request, create_product, setup, stock_of, user};
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
use storefront_api::{
    dto::payments::InitiatePaymentRequest,
    entity::{
        orders::Entity as Orders,
        products::ActiveModel as ProductActive,
        sea_orm_active_enums::{OrderStatus, PaymentStatus},
    },
    error::AppError,
    events::OrderEvent,
    services::{cart_service, checkout_service, order_service},
};

#[tokio::test]
async fn checkout_places_order_and_takes_stock() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let mut events = app.events.subscribe();
    let buyer = user();

    let product = create_product(state, "Ferris Mug", 5000, 5).await?;
    add_to_cart(state, &buyer, product.id, 2).await?;

    let receipt = checkout_service::checkout(state, &buyer, checkout_request("ref_happy"))
        .await?
        .data
        .expect("receipt");
    assert_eq!(receipt.total, 12000);
    assert_eq!(receipt.status, OrderStatus::Processing);
    assert_eq!(receipt.payment_status, PaymentStatus::Paid);
    assert!(receipt.order_id.starts_with("ORD-"));

    assert_eq!(stock_of(state, product.id).await?, 3);

    let cart = cart_service::get_cart(state, &buyer).await?.data.expect("cart");
    assert!(cart.items.is_empty());

    let detail = order_service::get_order(state, &buyer, &receipt.order_id)
        .await?
        .data
        .expect("order");
    assert_eq!(detail.order.pricing.subtotal, 10000);
    assert_eq!(detail.order.pricing.shipping, 1000);
    assert_eq!(detail.order.pricing.tax, 1000);
    assert_eq!(detail.order.pricing.total, 12000);
    assert_eq!(detail.order.payment_info.reference, "ref_happy");
    assert_eq!(detail.order.shipping_info.email, "ada@example.com");
    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.items[0].quantity, 2);
    assert_eq!(detail.items[0].price, 5000);

    match events.try_recv()? {
        OrderEvent::OrderCreated { order_id, total, .. } => {
            assert_eq!(order_id, receipt.id);
            assert_eq!(total, 12000);
        }
        other => panic!("unexpected event {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn shipping_email_is_stored_lowercase() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let buyer = user();

    let product = create_product(state, "Ferris Mug", 1200, 5).await?;
    add_to_cart(state, &buyer, product.id, 1).await?;

    let mut request = checkout_request("ref_email");
    if let Some(info) = request.shipping_info.as_mut() {
        info.email = Some(" Ada@Example.COM ".into());
    }
    let receipt = checkout_service::checkout(state, &buyer, request)
        .await?
        .data
        .expect("receipt");
    let detail = order_service::get_order(state, &buyer, &receipt.order_id)
        .await?
        .data
        .expect("order");
    assert_eq!(detail.order.shipping_info.email, "ada@example.com");
    Ok(())
}

#[tokio::test]
async fn placing_an_order_only_drops_the_ordered_lines() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let buyer = user();

    let mug = create_product(state, "Ferris Mug", 1200, 5).await?;
    let hoodie = create_product(state, "Axum Hoodie", 5500, 5).await?;
    add_to_cart(state, &buyer, mug.id, 1).await?;
    add_to_cart(state, &buyer, hoodie.id, 2).await?;

    let cart = cart_service::find_cart(&state.orm, buyer.user_id)
        .await?
        .expect("cart");
    cart_service::remove_lines(&state.orm, cart.id, &[mug.id]).await?;

    let view = cart_service::get_cart(state, &buyer).await?.data.expect("cart");
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].product_id, hoodie.id);
    assert_eq!(view.items[0].quantity, 2);

    // The order is built from the stored cart, which no longer holds the mug.
    let receipt = checkout_service::checkout(state, &buyer, checkout_request("ref_partial"))
        .await?
        .data
        .expect("receipt");
    assert_eq!(receipt.total, 11000 + 1100);
    assert_eq!(stock_of(state, mug.id).await?, 5);
    assert_eq!(stock_of(state, hoodie.id).await?, 3);

    let view = cart_service::get_cart(state, &buyer).await?.data.expect("cart");
    assert!(view.items.is_empty());
    Ok(())
}

#[tokio::test]
async fn checkout_rejects_empty_cart() -> anyhow::Result<()> {
    let app = setup().await?;
    let buyer = user();

    let err = checkout_service::checkout(&app.state, &buyer, checkout_request("ref_empty"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::EmptyCart));
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn insufficient_stock_rolls_back_every_line() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let buyer = user();

    let plenty = create_product(state, "Axum Hoodie", 2000, 5).await?;
    let scarce = create_product(state, "Crab Plush", 3000, 1).await?;
    add_to_cart(state, &buyer, plenty.id, 2).await?;
    add_to_cart(state, &buyer, scarce.id, 3).await?;

    let err = checkout_service::checkout(state, &buyer, checkout_request("ref_short"))
        .await
        .unwrap_err();
    match err {
        AppError::InsufficientStock { product, available } => {
            assert_eq!(product, "Crab Plush");
            assert_eq!(available, 1);
        }
        other => panic!("unexpected error {other:?}"),
    }

    assert_eq!(stock_of(state, plenty.id).await?, 5);
    assert_eq!(stock_of(state, scarce.id).await?, 1);
    assert_eq!(Orders::find().count(&state.orm).await?, 0);

    let cart = cart_service::get_cart(state, &buyer).await?.data.expect("cart");
    assert_eq!(cart.items.len(), 2);
    Ok(())
}

#[tokio::test]
async fn unsuccessful_payment_creates_nothing() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let buyer = user();

    let product = create_product(state, "Rust Sticker Pack", 500, 10).await?;
    add_to_cart(state, &buyer, product.id, 1).await?;

    let err = checkout_service::checkout(state, &buyer, checkout_request("fail_ref"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PaymentNotSuccessful(ref status) if status == "failed"));

    assert_eq!(stock_of(state, product.id).await?, 10);
    assert_eq!(Orders::find().count(&state.orm).await?, 0);
    Ok(())
}

#[tokio::test]
async fn reused_reference_is_a_conflict() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let buyer = user();

    let product = create_product(state, "Ferris Mug", 1200, 10).await?;
    add_to_cart(state, &buyer, product.id, 1).await?;
    checkout_service::checkout(state, &buyer, checkout_request("ref_once")).await?;

    add_to_cart(state, &buyer, product.id, 1).await?;
    let err = checkout_service::checkout(state, &buyer, checkout_request("ref_once"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DuplicatePayment(_)));
    assert_eq!(err.status(), StatusCode::CONFLICT);

    assert_eq!(stock_of(state, product.id).await?, 9);
    assert_eq!(Orders::find().count(&state.orm).await?, 1);
    Ok(())
}

#[tokio::test]
async fn deactivated_product_is_unavailable_at_checkout() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let buyer = user();

    let product = create_product(state, "E-book: Async Rust", 2500, 10).await?;
    add_to_cart(state, &buyer, product.id, 1).await?;

    let mut active: ProductActive = product.clone().into();
    active.is_active = Set(false);
    active.update(&state.orm).await?;

    let err = checkout_service::checkout(state, &buyer, checkout_request("ref_gone"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ProductUnavailable(ref name) if name == "E-book: Async Rust"));
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn checkout_requires_shipping_and_reference() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let buyer = user();

    let product = create_product(state, "Ferris Mug", 1200, 10).await?;
    add_to_cart(state, &buyer, product.id, 1).await?;

    let mut missing_city = checkout_request("ref_city");
    if let Some(info) = missing_city.shipping_info.as_mut() {
        info.city = Some("   ".into());
    }
    let err = checkout_service::checkout(state, &buyer, missing_city)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Shipping city is required");

    let mut no_reference = checkout_request("unused");
    no_reference.reference = None;
    let err = checkout_service::checkout(state, &buyer, no_reference)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidRequest(_)));

    assert_eq!(stock_of(state, product.id).await?, 10);
    Ok(())
}

#[tokio::test]
async fn free_shipping_above_threshold() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let buyer = user();

    let product = create_product(state, "Axum Hoodie", 5500, 10).await?;
    add_to_cart(state, &buyer, product.id, 2).await?;

    let receipt = checkout_service::checkout(state, &buyer, checkout_request("ref_free"))
        .await?
        .data
        .expect("receipt");
    // 11000 subtotal, no shipping, 1100 tax
    assert_eq!(receipt.total, 12100);
    Ok(())
}

#[tokio::test]
async fn initiate_payment_returns_gateway_session() -> anyhow::Result<()> {
    let app = setup().await?;
    let buyer = user();

    let session = checkout_service::initiate_payment(
        &app.state,
        &buyer,
        InitiatePaymentRequest {
            email: "ada@example.com".into(),
            amount: 120.5,
            reference: Some("ref_init".into()),
            metadata: None,
        },
    )
    .await?
    .data
    .expect("session");
    assert_eq!(session.reference, "ref_init");
    assert!(session.authorization_url.ends_with("ref_init"));

    let err = checkout_service::initiate_payment(
        &app.state,
        &buyer,
        InitiatePaymentRequest {
            email: "not-an-email".into(),
            amount: 10.0,
            reference: None,
            metadata: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidRequest(_)));
    Ok(())
}
