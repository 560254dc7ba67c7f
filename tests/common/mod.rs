#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, Set};
use storefront_api::{
    db::{create_orm_conn, run_migrations},
    dto::{
        cart::AddToCartRequest,
        orders::{CheckoutRequest, ShippingInfoInput},
    },
    entity::products::{ActiveModel as ProductActive, Model as ProductModel},
    events::BroadcastPublisher,
    middleware::auth::{AuthUser, Role},
    payment::{PaymentError, PaymentInit, PaymentSession, PaymentVerification, PaymentVerifier},
    services::{cart_service, product_service},
    state::AppState,
};
use uuid::Uuid;

pub const JWT_SECRET: &str = "test-secret";

/// Gateway double: references starting with `fail` come back as failed.
pub struct FakeVerifier;

#[async_trait]
impl PaymentVerifier for FakeVerifier {
    async fn verify(&self, reference: &str) -> Result<PaymentVerification, PaymentError> {
        let status = if reference.starts_with("fail") {
            "failed"
        } else {
            "success"
        };
        Ok(PaymentVerification {
            reference: reference.to_string(),
            transaction_id: Some(format!("txn_{reference}")),
            status: status.to_string(),
            paid_at: Some(chrono::Utc::now()),
            amount: None,
        })
    }

    async fn initialize(&self, request: PaymentInit) -> Result<PaymentSession, PaymentError> {
        let reference = request
            .reference
            .unwrap_or_else(|| format!("ref_{}", Uuid::new_v4().simple()));
        Ok(PaymentSession {
            authorization_url: format!("https://checkout.test/{reference}"),
            access_code: "access".into(),
            reference,
        })
    }
}

pub struct TestApp {
    pub state: AppState,
    pub events: Arc<BroadcastPublisher>,
}

pub async fn setup() -> anyhow::Result<TestApp> {
    setup_at("sqlite::memory:").await
}

/// Runs against `TEST_DATABASE_URL` when it is set, for tests that need a
/// pooled server database. `None` means the test should be skipped.
pub async fn setup_shared() -> anyhow::Result<Option<TestApp>> {
    match std::env::var("TEST_DATABASE_URL") {
        Ok(url) if !url.trim().is_empty() => Ok(Some(setup_at(url.trim()).await?)),
        _ => Ok(None),
    }
}

pub async fn setup_at(database_url: &str) -> anyhow::Result<TestApp> {
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

    let events = Arc::new(BroadcastPublisher::default());
    let state = AppState::new(orm, JWT_SECRET, Arc::new(FakeVerifier), events.clone());
    Ok(TestApp { state, events })
}

pub fn user() -> AuthUser {
    AuthUser {
        user_id: Uuid::new_v4(),
        role: Role::User,
    }
}

pub fn admin() -> AuthUser {
    AuthUser {
        user_id: Uuid::new_v4(),
        role: Role::Admin,
    }
}

pub fn vendor() -> AuthUser {
    AuthUser {
        user_id: Uuid::new_v4(),
        role: Role::Vendor,
    }
}

pub async fn create_product(
    state: &AppState,
    name: &str,
    price: i64,
    stock: i32,
) -> anyhow::Result<ProductModel> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        description: Set(format!("{name} for testing")),
        price: Set(price),
        stock: Set(stock),
        category: Set("testing".into()),
        vendor_id: Set(Uuid::new_v4()),
        vendor_name: Set("Test Vendor".into()),
        images: Set(serde_json::json!(["https://img.test/1.png"])),
        is_active: Set(true),
        ..Default::default()
    }
    .insert(&state.orm)
    .await?;
    Ok(product)
}

pub async fn stock_of(state: &AppState, id: Uuid) -> anyhow::Result<i32> {
    Ok(product_service::get_product_model(&state.orm, id).await?.stock)
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    quantity: i32,
) -> anyhow::Result<()> {
    cart_service::add_item(
        state,
        user,
        AddToCartRequest {
            product_id,
            quantity,
        },
    )
    .await?;
    Ok(())
}

pub fn shipping() -> ShippingInfoInput {
    ShippingInfoInput {
        full_name: Some("Ada Lovelace".into()),
        email: Some("ada@example.com".into()),
        phone: Some("+2348000000000".into()),
        address: Some("12 Analytical Way".into()),
        city: Some("Lagos".into()),
        state: Some("Lagos".into()),
        zip_code: Some("100001".into()),
    }
}

pub fn checkout_request(reference: &str) -> CheckoutRequest {
    CheckoutRequest {
        reference: Some(reference.to_string()),
        shipping_info: Some(shipping()),
        ..Default::default()
    }
}
