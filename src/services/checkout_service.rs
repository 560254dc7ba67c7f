use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, Set, SqlErr, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    domain::{
        cart::Cart,
        order::{
            MAX_ORDER_NOTE_LEN, MAX_ORDER_NUMBER_LEN, ShippingDetails, generate_order_number,
            validate_payment_reference,
        },
        pricing::Pricing,
    },
    dto::{
        orders::{CheckoutReceipt, CheckoutRequest, ShippingInfoInput},
        payments::{InitiatePaymentRequest, PaymentSessionView},
    },
    entity::{
        order_items,
        orders::{self, Entity as Orders, Model as OrderModel},
        products::Entity as Products,
        sea_orm_active_enums::{OrderStatus, PaymentMethod, PaymentStatus},
    },
    error::{AppError, AppResult},
    events::{self, OrderEvent},
    middleware::auth::AuthUser,
    payment::{PaymentInit, PaymentVerification},
    response::{ApiResponse, Meta},
    services::{cart_service, product_service},
    state::AppState,
};

/// Checkout input after validation.
#[derive(Debug)]
struct CheckoutInput {
    reference: String,
    order_number: Option<String>,
    shipping: ShippingDetails,
    order_note: String,
    client_totals: ClientTotals,
}

#[derive(Debug, Default)]
struct ClientTotals {
    subtotal: Option<i64>,
    shipping: Option<i64>,
    tax: Option<i64>,
    total: Option<i64>,
}

#[derive(Debug)]
struct ReservedLine {
    product_id: Uuid,
    name: String,
    price: i64,
    quantity: i32,
    image: Option<String>,
    remaining: i32,
}

fn parse_shipping(input: Option<ShippingInfoInput>) -> AppResult<ShippingDetails> {
    let input = input.ok_or_else(|| AppError::invalid("Shipping information is required"))?;
    ShippingDetails::parse([
        ("full name", input.full_name.as_deref()),
        ("email", input.email.as_deref()),
        ("phone", input.phone.as_deref()),
        ("address", input.address.as_deref()),
        ("city", input.city.as_deref()),
        ("state", input.state.as_deref()),
        ("zip code", input.zip_code.as_deref()),
    ])
}

fn validate(payload: CheckoutRequest) -> AppResult<CheckoutInput> {
    let reference = validate_payment_reference(payload.reference.as_deref())?;
    let shipping = parse_shipping(payload.shipping_info)?;

    let order_note = payload.order_note.unwrap_or_default().trim().to_string();
    if order_note.chars().count() > MAX_ORDER_NOTE_LEN {
        return Err(AppError::InvalidRequest(format!(
            "Order note must be at most {MAX_ORDER_NOTE_LEN} characters"
        )));
    }

    let order_number = payload
        .order_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());
    if order_number
        .as_ref()
        .is_some_and(|id| id.len() > MAX_ORDER_NUMBER_LEN)
    {
        return Err(AppError::invalid("Order id is too long"));
    }

    Ok(CheckoutInput {
        reference,
        order_number,
        shipping,
        order_note,
        client_totals: ClientTotals {
            subtotal: payload.subtotal,
            shipping: payload.shipping,
            tax: payload.tax,
            total: payload.total,
        },
    })
}

fn warn_on_client_totals(client: &ClientTotals, pricing: &Pricing) {
    let pairs = [
        ("subtotal", client.subtotal, pricing.subtotal),
        ("shipping", client.shipping, pricing.shipping),
        ("tax", client.tax, pricing.tax),
        ("total", client.total, pricing.total),
    ];
    for (field, sent, computed) in pairs {
        if let Some(sent) = sent.filter(|sent| *sent != computed) {
            tracing::warn!(field, sent, computed, "client totals differ from server pricing");
        }
    }
}

async fn ensure_reference_unused(state: &AppState, reference: &str) -> AppResult<()> {
    let used = Orders::find()
        .filter(orders::Column::PaymentReference.eq(reference))
        .count(&state.orm)
        .await?;
    if used > 0 {
        return Err(AppError::DuplicatePayment(reference.to_string()));
    }
    Ok(())
}

async fn verify_payment(state: &AppState, reference: &str) -> AppResult<PaymentVerification> {
    let verification = state.payments.verify(reference).await.map_err(|err| {
        tracing::warn!(%reference, error = %err, "payment verification failed");
        AppError::from(err)
    })?;

    if !verification.is_successful() {
        tracing::warn!(%reference, status = %verification.status, "payment not successful");
        return Err(AppError::PaymentNotSuccessful(verification.status));
    }
    Ok(verification)
}

/// Re-reads every product and takes its stock. Any failure leaves the
/// transaction to be rolled back, undoing earlier decrements.
async fn reserve_stock(txn: &DatabaseTransaction, cart: &Cart) -> AppResult<Vec<ReservedLine>> {
    let mut reserved = Vec::with_capacity(cart.lines().len());
    for line in cart.lines() {
        let product = Products::find_by_id(line.product_id)
            .one(txn)
            .await?
            .filter(|product| product.is_active)
            .ok_or_else(|| AppError::ProductUnavailable(line.name.clone()))?;

        if !product_service::is_in_stock(&product, line.quantity) {
            return Err(AppError::InsufficientStock {
                product: product.name,
                available: product.stock,
            });
        }

        let updated = product_service::decrease_stock(txn, product.id, line.quantity).await?;
        reserved.push(ReservedLine {
            product_id: product.id,
            image: product.primary_image(),
            name: product.name,
            price: product.price,
            quantity: line.quantity,
            remaining: updated.stock,
        });
    }
    Ok(reserved)
}

fn map_insert_error(err: DbErr, reference: &str) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) if detail.contains("payment_reference") => {
            AppError::DuplicatePayment(reference.to_string())
        }
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::invalid("An order with this id already exists")
        }
        _ => AppError::Persistence(err),
    }
}

/// Builds the order from the cart as it stands inside `txn`, not from the
/// copy read before payment verification.
async fn place_order(
    txn: &DatabaseTransaction,
    user: &AuthUser,
    input: &CheckoutInput,
    payment: &PaymentVerification,
) -> AppResult<(OrderModel, Vec<ReservedLine>)> {
    let cart = cart_service::lock_cart(txn, user.user_id)
        .await?
        .filter(|cart| !cart.is_empty())
        .ok_or(AppError::EmptyCart)?;
    let reserved = reserve_stock(txn, &cart).await?;

    let pricing = Pricing::for_lines(reserved.iter().map(|line| (line.price, line.quantity)))?;
    warn_on_client_totals(&input.client_totals, &pricing);

    let now = Utc::now();
    let shipping = &input.shipping;
    let order = orders::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_number: Set(input
            .order_number
            .clone()
            .unwrap_or_else(|| generate_order_number(now))),
        user_id: Set(user.user_id),
        ship_full_name: Set(shipping.full_name.clone()),
        ship_email: Set(shipping.email.clone()),
        ship_phone: Set(shipping.phone.clone()),
        ship_address: Set(shipping.address.clone()),
        ship_city: Set(shipping.city.clone()),
        ship_state: Set(shipping.state.clone()),
        ship_zip_code: Set(shipping.zip_code.clone()),
        order_note: Set(input.order_note.clone()),
        subtotal: Set(pricing.subtotal),
        shipping: Set(pricing.shipping),
        tax: Set(pricing.tax),
        total: Set(pricing.total),
        payment_method: Set(PaymentMethod::Paystack),
        payment_reference: Set(input.reference.clone()),
        transaction_id: Set(payment.transaction_id.clone()),
        payment_status: Set(PaymentStatus::Paid),
        paid_at: Set(Some(payment.paid_at.unwrap_or(now).into())),
        status: Set(OrderStatus::Processing),
        tracking_number: Set(None),
        estimated_delivery: Set(None),
        delivered_at: Set(None),
        cancellation_reason: Set(None),
        ..Default::default()
    }
    .insert(txn)
    .await
    .map_err(|err| map_insert_error(err, &input.reference))?;

    let items = reserved
        .iter()
        .enumerate()
        .map(|(position, line)| order_items::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            name: Set(line.name.clone()),
            price: Set(line.price),
            quantity: Set(line.quantity),
            image: Set(line.image.clone()),
            position: Set(position as i32),
        });
    order_items::Entity::insert_many(items)
        .exec_without_returning(txn)
        .await?;

    let ordered: Vec<Uuid> = reserved.iter().map(|line| line.product_id).collect();
    cart_service::remove_lines(txn, cart.id, &ordered).await?;

    Ok((order, reserved))
}

/// Turns the caller's cart into a paid order once the gateway confirms the
/// payment reference.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<CheckoutReceipt>> {
    let input = validate(payload)?;

    let has_lines = cart_service::find_cart(&state.orm, user.user_id)
        .await?
        .is_some_and(|cart| !cart.is_empty());
    if !has_lines {
        return Err(AppError::EmptyCart);
    }

    ensure_reference_unused(state, &input.reference).await?;
    let payment = verify_payment(state, &input.reference).await?;

    let txn = state.orm.begin().await?;
    let (order, reserved) = match place_order(&txn, user, &input, &payment).await {
        Ok(placed) => placed,
        Err(err) => {
            if let Err(rollback_err) = txn.rollback().await {
                tracing::error!(error = %rollback_err, "checkout rollback failed");
            }
            tracing::info!(user_id = %user.user_id, kind = err.kind(), "checkout aborted");
            return Err(err);
        }
    };
    txn.commit().await?;

    tracing::info!(
        order_id = %order.id,
        order_number = %order.order_number,
        total = order.total,
        "order placed"
    );

    audit::record(
        &state.orm,
        Some(user.user_id),
        "checkout",
        Some("orders"),
        Some(serde_json::json!({
            "order_id": order.id,
            "reference": order.payment_reference,
        })),
    )
    .await;

    state.events.publish(OrderEvent::OrderCreated {
        order_id: order.id,
        order_number: order.order_number.clone(),
        user_id: order.user_id,
        total: order.total,
    });
    for line in &reserved {
        if let Some(event) = events::stock_low(line.product_id, &line.name, line.remaining) {
            state.events.publish(event);
        }
    }

    Ok(ApiResponse::success(
        "Order created successfully",
        CheckoutReceipt {
            order_id: order.order_number,
            id: order.id,
            status: order.status,
            total: order.total,
            payment_status: order.payment_status,
        },
        Some(Meta::empty()),
    ))
}

fn to_minor_units(amount: f64) -> AppResult<i64> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(AppError::invalid("Amount must be greater than 0"));
    }
    let minor = (amount * 100.0).round();
    if minor > i64::MAX as f64 {
        return Err(AppError::invalid("Amount is too large"));
    }
    Ok(minor as i64)
}

/// Starts a hosted payment with the gateway; the client later completes
/// checkout with the returned reference.
pub async fn initiate_payment(
    state: &AppState,
    user: &AuthUser,
    payload: InitiatePaymentRequest,
) -> AppResult<ApiResponse<PaymentSessionView>> {
    let email = payload.email.trim().to_string();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::invalid("A valid email is required"));
    }
    let amount = to_minor_units(payload.amount)?;
    let reference = match payload.reference.as_deref() {
        Some(reference) => Some(validate_payment_reference(Some(reference))?),
        None => None,
    };

    let mut metadata = payload.metadata.unwrap_or_else(|| serde_json::json!({}));
    if let Some(map) = metadata.as_object_mut() {
        map.insert("user_id".into(), serde_json::json!(user.user_id));
    }

    let session = state
        .payments
        .initialize(PaymentInit {
            email,
            amount,
            reference,
            metadata: Some(metadata),
        })
        .await?;

    tracing::info!(user_id = %user.user_id, reference = %session.reference, "payment initiated");

    Ok(ApiResponse::success(
        "Payment initialized",
        PaymentSessionView {
            authorization_url: session.authorization_url,
            access_code: session.access_code,
            reference: session.reference,
        },
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shipping() -> ShippingInfoInput {
        ShippingInfoInput {
            full_name: Some("Ada Lovelace".into()),
            email: Some("ada@example.com".into()),
            phone: Some("555-0100".into()),
            address: Some("12 Analytical Way".into()),
            city: Some("London".into()),
            state: Some("LDN".into()),
            zip_code: Some("N1".into()),
        }
    }

    #[test]
    fn missing_reference_is_rejected_first() {
        let err = validate(CheckoutRequest::default()).unwrap_err();
        assert_eq!(err.to_string(), "Payment reference is required");
    }

    #[test]
    fn missing_shipping_is_rejected() {
        let err = validate(CheckoutRequest {
            reference: Some("ref_1".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[test]
    fn long_note_is_rejected() {
        let err = validate(CheckoutRequest {
            reference: Some("ref_1".into()),
            shipping_info: Some(shipping()),
            order_note: Some("n".repeat(MAX_ORDER_NOTE_LEN + 1)),
            ..Default::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("Order note"));
    }

    #[test]
    fn blank_order_id_falls_back_to_generated() {
        let input = validate(CheckoutRequest {
            reference: Some("ref_1".into()),
            order_id: Some("   ".into()),
            shipping_info: Some(shipping()),
            ..Default::default()
        })
        .unwrap();
        assert!(input.order_number.is_none());
        assert_eq!(input.shipping.city, "London");
    }

    #[test]
    fn amounts_convert_to_minor_units() {
        assert_eq!(to_minor_units(120.5).unwrap(), 12050);
        assert_eq!(to_minor_units(19.999).unwrap(), 2000);
        assert!(to_minor_units(0.0).is_err());
        assert!(to_minor_units(f64::NAN).is_err());
    }
}
