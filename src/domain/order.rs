use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    entity::sea_orm_active_enums::{OrderStatus, PaymentStatus},
    error::{AppError, AppResult},
};

pub const DEFAULT_CANCELLATION_REASON: &str = "User requested cancellation";
pub const ADMIN_CANCELLATION_REASON: &str = "Cancelled by admin";
pub const MAX_ORDER_NOTE_LEN: usize = 500;
pub const MAX_ORDER_NUMBER_LEN: usize = 64;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// `ORD-<unix millis>-<4 random digits>`.
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().as_u128() % 10_000;
    format!("ORD-{}-{:04}", now.timestamp_millis(), suffix)
}

/// Only paid orders that have not shipped yet can be cancelled by their owner.
pub fn can_be_cancelled(status: OrderStatus, payment_status: PaymentStatus) -> bool {
    status == OrderStatus::Processing && payment_status == PaymentStatus::Paid
}

/// Whole days until the estimated delivery, rounded up and never negative.
pub fn days_until_delivery(
    estimated_delivery: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<i64> {
    let remaining = (estimated_delivery? - now).num_milliseconds();
    if remaining <= 0 {
        return Some(0);
    }
    Some((remaining + DAY_MS - 1) / DAY_MS)
}

/// Cancelled is terminal; every other move is an admin's call.
pub fn check_transition(from: OrderStatus, to: OrderStatus) -> AppResult<()> {
    if from == OrderStatus::Cancelled && to != OrderStatus::Cancelled {
        return Err(AppError::InvalidStatus(format!(
            "Order is cancelled and cannot move to {to}"
        )));
    }
    Ok(())
}

/// Status implied by a delivery update.
pub fn delivery_status(delivered_at: Option<DateTime<Utc>>) -> OrderStatus {
    if delivered_at.is_some() {
        OrderStatus::Delivered
    } else {
        OrderStatus::Shipped
    }
}

/// Shipping details after trimming and presence checks. The email is
/// stored lower-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShippingDetails {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

impl ShippingDetails {
    /// Fields are given as `(name, value)` in declaration order; the first
    /// missing one is reported.
    pub fn parse(fields: [(&str, Option<&str>); 7]) -> AppResult<Self> {
        let mut values = Vec::with_capacity(fields.len());
        for (name, value) in fields {
            let value = value.map(str::trim).unwrap_or_default();
            if value.is_empty() {
                return Err(AppError::InvalidRequest(format!(
                    "Shipping {name} is required"
                )));
            }
            values.push(value.to_string());
        }
        if !values[1].contains('@') {
            return Err(AppError::invalid("Shipping email is invalid"));
        }
        values[1] = values[1].to_lowercase();

        let mut values = values.into_iter();
        let mut next = || values.next().unwrap_or_default();
        Ok(Self {
            full_name: next(),
            email: next(),
            phone: next(),
            address: next(),
            city: next(),
            state: next(),
            zip_code: next(),
        })
    }
}

/// Payment references go into gateway URLs verbatim.
pub fn validate_payment_reference(reference: Option<&str>) -> AppResult<String> {
    let reference = reference.map(str::trim).unwrap_or_default();
    if reference.is_empty() {
        return Err(AppError::invalid("Payment reference is required"));
    }
    let valid = reference.len() <= 100
        && reference
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '='));
    if !valid {
        return Err(AppError::invalid("Payment reference is malformed"));
    }
    Ok(reference.to_string())
}
