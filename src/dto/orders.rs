use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entity::sea_orm_active_enums::{OrderStatus, PaymentStatus},
    models::{Order, OrderItem, OrderNote, OrderStat},
};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ShippingInfoInput {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
}

/// Totals sent by the client are advisory; the server reprices the cart.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub reference: Option<String>,
    /// Client-chosen order number; generated when absent.
    pub order_id: Option<String>,
    pub shipping_info: Option<ShippingInfoInput>,
    pub order_note: Option<String>,
    pub subtotal: Option<i64>,
    pub shipping: Option<i64>,
    pub tax: Option<i64>,
    pub total: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutReceipt {
    pub order_id: String,
    pub id: Uuid,
    pub status: OrderStatus,
    pub total: i64,
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateDeliveryRequest {
    pub tracking_number: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddNoteRequest {
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub notes: Vec<OrderNote>,
    pub days_until_delivery: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderStats {
    pub items: Vec<OrderStat>,
}
