use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    domain::{self, pricing::Pricing},
    entity::{
        order_items, order_notes, orders, products,
        sea_orm_active_enums::{OrderStatus, PaymentMethod, PaymentStatus},
    },
    error::{AppError, AppResult},
};

/// Money fields are integers in minor currency units.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub stock: i32,
    pub category: String,
    pub vendor_id: Uuid,
    pub vendor_name: String,
    pub images: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<products::Model> for Product {
    fn from(model: products::Model) -> Self {
        let images = model.image_urls();
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            price: model.price,
            stock: model.stock,
            category: model.category,
            vendor_id: model.vendor_id,
            vendor_name: model.vendor_name,
            images,
            is_active: model.is_active,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub product_id: Uuid,
    pub name: String,
    pub price: i64,
    pub image: Option<String>,
    pub quantity: i32,
    pub line_total: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct CartSummary {
    pub subtotal: i64,
    pub shipping: i64,
    pub tax: i64,
    pub total: i64,
    pub item_count: i64,
}

impl From<domain::cart::CartSummary> for CartSummary {
    fn from(summary: domain::cart::CartSummary) -> Self {
        Self {
            subtotal: summary.pricing.subtotal,
            shipping: summary.pricing.shipping,
            tax: summary.pricing.tax,
            total: summary.pricing.total,
            item_count: summary.item_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Cart {
    /// Absent until the user first adds something.
    pub id: Option<Uuid>,
    pub user_id: Uuid,
    pub items: Vec<CartItem>,
    pub total_items: i64,
    pub total_price: i64,
    pub summary: CartSummary,
}

impl Cart {
    pub fn empty(user_id: Uuid) -> Self {
        Self {
            id: None,
            user_id,
            items: Vec::new(),
            total_items: 0,
            total_price: 0,
            summary: domain::cart::CartSummary {
                pricing: Pricing::zero(),
                item_count: 0,
            }
            .into(),
        }
    }
}

impl TryFrom<&domain::cart::Cart> for Cart {
    type Error = AppError;

    fn try_from(cart: &domain::cart::Cart) -> Result<Self, Self::Error> {
        let summary = cart.summary()?;
        let items = cart
            .lines()
            .iter()
            .map(|line| {
                Ok(CartItem {
                    product_id: line.product_id,
                    name: line.name.clone(),
                    price: line.price,
                    image: line.image.clone(),
                    quantity: line.quantity,
                    line_total: line.line_total()?,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;
        Ok(Self {
            id: Some(cart.id),
            user_id: cart.user_id,
            items,
            total_items: summary.item_count,
            total_price: summary.pricing.subtotal,
            summary: summary.into(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShippingInfo {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentInfo {
    pub method: PaymentMethod,
    pub reference: String,
    pub transaction_id: Option<String>,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    /// Human-facing order number, e.g. `ORD-1740830400000-0042`.
    pub order_id: String,
    pub user_id: Uuid,
    pub shipping_info: ShippingInfo,
    pub order_note: String,
    pub pricing: Pricing,
    pub payment_info: PaymentInfo,
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<orders::Model> for Order {
    fn from(model: orders::Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_number,
            user_id: model.user_id,
            shipping_info: ShippingInfo {
                full_name: model.ship_full_name,
                email: model.ship_email,
                phone: model.ship_phone,
                address: model.ship_address,
                city: model.ship_city,
                state: model.ship_state,
                zip_code: model.ship_zip_code,
            },
            order_note: model.order_note,
            pricing: Pricing {
                subtotal: model.subtotal,
                shipping: model.shipping,
                tax: model.tax,
                total: model.total,
            },
            payment_info: PaymentInfo {
                method: model.payment_method,
                reference: model.payment_reference,
                transaction_id: model.transaction_id,
                status: model.payment_status,
                paid_at: model.paid_at.map(|at| at.with_timezone(&Utc)),
            },
            status: model.status,
            tracking_number: model.tracking_number,
            estimated_delivery: model.estimated_delivery.map(|at| at.with_timezone(&Utc)),
            delivered_at: model.delivered_at.map(|at| at.with_timezone(&Utc)),
            cancellation_reason: model.cancellation_reason,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub price: i64,
    pub quantity: i32,
    pub image: Option<String>,
}

impl From<order_items::Model> for OrderItem {
    fn from(model: order_items::Model) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            name: model.name,
            price: model.price,
            quantity: model.quantity,
            image: model.image,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderNote {
    pub id: Uuid,
    pub message: String,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<order_notes::Model> for OrderNote {
    fn from(model: order_notes::Model) -> Self {
        Self {
            id: model.id,
            message: model.message,
            author_id: model.author_id,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderStat {
    pub status: OrderStatus,
    pub count: i64,
    pub total_revenue: i64,
}
