use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    domain::pricing::Pricing,
    dto::{
        cart::{AddToCartRequest, CartList, UpdateCartItemRequest},
        orders::{
            AddNoteRequest, CancelOrderRequest, CheckoutReceipt, CheckoutRequest, OrderList,
            OrderStats, OrderWithItems, ShippingInfoInput, UpdateDeliveryRequest,
            UpdateOrderStatusRequest,
        },
        payments::{InitiatePaymentRequest, PaymentSessionView},
        products::{
            CreateProductRequest, ProductList, StockOperation, StockUpdateRequest,
            UpdateProductRequest,
        },
    },
    entity::sea_orm_active_enums::{OrderStatus, PaymentMethod, PaymentStatus},
    models::{
        Cart, CartItem, CartSummary, Order, OrderItem, OrderNote, OrderStat, PaymentInfo, Product,
        ShippingInfo,
    },
    response::{ApiResponse, Meta},
    routes::{
        admin, cart,
        health::{self, HealthData},
        orders, params, products as product_routes,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        product_routes::list_products,
        product_routes::products_by_vendor,
        product_routes::search_products,
        product_routes::products_by_category,
        product_routes::products_by_price,
        product_routes::get_product,
        product_routes::create_product,
        product_routes::update_product,
        product_routes::update_stock,
        product_routes::delete_product,
        cart::get_cart,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_from_cart,
        cart::clear_cart,
        cart::cart_summary,
        orders::list_orders,
        orders::initiate_payment,
        orders::verify_payment,
        orders::user_stats,
        orders::admin_stats,
        orders::get_order,
        orders::cancel_order,
        orders::update_order_status,
        orders::update_delivery,
        orders::add_note,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::list_low_stock,
        admin::list_carts,
        admin::get_user_cart
    ),
    components(
        schemas(
            HealthData,
            Product,
            Cart,
            CartItem,
            CartSummary,
            Order,
            OrderItem,
            OrderNote,
            OrderStat,
            ShippingInfo,
            PaymentInfo,
            Pricing,
            OrderStatus,
            PaymentStatus,
            PaymentMethod,
            CreateProductRequest,
            UpdateProductRequest,
            StockUpdateRequest,
            StockOperation,
            AddToCartRequest,
            UpdateCartItemRequest,
            CheckoutRequest,
            ShippingInfoInput,
            CheckoutReceipt,
            CancelOrderRequest,
            UpdateOrderStatusRequest,
            UpdateDeliveryRequest,
            AddNoteRequest,
            InitiatePaymentRequest,
            PaymentSessionView,
            CartList,
            OrderList,
            OrderStats,
            OrderWithItems,
            ProductList,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            params::LowStockQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<Cart>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<CheckoutReceipt>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Checkout and order lifecycle endpoints"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_checkout_route() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/orders/verify-payment"));
        assert!(doc.paths.paths.contains_key("/api/cart/summary"));
    }
}
