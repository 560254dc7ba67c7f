use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
};

use crate::{
    dto::{
        orders::{
            AddNoteRequest, CancelOrderRequest, CheckoutReceipt, CheckoutRequest, OrderList,
            OrderStats, OrderWithItems, UpdateDeliveryRequest, UpdateOrderStatusRequest,
        },
        payments::{InitiatePaymentRequest, PaymentSessionView},
    },
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::{checkout_service, order_service},
    state::AppState,
};

pub fn route() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/initiate-payment", post(initiate_payment))
        .route("/verify-payment", post(verify_payment))
        .route("/stats/user", get(user_stats))
        .route("/stats/admin", get(admin_stats))
        .route("/{order_id}", get(get_order))
        .route("/{order_id}/cancel", post(cancel_order))
        .route("/{order_id}/status", patch(update_order_status))
        .route("/{order_id}/delivery", patch(update_delivery))
        .route("/{order_id}/notes", post(add_note))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20 (alias: limit)"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "Caller's orders, newest first", body = ApiResponse<OrderList>),
        (status = 400, description = "Invalid status filter")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/initiate-payment",
    request_body = InitiatePaymentRequest,
    responses(
        (status = 200, description = "Hosted payment session", body = ApiResponse<PaymentSessionView>),
        (status = 400, description = "Invalid request or gateway failure")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn initiate_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<InitiatePaymentRequest>,
) -> AppResult<Json<ApiResponse<PaymentSessionView>>> {
    let resp = checkout_service::initiate_payment(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/verify-payment",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Payment verified and order placed", body = ApiResponse<CheckoutReceipt>),
        (status = 400, description = "Empty cart, insufficient stock or payment failure"),
        (status = 404, description = "Product no longer available"),
        (status = 409, description = "Payment reference already used")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CheckoutRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<CheckoutReceipt>>)> {
    let resp = checkout_service::checkout(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/orders/stats/user",
    responses(
        (status = 200, description = "Caller's order counts and revenue by status", body = ApiResponse<OrderStats>)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn user_stats(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<OrderStats>>> {
    let resp = order_service::user_stats(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/stats/admin",
    responses(
        (status = 200, description = "Order counts and revenue by status", body = ApiResponse<OrderStats>),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn admin_stats(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<OrderStats>>> {
    let resp = order_service::admin_stats(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/{order_id}",
    params(("order_id" = String, Path, description = "Order number or UUID")),
    responses(
        (status = 200, description = "Order with items and notes", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<String>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = order_service::get_order(&state, &user, &order_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/{order_id}/cancel",
    params(("order_id" = String, Path, description = "Order number or UUID")),
    request_body = CancelOrderRequest,
    responses(
        (status = 200, description = "Order cancelled and stock restored", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "Order cannot be cancelled"),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<String>,
    payload: Option<Json<CancelOrderRequest>>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let resp = order_service::cancel_order(&state, &user, &order_id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/orders/{order_id}/status",
    params(("order_id" = String, Path, description = "Order number or UUID")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "Invalid status or transition"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<String>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = order_service::update_status(&state, &user, &order_id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/orders/{order_id}/delivery",
    params(("order_id" = String, Path, description = "Order number or UUID")),
    request_body = UpdateDeliveryRequest,
    responses(
        (status = 200, description = "Delivery information updated", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "Order is cancelled"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn update_delivery(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<String>,
    Json(payload): Json<UpdateDeliveryRequest>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = order_service::update_delivery(&state, &user, &order_id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/{order_id}/notes",
    params(("order_id" = String, Path, description = "Order number or UUID")),
    request_body = AddNoteRequest,
    responses(
        (status = 200, description = "Note added", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "Empty note"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn add_note(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<String>,
    Json(payload): Json<AddNoteRequest>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = order_service::add_note(&state, &user, &order_id, payload).await?;
    Ok(Json(resp))
}
