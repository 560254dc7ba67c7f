use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
};
use uuid::Uuid;

use crate::{
    dto::products::{CreateProductRequest, ProductList, StockUpdateRequest, UpdateProductRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Product,
    response::ApiResponse,
    routes::params::{DeleteProductQuery, ProductQuery},
    services::product_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/vendor/{vendor_id}", get(products_by_vendor))
        .route("/search/{term}", get(search_products))
        .route("/category/{category}", get(products_by_category))
        .route("/price/{min}/{max}", get(products_by_price))
        .route(
            "/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/{id}/stock", patch(update_stock))
}

#[utoipa::path(
    get,
    path = "/api/products",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20 (alias: limit)"),
        ("q" = Option<String>, Query, description = "Search name, description or category"),
        ("category" = Option<String>, Query, description = "Category filter"),
        ("vendor_id" = Option<Uuid>, Query, description = "Vendor filter"),
        ("min_price" = Option<i64>, Query, description = "Minimum price in minor units"),
        ("max_price" = Option<i64>, Query, description = "Maximum price in minor units"),
        ("is_active" = Option<bool>, Query, description = "Admins only"),
        ("sort_by" = Option<String>, Query, description = "created_at, price, name, stock"),
        ("sort_order" = Option<String>, Query, description = "asc, desc")
    ),
    responses(
        (status = 200, description = "List products", body = ApiResponse<ProductList>)
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Query(query): Query<ProductQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::list_products(&state, user.as_ref(), query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/vendor/{vendor_id}",
    params(("vendor_id" = Uuid, Path, description = "Vendor ID")),
    responses(
        (status = 200, description = "Active products of a vendor", body = ApiResponse<ProductList>)
    ),
    tag = "Products"
)]
pub async fn products_by_vendor(
    State(state): State<AppState>,
    Path(vendor_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::find_by_vendor(&state, vendor_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/search/{term}",
    params(("term" = String, Path, description = "Case-insensitive search term")),
    responses(
        (status = 200, description = "Matching products", body = ApiResponse<ProductList>),
        (status = 400, description = "Empty search term")
    ),
    tag = "Products"
)]
pub async fn search_products(
    State(state): State<AppState>,
    Path(term): Path<String>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::search(&state, &term).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/category/{category}",
    params(("category" = String, Path, description = "Category, case-insensitive")),
    responses(
        (status = 200, description = "Products in category", body = ApiResponse<ProductList>)
    ),
    tag = "Products"
)]
pub async fn products_by_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::find_by_category(&state, &category).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/price/{min}/{max}",
    params(
        ("min" = i64, Path, description = "Minimum price in minor units"),
        ("max" = i64, Path, description = "Maximum price in minor units")
    ),
    responses(
        (status = 200, description = "Products in price range", body = ApiResponse<ProductList>),
        (status = 400, description = "Invalid range")
    ),
    tag = "Products"
)]
pub async fn products_by_price(
    State(state): State<AppState>,
    Path((min, max)): Path<(i64, i64)>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::find_by_price_range(&state, min, max).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product detail", body = ApiResponse<Product>),
        (status = 404, description = "Not Found")
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::get_product(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ApiResponse<Product>),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateProductRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Product>>)> {
    let resp = product_service::create_product(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    put,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<Product>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::update_product(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/products/{id}/stock",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = StockUpdateRequest,
    responses(
        (status = 200, description = "Stock updated", body = ApiResponse<Product>),
        (status = 400, description = "Insufficient stock or invalid quantity"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn update_stock(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<StockUpdateRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::update_stock(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    params(
        ("id" = Uuid, Path, description = "Product ID"),
        ("permanent" = Option<bool>, Query, description = "Hard delete instead of deactivating")
    ),
    responses(
        (status = 200, description = "Product deleted"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<DeleteProductQuery>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let permanent = query.permanent.unwrap_or(false);
    let resp = product_service::delete_product(&state, &user, id, permanent).await?;
    Ok(Json(resp))
}
