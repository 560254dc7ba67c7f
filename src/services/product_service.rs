use chrono::Utc;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    Order, QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::products::{
        CreateProductRequest, ProductList, StockOperation, StockUpdateRequest,
        UpdateProductRequest,
    },
    entity::products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    error::{AppError, AppResult},
    events,
    middleware::auth::{AuthUser, Capability, ensure_capability, ensure_owner_or_admin},
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

pub const MAX_NAME_LEN: usize = 200;
pub const DEFAULT_VENDOR_NAME: &str = "Unknown Vendor";

/// Ten million in major units.
pub const MAX_PRICE: i64 = 1_000_000_000;

const NEWEST_FIRST: (Column, Order) = (Column::CreatedAt, Order::Desc);

pub async fn find_product<C: ConnectionTrait>(db: &C, id: Uuid) -> AppResult<Option<ProductModel>> {
    Ok(Products::find_by_id(id).one(db).await?)
}

pub async fn get_product_model<C: ConnectionTrait>(db: &C, id: Uuid) -> AppResult<ProductModel> {
    find_product(db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))
}

pub fn is_in_stock(product: &ProductModel, quantity: i32) -> bool {
    product.stock >= quantity
}

/// Takes `quantity` units off the shelf. The decrement is conditional on enough
/// stock remaining, so two concurrent sales can never drive stock negative.
pub async fn decrease_stock<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    quantity: i32,
) -> AppResult<ProductModel> {
    if quantity <= 0 {
        return Err(AppError::invalid("Quantity must be greater than 0"));
    }

    let result = Products::update_many()
        .col_expr(Column::Stock, Expr::col(Column::Stock).sub(quantity))
        .col_expr(Column::UpdatedAt, Expr::value(now()))
        .filter(Column::Id.eq(id))
        .filter(Column::Stock.gte(quantity))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return match find_product(db, id).await? {
            Some(product) => Err(AppError::InsufficientStock {
                product: product.name,
                available: product.stock,
            }),
            None => Err(AppError::ProductUnavailable(id.to_string())),
        };
    }

    let product = get_product_model(db, id).await?;
    tracing::debug!(product_id = %id, quantity, remaining = product.stock, "stock decreased");
    Ok(product)
}

pub async fn increase_stock<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    quantity: i32,
) -> AppResult<ProductModel> {
    if quantity <= 0 {
        return Err(AppError::invalid("Quantity must be greater than 0"));
    }

    let result = Products::update_many()
        .col_expr(Column::Stock, Expr::col(Column::Stock).add(quantity))
        .col_expr(Column::UpdatedAt, Expr::value(now()))
        .filter(Column::Id.eq(id))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("Product"));
    }

    let product = get_product_model(db, id).await?;
    tracing::debug!(product_id = %id, quantity, remaining = product.stock, "stock increased");
    Ok(product)
}

fn now() -> sea_orm::prelude::DateTimeWithTimeZone {
    Utc::now().into()
}

fn validate_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::invalid("Product name is required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::InvalidRequest(format!(
            "Product name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

fn validate_category(category: &str) -> AppResult<String> {
    let category = category.trim();
    if category.is_empty() {
        return Err(AppError::invalid("Product category is required"));
    }
    Ok(category.to_string())
}

fn validate_price(price: i64) -> AppResult<i64> {
    if price < 0 {
        return Err(AppError::invalid("Price cannot be negative"));
    }
    if price > MAX_PRICE {
        return Err(AppError::invalid("Price is too large"));
    }
    Ok(price)
}

fn validate_stock(stock: i32) -> AppResult<i32> {
    if stock < 0 {
        return Err(AppError::invalid("Stock cannot be negative"));
    }
    Ok(stock)
}

fn like_pattern(term: &str) -> String {
    let escaped: String = term
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '%' | '_'))
        .collect();
    format!("%{escaped}%")
}

fn lower_like(column: Column, pattern: String) -> sea_orm::sea_query::SimpleExpr {
    Expr::expr(Func::lower(Expr::col(column))).like(pattern)
}

fn publish_if_low(state: &AppState, product: &ProductModel) {
    if let Some(event) = events::stock_low(product.id, &product.name, product.stock) {
        state.events.publish(event);
    }
}

pub async fn list_products(
    state: &AppState,
    user: Option<&AuthUser>,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    let show_inactive = user.is_some_and(AuthUser::is_admin);
    match query.is_active {
        Some(is_active) if show_inactive => {
            condition = condition.add(Column::IsActive.eq(is_active));
        }
        None if show_inactive => {}
        _ => condition = condition.add(Column::IsActive.eq(true)),
    }

    if let Some(search) = query.q.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = like_pattern(search);
        condition = condition.add(
            Condition::any()
                .add(lower_like(Column::Name, pattern.clone()))
                .add(lower_like(Column::Description, pattern.clone()))
                .add(lower_like(Column::Category, pattern)),
        );
    }

    if let Some(category) = query.category.as_deref().filter(|s| !s.trim().is_empty()) {
        condition = condition.add(lower_like(Column::Category, like_pattern(category)));
    }

    if let Some(vendor_id) = query.vendor_id {
        condition = condition.add(Column::VendorId.eq(vendor_id));
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Name => Column::Name,
        ProductSortBy::Stock => Column::Stock,
    };

    let finder = Products::find()
        .filter(condition)
        .order_by(sort_col, sort_order.as_order())
        .order_by_asc(Column::Id);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

async fn list_where(
    state: &AppState,
    condition: Condition,
    (sort_column, sort_order): (Column, Order),
) -> AppResult<ApiResponse<ProductList>> {
    let items: Vec<Product> = Products::find()
        .filter(
            Condition::all()
                .add(condition)
                .add(Column::IsActive.eq(true)),
        )
        .order_by(sort_column, sort_order)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    let total = items.len() as i64;
    let meta = Meta::new(1, total.max(1), total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn find_by_vendor(state: &AppState, vendor_id: Uuid) -> AppResult<ApiResponse<ProductList>> {
    list_where(
        state,
        Condition::all().add(Column::VendorId.eq(vendor_id)),
        NEWEST_FIRST,
    )
    .await
}

/// Case-insensitive match on name or description.
pub async fn search(state: &AppState, term: &str) -> AppResult<ApiResponse<ProductList>> {
    if term.trim().is_empty() {
        return Err(AppError::invalid("Search term is required"));
    }
    let pattern = like_pattern(term);
    list_where(
        state,
        Condition::any()
            .add(lower_like(Column::Name, pattern.clone()))
            .add(lower_like(Column::Description, pattern)),
        NEWEST_FIRST,
    )
    .await
}

pub async fn find_by_category(state: &AppState, category: &str) -> AppResult<ApiResponse<ProductList>> {
    list_where(
        state,
        Condition::all().add(lower_like(Column::Category, like_pattern(category))),
        NEWEST_FIRST,
    )
    .await
}

pub async fn find_by_price_range(
    state: &AppState,
    min: i64,
    max: i64,
) -> AppResult<ApiResponse<ProductList>> {
    if min < 0 || max < min {
        return Err(AppError::invalid("Invalid price range"));
    }
    list_where(
        state,
        Condition::all()
            .add(Column::Price.gte(min))
            .add(Column::Price.lte(max)),
        (Column::Price, Order::Asc),
    )
    .await
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product = get_product_model(&state.orm, id).await?;
    Ok(ApiResponse::success(
        "Product",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_capability(user, Capability::ManageCatalog)?;

    let vendor_id = payload.vendor_id.unwrap_or(user.user_id);
    ensure_owner_or_admin(user, vendor_id)?;

    let vendor_name = payload
        .vendor_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_VENDOR_NAME.to_string());

    let active = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(validate_name(&payload.name)?),
        description: Set(payload.description.trim().to_string()),
        price: Set(validate_price(payload.price)?),
        stock: Set(validate_stock(payload.stock)?),
        category: Set(validate_category(&payload.category)?),
        vendor_id: Set(vendor_id),
        vendor_name: Set(vendor_name),
        images: Set(serde_json::json!(payload.images)),
        is_active: Set(true),
        ..Default::default()
    };
    let product = active.insert(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_create",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_capability(user, Capability::ManageCatalog)?;
    let existing = get_product_model(&state.orm, id).await?;
    ensure_owner_or_admin(user, existing.vendor_id)?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(validate_name(&name)?);
    }
    if let Some(description) = payload.description {
        active.description = Set(description.trim().to_string());
    }
    if let Some(price) = payload.price {
        active.price = Set(validate_price(price)?);
    }
    if let Some(stock) = payload.stock {
        active.stock = Set(validate_stock(stock)?);
    }
    if let Some(category) = payload.category {
        active.category = Set(validate_category(&category)?);
    }
    if let Some(vendor_name) = payload.vendor_name {
        active.vendor_name = Set(vendor_name.trim().to_string());
    }
    if let Some(images) = payload.images {
        active.images = Set(serde_json::json!(images));
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }

    let product = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_update",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Product updated",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_stock(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: StockUpdateRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_capability(user, Capability::ManageCatalog)?;
    let existing = get_product_model(&state.orm, id).await?;
    ensure_owner_or_admin(user, existing.vendor_id)?;

    let product = match payload.operation {
        StockOperation::Increment => increase_stock(&state.orm, id, payload.quantity).await?,
        StockOperation::Decrement => decrease_stock(&state.orm, id, payload.quantity).await?,
        StockOperation::Set => {
            let mut active: ActiveModel = existing.into();
            active.stock = Set(validate_stock(payload.quantity)?);
            active.update(&state.orm).await?
        }
    };
    publish_if_low(state, &product);

    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_stock_update",
        Some("products"),
        Some(serde_json::json!({
            "product_id": product.id,
            "quantity": payload.quantity,
            "stock": product.stock,
        })),
    )
    .await;

    Ok(ApiResponse::success(
        "Stock updated",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    permanent: bool,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_capability(user, Capability::DeleteProducts)?;
    let existing = get_product_model(&state.orm, id).await?;

    let action = if permanent {
        Products::delete_by_id(existing.id).exec(&state.orm).await?;
        "product_delete"
    } else {
        let mut active: ActiveModel = existing.into();
        active.is_active = Set(false);
        active.update(&state.orm).await?;
        "product_deactivate"
    };

    audit::record(
        &state.orm,
        Some(user.user_id),
        action,
        Some("products"),
        Some(serde_json::json!({ "product_id": id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Product deleted",
        serde_json::json!({ "id": id, "permanent": permanent }),
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed_and_bounded() {
        assert_eq!(validate_name("  Mug ").unwrap(), "Mug");
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(MAX_NAME_LEN)).is_ok());
        assert!(validate_name(&"x".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn out_of_range_money_and_stock_rejected() {
        assert!(validate_price(-1).is_err());
        assert!(validate_price(0).is_ok());
        assert!(validate_price(MAX_PRICE).is_ok());
        assert!(validate_price(MAX_PRICE + 1).is_err());
        assert!(validate_stock(-1).is_err());
    }

    #[test]
    fn like_pattern_strips_wildcards() {
        assert_eq!(like_pattern(" Mu%g_ "), "%mug%");
    }
}
