use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use uuid::Uuid;

use crate::{
    dto::{
        cart::CartList,
        orders::{OrderList, OrderWithItems},
        products::ProductList,
    },
    entity::{
        carts::{Column as CartCol, Entity as Carts},
        products::{Column as ProdCol, Entity as Products},
    },
    error::AppResult,
    events::LOW_STOCK_THRESHOLD,
    middleware::auth::{AuthUser, Capability, ensure_capability},
    models::{Cart, Product},
    response::{ApiResponse, Meta},
    routes::params::{LowStockQuery, OrderListQuery, Pagination},
    services::{cart_service, order_service},
    state::AppState,
};

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_capability(user, Capability::ViewAllOrders)?;
    order_service::list_matching(state, Condition::all(), query).await
}

pub async fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    order_ref: &str,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_capability(user, Capability::ViewAllOrders)?;
    let order = order_service::resolve_order(&state.orm, order_ref, None).await?;
    let data = order_service::load_detail(&state.orm, order).await?;
    Ok(ApiResponse::success("Order found", data, Some(Meta::empty())))
}

/// Active products at or below `threshold` units, scarcest first.
pub async fn list_low_stock(
    state: &AppState,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_capability(user, Capability::ManageInventory)?;
    let (page, limit, offset) = query.pagination().normalize();
    let threshold = query.threshold.unwrap_or(LOW_STOCK_THRESHOLD).max(0);

    let finder = Products::find()
        .filter(ProdCol::Stock.lte(threshold))
        .filter(ProdCol::IsActive.eq(true))
        .order_by_asc(ProdCol::Stock)
        .order_by_asc(ProdCol::Name);

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
    Ok(ApiResponse::success(
        "Low stock products",
        ProductList { items },
        Some(meta),
    ))
}

pub async fn list_carts(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<CartList>> {
    ensure_capability(user, Capability::ViewAllCarts)?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Carts::find()
        .order_by_desc(CartCol::UpdatedAt)
        .order_by_asc(CartCol::Id);
    let total = finder.clone().count(&state.orm).await? as i64;

    let owners: Vec<Uuid> = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|cart| cart.user_id)
        .collect();

    let mut items = Vec::with_capacity(owners.len());
    for user_id in owners {
        if let Some(cart) = cart_service::find_cart(&state.orm, user_id).await? {
            items.push(Cart::try_from(&cart)?);
        }
    }

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Carts", CartList { items }, Some(meta)))
}

pub async fn get_user_cart(
    state: &AppState,
    user: &AuthUser,
    user_id: Uuid,
) -> AppResult<ApiResponse<Cart>> {
    ensure_capability(user, Capability::ViewAllCarts)?;
    let view = match cart_service::find_cart(&state.orm, user_id).await? {
        Some(cart) => Cart::try_from(&cart)?,
        None => Cart::empty(user_id),
    };
    Ok(ApiResponse::success("Cart", view, Some(Meta::empty())))
}
