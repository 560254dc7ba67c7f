use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    domain::cart::{Cart, CartLine, ProductSnapshot},
    dto::cart::{AddToCartRequest, UpdateCartItemRequest},
    entity::{
        cart_items::{self, Entity as CartItems},
        carts::{self, Entity as Carts},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{self, CartSummary},
    response::{ApiResponse, Meta},
    services::product_service,
    state::AppState,
};

async fn load_lines<C: ConnectionTrait>(db: &C, cart_id: Uuid) -> AppResult<Vec<CartLine>> {
    let lines = CartItems::find()
        .filter(cart_items::Column::CartId.eq(cart_id))
        .order_by_asc(cart_items::Column::Position)
        .all(db)
        .await?
        .into_iter()
        .map(|item| CartLine {
            product_id: item.product_id,
            name: item.name,
            price: item.price,
            image: item.image,
            quantity: item.quantity,
        })
        .collect();
    Ok(lines)
}

/// The user's cart, if one was ever created.
pub async fn find_cart<C: ConnectionTrait>(db: &C, user_id: Uuid) -> AppResult<Option<Cart>> {
    let Some(cart) = Carts::find()
        .filter(carts::Column::UserId.eq(user_id))
        .one(db)
        .await?
    else {
        return Ok(None);
    };
    let lines = load_lines(db, cart.id).await?;
    Ok(Some(Cart::new(cart.id, cart.user_id, lines)))
}

/// Like [`find_cart`], but holds the cart row until `txn` ends so no other
/// writer can change its lines in between. SQLite has no row locks and
/// serializes writers instead.
pub async fn lock_cart(txn: &DatabaseTransaction, user_id: Uuid) -> AppResult<Option<Cart>> {
    let Some(cart) = Carts::find()
        .filter(carts::Column::UserId.eq(user_id))
        .lock_exclusive()
        .one(txn)
        .await?
    else {
        return Ok(None);
    };
    let lines = load_lines(txn, cart.id).await?;
    Ok(Some(Cart::new(cart.id, cart.user_id, lines)))
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

pub async fn get_or_create_cart<C: ConnectionTrait>(db: &C, user_id: Uuid) -> AppResult<Cart> {
    if let Some(cart) = find_cart(db, user_id).await? {
        return Ok(cart);
    }

    let created = carts::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        ..Default::default()
    }
    .insert(db)
    .await;

    match created {
        Ok(cart) => Ok(Cart::new(cart.id, cart.user_id, Vec::new())),
        // Another request created it first.
        Err(err) if is_unique_violation(&err) => {
            find_cart(db, user_id).await?.ok_or(AppError::Persistence(err))
        }
        Err(err) => Err(err.into()),
    }
}

/// Replaces the stored lines with the aggregate's current lines.
pub async fn save_cart<C: ConnectionTrait>(db: &C, cart: &Cart) -> AppResult<()> {
    CartItems::delete_many()
        .filter(cart_items::Column::CartId.eq(cart.id))
        .exec(db)
        .await?;

    if !cart.is_empty() {
        let now: sea_orm::prelude::DateTimeWithTimeZone = chrono::Utc::now().into();
        let rows = cart
            .lines()
            .iter()
            .enumerate()
            .map(|(position, line)| cart_items::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(line.product_id),
                name: Set(line.name.clone()),
                price: Set(line.price),
                image: Set(line.image.clone()),
                quantity: Set(line.quantity),
                position: Set(position as i32),
                created_at: Set(now),
            });
        CartItems::insert_many(rows).exec_without_returning(db).await?;
    }

    carts::ActiveModel {
        id: Set(cart.id),
        ..Default::default()
    }
    .update(db)
    .await?;

    Ok(())
}

/// Drops the lines for `product_ids`, leaving the rest of the cart alone.
pub async fn remove_lines<C: ConnectionTrait>(
    db: &C,
    cart_id: Uuid,
    product_ids: &[Uuid],
) -> AppResult<()> {
    CartItems::delete_many()
        .filter(cart_items::Column::CartId.eq(cart_id))
        .filter(cart_items::Column::ProductId.is_in(product_ids.iter().copied()))
        .exec(db)
        .await?;
    Ok(())
}

/// Loads the caller's cart, applies `change`, and stores the result atomically.
async fn modify_cart<F>(state: &AppState, user_id: Uuid, change: F) -> AppResult<Cart>
where
    F: FnOnce(&mut Cart) -> AppResult<()>,
{
    // Created outside the transaction so a lost creation race cannot abort it.
    let created = get_or_create_cart(&state.orm, user_id).await?;

    let txn = state.orm.begin().await?;
    let mut cart = lock_cart(&txn, user_id).await?.unwrap_or(created);
    if let Err(err) = change(&mut cart) {
        txn.rollback().await?;
        return Err(err);
    }
    save_cart(&txn, &cart).await?;
    txn.commit().await?;
    Ok(cart)
}

fn cart_response(message: &str, cart: &Cart) -> AppResult<ApiResponse<models::Cart>> {
    let view = models::Cart::try_from(cart)?;
    Ok(ApiResponse::success(message, view, Some(Meta::empty())))
}

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<models::Cart>> {
    let view = match find_cart(&state.orm, user.user_id).await? {
        Some(cart) => models::Cart::try_from(&cart)?,
        None => models::Cart::empty(user.user_id),
    };
    Ok(ApiResponse::success("Cart", view, Some(Meta::empty())))
}

pub async fn add_item(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<models::Cart>> {
    if payload.quantity < 1 {
        return Err(AppError::invalid("Quantity must be at least 1"));
    }

    let product = product_service::find_product(&state.orm, payload.product_id)
        .await?
        .filter(|product| product.is_active)
        .ok_or_else(|| AppError::not_found("Product"))?;

    let snapshot = ProductSnapshot {
        product_id: product.id,
        image: product.primary_image(),
        name: product.name,
        price: product.price,
    };
    let cart = modify_cart(state, user.user_id, |cart| {
        cart.add_item(snapshot, payload.quantity)
    })
    .await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "cart_add",
        Some("carts"),
        Some(serde_json::json!({
            "product_id": payload.product_id,
            "quantity": payload.quantity,
        })),
    )
    .await;

    cart_response("Added to cart", &cart)
}

pub async fn update_item(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<models::Cart>> {
    let cart = modify_cart(state, user.user_id, |cart| {
        cart.update_quantity(product_id, payload.quantity)
    })
    .await?;
    cart_response("Cart updated", &cart)
}

pub async fn remove_item(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<models::Cart>> {
    let cart = modify_cart(state, user.user_id, |cart| {
        if !cart.remove_item(product_id) {
            tracing::debug!(%product_id, "remove of product not in cart");
        }
        Ok(())
    })
    .await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "cart_remove",
        Some("carts"),
        Some(serde_json::json!({ "product_id": product_id })),
    )
    .await;

    cart_response("Removed from cart", &cart)
}

pub async fn clear_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<models::Cart>> {
    let cart = modify_cart(state, user.user_id, |cart| {
        cart.clear();
        Ok(())
    })
    .await?;
    cart_response("Cart cleared", &cart)
}

pub async fn get_summary(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartSummary>> {
    let view = match find_cart(&state.orm, user.user_id).await? {
        Some(cart) => models::Cart::try_from(&cart)?,
        None => models::Cart::empty(user.user_id),
    };
    Ok(ApiResponse::success(
        "Cart summary",
        view.summary,
        Some(Meta::empty()),
    ))
}
