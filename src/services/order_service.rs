use std::collections::HashMap;

use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::{Alias, Expr, Func, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, EntityTrait,
    FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    domain::order::{
        ADMIN_CANCELLATION_REASON, DEFAULT_CANCELLATION_REASON, can_be_cancelled,
        check_transition, days_until_delivery, delivery_status,
    },
    dto::orders::{
        AddNoteRequest, CancelOrderRequest, OrderList, OrderStats, OrderWithItems,
        UpdateDeliveryRequest, UpdateOrderStatusRequest,
    },
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        order_notes::{self, Column as OrderNoteCol, Entity as OrderNotes},
        orders::{Column as OrderCol, Entity as Orders, Model as OrderModel},
        sea_orm_active_enums::OrderStatus,
    },
    error::{AppError, AppResult},
    events::OrderEvent,
    middleware::auth::{AuthUser, Capability, ensure_capability},
    models::{Order, OrderItem, OrderNote, OrderStat},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::product_service,
    state::AppState,
};

/// Finds an order by its order number or its UUID. With `owner` set, orders
/// belonging to anyone else are reported as missing.
pub async fn resolve_order<C: ConnectionTrait>(
    db: &C,
    order_ref: &str,
    owner: Option<Uuid>,
) -> AppResult<OrderModel> {
    let mut condition = match Uuid::parse_str(order_ref) {
        Ok(id) => Condition::any()
            .add(OrderCol::Id.eq(id))
            .add(OrderCol::OrderNumber.eq(order_ref)),
        Err(_) => Condition::all().add(OrderCol::OrderNumber.eq(order_ref)),
    };
    if let Some(owner) = owner {
        condition = Condition::all().add(condition).add(OrderCol::UserId.eq(owner));
    }

    Orders::find()
        .filter(condition)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))
}

pub(crate) async fn load_detail<C: ConnectionTrait>(
    db: &C,
    order: OrderModel,
) -> AppResult<OrderWithItems> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::Position)
        .all(db)
        .await?
        .into_iter()
        .map(OrderItem::from)
        .collect();

    let notes = OrderNotes::find()
        .filter(OrderNoteCol::OrderId.eq(order.id))
        .order_by_asc(OrderNoteCol::CreatedAt)
        .all(db)
        .await?
        .into_iter()
        .map(OrderNote::from)
        .collect();

    let days = days_until_delivery(
        order.estimated_delivery.map(|at| at.with_timezone(&Utc)),
        Utc::now(),
    );

    Ok(OrderWithItems {
        order: Order::from(order),
        items,
        notes,
        days_until_delivery: days,
    })
}

fn parse_status_filter(status: Option<&str>) -> AppResult<Option<OrderStatus>> {
    match status.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => raw
            .parse::<OrderStatus>()
            .map(Some)
            .map_err(AppError::InvalidStatus),
        None => Ok(None),
    }
}

pub(crate) async fn list_matching(
    state: &AppState,
    mut condition: Condition,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    if let Some(status) = parse_status_filter(query.status.as_deref())? {
        condition = condition.add(OrderCol::Status.eq(status));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let finder = Orders::find()
        .filter(condition)
        .order_by(OrderCol::CreatedAt, sort_order.as_order())
        .order_by_asc(OrderCol::Id);

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Orders",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    list_matching(
        state,
        Condition::all().add(OrderCol::UserId.eq(user.user_id)),
        query,
    )
    .await
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    order_ref: &str,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = resolve_order(&state.orm, order_ref, Some(user.user_id)).await?;
    let detail = load_detail(&state.orm, order).await?;
    Ok(ApiResponse::success("Order", detail, Some(Meta::empty())))
}

/// Puts every line's quantity back on the shelf. Lines whose product has
/// since been deleted are skipped.
async fn restore_stock(txn: &DatabaseTransaction, order_id: Uuid) -> AppResult<()> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .all(txn)
        .await?;

    for item in items {
        match product_service::increase_stock(txn, item.product_id, item.quantity).await {
            Ok(_) => {}
            Err(AppError::NotFound(_)) => tracing::warn!(
                %order_id,
                product_id = %item.product_id,
                "product gone, stock not restored"
            ),
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

/// Moves the order from `from` to cancelled and restores its stock. The
/// status check is part of the update, so concurrent cancellations restore
/// stock exactly once.
async fn cancel_in_txn(
    txn: &DatabaseTransaction,
    order: &OrderModel,
    from: OrderStatus,
    reason: &str,
) -> AppResult<OrderModel> {
    let result = Orders::update_many()
        .col_expr(OrderCol::Status, Expr::value(OrderStatus::Cancelled))
        .col_expr(OrderCol::CancellationReason, Expr::value(reason))
        .col_expr(
            OrderCol::UpdatedAt,
            Expr::value(DateTimeWithTimeZone::from(Utc::now())),
        )
        .filter(OrderCol::Id.eq(order.id))
        .filter(OrderCol::Status.eq(from))
        .exec(txn)
        .await?;

    if result.rows_affected == 0 {
        let current = Orders::find_by_id(order.id)
            .one(txn)
            .await?
            .map(|o| o.status)
            .unwrap_or(order.status);
        return Err(AppError::NotCancellable {
            status: current.to_string(),
        });
    }

    restore_stock(txn, order.id).await?;

    Orders::find_by_id(order.id)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))
}

/// Moves the order from `from` to `target`, writing `changes` alongside.
/// Nothing is written once the order has left `from`; the caller then gets
/// the transition error for the status it actually holds.
pub async fn set_status_if<C: ConnectionTrait>(
    db: &C,
    order: &OrderModel,
    from: OrderStatus,
    target: OrderStatus,
    changes: Vec<(OrderCol, SimpleExpr)>,
) -> AppResult<OrderModel> {
    let mut update = Orders::update_many()
        .col_expr(OrderCol::Status, Expr::value(target))
        .col_expr(
            OrderCol::UpdatedAt,
            Expr::value(DateTimeWithTimeZone::from(Utc::now())),
        );
    for (column, value) in changes {
        update = update.col_expr(column, value);
    }
    let result = update
        .filter(OrderCol::Id.eq(order.id))
        .filter(OrderCol::Status.eq(from))
        .exec(db)
        .await?;

    let current = Orders::find_by_id(order.id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;
    if result.rows_affected == 0 {
        check_transition(current.status, target)?;
        return Err(AppError::InvalidStatus(format!(
            "Order moved to {} before it could become {target}",
            current.status
        )));
    }
    Ok(current)
}

async fn cancel_and_restock(
    state: &AppState,
    order: &OrderModel,
    reason: &str,
) -> AppResult<OrderModel> {
    let txn = state.orm.begin().await?;
    match cancel_in_txn(&txn, order, order.status, reason).await {
        Ok(cancelled) => {
            txn.commit().await?;
            Ok(cancelled)
        }
        Err(err) => {
            txn.rollback().await?;
            Err(err)
        }
    }
}

pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    order_ref: &str,
    payload: CancelOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = resolve_order(&state.orm, order_ref, Some(user.user_id)).await?;
    if !can_be_cancelled(order.status, order.payment_status) {
        return Err(AppError::NotCancellable {
            status: order.status.to_string(),
        });
    }

    let reason = payload
        .reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| DEFAULT_CANCELLATION_REASON.to_string());

    let cancelled = cancel_and_restock(state, &order, &reason).await?;
    tracing::info!(order_id = %cancelled.id, %reason, "order cancelled");

    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_cancel",
        Some("orders"),
        Some(serde_json::json!({ "order_id": cancelled.id, "reason": reason })),
    )
    .await;

    state.events.publish(OrderEvent::OrderCancelled {
        order_id: cancelled.id,
        order_number: cancelled.order_number.clone(),
        user_id: cancelled.user_id,
        reason,
    });

    let detail = load_detail(&state.orm, cancelled).await?;
    Ok(ApiResponse::success(
        "Order cancelled successfully",
        detail,
        Some(Meta::empty()),
    ))
}

pub async fn update_status(
    state: &AppState,
    user: &AuthUser,
    order_ref: &str,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_capability(user, Capability::ManageOrders)?;
    let target: OrderStatus = payload.status.parse().map_err(AppError::InvalidStatus)?;

    let order = resolve_order(&state.orm, order_ref, None).await?;
    let from = order.status;
    check_transition(from, target)?;

    let updated = if target == OrderStatus::Cancelled && from != OrderStatus::Cancelled {
        cancel_and_restock(state, &order, ADMIN_CANCELLATION_REASON).await?
    } else {
        set_status_if(&state.orm, &order, from, target, Vec::new()).await?
    };

    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_status_update",
        Some("orders"),
        Some(serde_json::json!({
            "order_id": updated.id,
            "from": from,
            "to": target,
        })),
    )
    .await;

    if from != target {
        state.events.publish(OrderEvent::OrderStatusChanged {
            order_id: updated.id,
            order_number: updated.order_number.clone(),
            user_id: updated.user_id,
            from,
            to: target,
        });
    }

    let detail = load_detail(&state.orm, updated).await?;
    Ok(ApiResponse::success(
        "Order status updated",
        detail,
        Some(Meta::empty()),
    ))
}

pub async fn update_delivery(
    state: &AppState,
    user: &AuthUser,
    order_ref: &str,
    payload: UpdateDeliveryRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_capability(user, Capability::ManageOrders)?;
    let order = resolve_order(&state.orm, order_ref, None).await?;

    let delivered_at = payload
        .delivered_at
        .or_else(|| order.delivered_at.map(|at| at.with_timezone(&Utc)));
    let from = order.status;
    let target = delivery_status(delivered_at);
    check_transition(from, target)?;

    let mut changes: Vec<(OrderCol, SimpleExpr)> = Vec::new();
    if let Some(tracking) = payload.tracking_number {
        let tracking = tracking.trim().to_string();
        changes.push((
            OrderCol::TrackingNumber,
            Expr::value((!tracking.is_empty()).then_some(tracking)),
        ));
    }
    if let Some(estimated) = payload.estimated_delivery {
        changes.push((
            OrderCol::EstimatedDelivery,
            Expr::value(Some(DateTimeWithTimeZone::from(estimated))),
        ));
    }
    if let Some(delivered) = payload.delivered_at {
        changes.push((
            OrderCol::DeliveredAt,
            Expr::value(Some(DateTimeWithTimeZone::from(delivered))),
        ));
    }
    let updated = set_status_if(&state.orm, &order, from, target, changes).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_delivery_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": updated.id, "status": target })),
    )
    .await;

    if from != target {
        state.events.publish(OrderEvent::OrderStatusChanged {
            order_id: updated.id,
            order_number: updated.order_number.clone(),
            user_id: updated.user_id,
            from,
            to: target,
        });
    }

    let detail = load_detail(&state.orm, updated).await?;
    Ok(ApiResponse::success(
        "Delivery information updated",
        detail,
        Some(Meta::empty()),
    ))
}

pub async fn add_note(
    state: &AppState,
    user: &AuthUser,
    order_ref: &str,
    payload: AddNoteRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_capability(user, Capability::ManageOrders)?;
    let message = payload.message.trim().to_string();
    if message.is_empty() {
        return Err(AppError::invalid("Note message is required"));
    }

    let order = resolve_order(&state.orm, order_ref, None).await?;
    order_notes::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        message: Set(message),
        author_id: Set(user.user_id),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    let detail = load_detail(&state.orm, order).await?;
    Ok(ApiResponse::success("Note added", detail, Some(Meta::empty())))
}

#[derive(Debug, FromQueryResult)]
struct StatusTotals {
    status: String,
    count: i64,
    revenue: Option<i64>,
}

/// Order count and revenue per status, most common status first.
pub async fn order_stats<C: ConnectionTrait>(
    db: &C,
    user_id: Option<Uuid>,
) -> AppResult<Vec<OrderStat>> {
    let mut select = Orders::find()
        .select_only()
        .column(OrderCol::Status)
        .column_as(Expr::col(OrderCol::Id).count(), "count")
        .column_as(
            SimpleExpr::from(Func::cast_as(
                Func::sum(Expr::col(OrderCol::Total)),
                Alias::new("BIGINT"),
            )),
            "revenue",
        )
        .group_by(OrderCol::Status);
    if let Some(user_id) = user_id {
        select = select.filter(OrderCol::UserId.eq(user_id));
    }

    let rows = select.into_model::<StatusTotals>().all(db).await?;

    let mut by_status: HashMap<OrderStatus, OrderStat> = HashMap::new();
    for row in rows {
        let Ok(status) = row.status.parse::<OrderStatus>() else {
            tracing::warn!(status = %row.status, "unknown order status in stats");
            continue;
        };
        let stat = by_status.entry(status).or_insert(OrderStat {
            status,
            count: 0,
            total_revenue: 0,
        });
        stat.count += row.count;
        stat.total_revenue += row.revenue.unwrap_or(0);
    }

    let mut stats: Vec<OrderStat> = by_status.into_values().collect();
    stats.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.status.as_str().cmp(b.status.as_str()))
    });
    Ok(stats)
}

pub async fn user_stats(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<OrderStats>> {
    let items = order_stats(&state.orm, Some(user.user_id)).await?;
    Ok(ApiResponse::success(
        "Order statistics",
        OrderStats { items },
        Some(Meta::empty()),
    ))
}

pub async fn admin_stats(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<OrderStats>> {
    ensure_capability(user, Capability::ViewAllOrders)?;
    let items = order_stats(&state.orm, None).await?;
    Ok(ApiResponse::success(
        "Order statistics",
        OrderStats { items },
        Some(Meta::empty()),
    ))
}
