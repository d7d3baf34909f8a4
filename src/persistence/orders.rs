//! Limit-order persistence: insert, status update, hydration listing.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::types::order::{LimitOrder, OrderId, OrderStatus, TradeSide};

fn side_to_str(side: TradeSide) -> &'static str {
    match side {
        TradeSide::Buy => "buy",
        TradeSide::Sell => "sell",
    }
}

fn str_to_side(s: &str) -> Option<TradeSide> {
    match s {
        "buy" => Some(TradeSide::Buy),
        "sell" => Some(TradeSide::Sell),
        _ => None,
    }
}

fn status_to_str(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "pending",
        OrderStatus::Executed => "executed",
        OrderStatus::Cancelled => "cancelled",
    }
}

fn str_to_status(s: &str) -> Option<OrderStatus> {
    match s {
        "pending" => Some(OrderStatus::Pending),
        "executed" => Some(OrderStatus::Executed),
        "cancelled" => Some(OrderStatus::Cancelled),
        _ => None,
    }
}

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    symbol: String,
    quantity: Decimal,
    target_price: Decimal,
    side: String,
    status: String,
    created_at: DateTime<Utc>,
}

fn order_row_to_order(row: OrderRow) -> Option<LimitOrder> {
    let side = str_to_side(&row.side)?;
    let status = str_to_status(&row.status)?;
    Some(LimitOrder {
        id: row.id,
        user_id: row.user_id,
        symbol: row.symbol,
        quantity: row.quantity,
        target_price: row.target_price,
        side,
        status,
        created_at: row.created_at,
    })
}

/// Insert a limit order (created pending).
pub async fn insert_limit_order(pool: &PgPool, order: &LimitOrder) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO limit_orders (id, user_id, symbol, quantity, target_price, side, status, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(order.id)
    .bind(order.user_id)
    .bind(&order.symbol)
    .bind(order.quantity)
    .bind(order.target_price)
    .bind(side_to_str(order.side))
    .bind(status_to_str(order.status))
    .bind(order.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Update order status (on cancel).
pub async fn update_order_status(
    pool: &PgPool,
    id: OrderId,
    status: OrderStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE limit_orders SET status = $1 WHERE id = $2")
        .bind(status_to_str(status))
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// List all limit orders, for hydration. Skips rows with an unknown side or
/// status.
pub async fn list_limit_orders(pool: &PgPool) -> Result<Vec<LimitOrder>, sqlx::Error> {
    let rows = sqlx::query_as::<_, OrderRow>(
        "SELECT id, user_id, symbol, quantity, target_price, side, status, created_at \
         FROM limit_orders ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().filter_map(order_row_to_order).collect())
}
