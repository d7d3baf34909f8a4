//! Trade persistence: the transactional trade write and hydration listing.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::types::order::TradeSide;
use crate::types::position::Position;
use crate::types::trade::Trade;

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

#[derive(Debug, FromRow)]
struct TradeRow {
    id: Uuid,
    user_id: Uuid,
    symbol: String,
    quantity: Decimal,
    price: Decimal,
    side: String,
    executed_at: DateTime<Utc>,
}

fn trade_row_to_trade(row: TradeRow) -> Option<Trade> {
    let side = str_to_side(&row.side)?;
    Some(Trade {
        id: row.id,
        user_id: row.user_id,
        symbol: row.symbol,
        quantity: row.quantity,
        price: row.price,
        side,
        executed_at: row.executed_at,
    })
}

/// List all trades in execution order, for hydration.
pub async fn list_trades(pool: &PgPool) -> Result<Vec<Trade>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TradeRow>(
        "SELECT id, user_id, symbol, quantity, price, side, executed_at \
         FROM trades ORDER BY executed_at, id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().filter_map(trade_row_to_trade).collect())
}

/// Write one executed trade as a unit: set the new balance, upsert or delete
/// the position, append the trade row. Commits together or not at all.
pub async fn apply_trade(
    pool: &PgPool,
    trade: &Trade,
    new_balance: Decimal,
    new_position: Option<&Position>,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE users SET balance = $1 WHERE id = $2")
        .bind(new_balance)
        .bind(trade.user_id)
        .execute(&mut *tx)
        .await?;

    match new_position {
        Some(position) => {
            sqlx::query(
                "INSERT INTO positions (user_id, symbol, quantity, average_price) \
                 VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (user_id, symbol) DO UPDATE SET quantity = $3, average_price = $4",
            )
            .bind(trade.user_id)
            .bind(&position.symbol)
            .bind(position.quantity)
            .bind(position.average_price)
            .execute(&mut *tx)
            .await?;
        }
        None => {
            sqlx::query("DELETE FROM positions WHERE user_id = $1 AND symbol = $2")
                .bind(trade.user_id)
                .bind(&trade.symbol)
                .execute(&mut *tx)
                .await?;
        }
    }

    sqlx::query(
        "INSERT INTO trades (id, user_id, symbol, quantity, price, side, executed_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(trade.id)
    .bind(trade.user_id)
    .bind(&trade.symbol)
    .bind(trade.quantity)
    .bind(trade.price)
    .bind(side_to_str(trade.side))
    .bind(trade.executed_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await
}
