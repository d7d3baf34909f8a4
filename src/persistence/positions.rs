//! Position persistence: hydration listing. Writes happen inside the trade
//! transaction (see trades::apply_trade).

use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, FromRow)]
pub struct PositionRow {
    pub user_id: Uuid,
    pub symbol: String,
    pub quantity: Decimal,
    pub average_price: Decimal,
}

/// List all positions, for hydration.
pub async fn list_positions(pool: &PgPool) -> Result<Vec<PositionRow>, sqlx::Error> {
    let rows = sqlx::query_as::<_, PositionRow>(
        "SELECT user_id, symbol, quantity, average_price FROM positions",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
