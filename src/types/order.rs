use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type Price = Decimal;
pub type Qty = Decimal;
pub type OrderId = Uuid;

/// Direction of a trade or limit order. Serialized lowercase ("buy"/"sell").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Limit-order lifecycle. Pending -> Cancelled by user action; Pending ->
/// Executed is reserved for a matching engine. Executed and Cancelled are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Executed,
    Cancelled,
}

/// A resting intent to trade once `target_price` is crossed. Nothing in the
/// trade path evaluates these; they only change status via cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitOrder {
    pub id: OrderId,
    pub user_id: Uuid,
    pub symbol: String,
    pub quantity: Qty,
    pub target_price: Price,
    pub side: TradeSide,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}
