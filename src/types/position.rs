use serde::{Deserialize, Serialize};

use crate::types::order::{Price, Qty};

/// Holding per (user, symbol). Quantity never goes negative; a position is
/// removed from the account once it reaches zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: Qty,
    pub average_price: Price,
}
