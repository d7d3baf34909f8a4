use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::order::{Price, Qty, TradeSide};

/// An executed trade. Append-only: the audit log of the ledger, never
/// updated or deleted after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub user_id: Uuid,
    pub symbol: String,
    pub quantity: Qty,
    pub price: Price,
    pub side: TradeSide,
    pub executed_at: DateTime<Utc>,
}
