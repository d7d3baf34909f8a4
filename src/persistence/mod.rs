//! Database layer: pool, migrations, and access for users, trades, positions
//! and limit orders. The in-memory ledger is authoritative at runtime; these
//! functions provide durability and startup hydration.

mod orders;
mod pool;
mod positions;
mod trades;
mod users;

pub use orders::{insert_limit_order, list_limit_orders, update_order_status};
pub use pool::{create_pool_and_migrate, run_migrations};
pub use positions::{PositionRow, list_positions};
pub use sqlx::PgPool;
pub use trades::{apply_trade, list_trades};
pub use users::{insert_user, list_users};
