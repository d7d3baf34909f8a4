//! Core ledger: accounts, trade execution, valuation, performance and limit
//! orders. In-memory state is authoritative at runtime; when a Postgres pool
//! is attached every mutation is committed to the store before memory is
//! touched, so a rejected write leaves both sides unchanged.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::oracle::{OracleError, PriceOracle};
use crate::persistence;
use crate::types::order::{LimitOrder, OrderId, OrderStatus, Price, Qty, TradeSide};
use crate::types::position::Position;
use crate::types::trade::Trade;
use crate::types::user::User;

const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Everything owned by one user. Guarded by a per-account mutex so that
/// concurrent trades for the same user serialize; other users are unaffected.
#[derive(Debug)]
struct Account {
    user: User,
    positions: HashMap<String, Position>,
    trades: Vec<Trade>,
    orders: HashMap<OrderId, LimitOrder>,
}

impl Account {
    fn new(user: User) -> Self {
        Self {
            user,
            positions: HashMap::new(),
            trades: Vec::new(),
            orders: HashMap::new(),
        }
    }
}

/// Uniqueness indexes for registration and login (keys are lowercase).
#[derive(Default)]
struct Directory {
    by_username: HashMap<String, Uuid>,
    by_email: HashMap<String, Uuid>,
}

pub struct Ledger {
    accounts: RwLock<HashMap<Uuid, Arc<Mutex<Account>>>>,
    directory: RwLock<Directory>,
    oracle: Arc<dyn PriceOracle>,
    db: Option<PgPool>,
    starting_balance: Decimal,
    oracle_timeout: Duration,
}

/// What the caller gets back from a successful `execute_trade`.
#[derive(Debug, Clone, Serialize)]
pub struct TradeReceipt {
    pub trade_id: Uuid,
    pub price: Price,
    pub total: Decimal,
}

/// One row of a portfolio valuation, marked to the current oracle price.
#[derive(Debug, Clone, Serialize)]
pub struct PositionValuation {
    pub symbol: String,
    pub quantity: Qty,
    pub current_price: Price,
    pub market_value: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PerformanceReport {
    pub total_trades: usize,
    pub profitable_trades: usize,
    pub total_profit_loss: Decimal,
}

impl Ledger {
    pub fn new(
        oracle: Arc<dyn PriceOracle>,
        db: Option<PgPool>,
        starting_balance: Decimal,
        oracle_timeout: Duration,
    ) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            directory: RwLock::new(Directory::default()),
            oracle,
            db,
            starting_balance,
            oracle_timeout,
        }
    }

    /// Load users, positions, trades and limit orders from the store into
    /// memory. Called once at startup, before the ledger serves requests.
    pub async fn hydrate(&self) -> Result<(), LedgerError> {
        let Some(pool) = &self.db else {
            return Ok(());
        };

        let mut directory = self.directory.write().await;
        let mut accounts = self.accounts.write().await;
        for user in persistence::list_users(pool).await? {
            directory.by_username.insert(user.username.clone(), user.id);
            directory.by_email.insert(user.email.clone(), user.id);
            accounts.insert(user.id, Arc::new(Mutex::new(Account::new(user))));
        }
        for row in persistence::list_positions(pool).await? {
            if let Some(account) = accounts.get(&row.user_id) {
                account.lock().await.positions.insert(
                    row.symbol.clone(),
                    Position {
                        symbol: row.symbol,
                        quantity: row.quantity,
                        average_price: row.average_price,
                    },
                );
            }
        }
        for trade in persistence::list_trades(pool).await? {
            if let Some(account) = accounts.get(&trade.user_id) {
                account.lock().await.trades.push(trade);
            }
        }
        for order in persistence::list_limit_orders(pool).await? {
            if let Some(account) = accounts.get(&order.user_id) {
                account.lock().await.orders.insert(order.id, order);
            }
        }

        info!(users = accounts.len(), "hydrated ledger from store");
        Ok(())
    }

    /// Create a user with the configured starting balance. Username and email
    /// are normalized to lowercase and must both be unused.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Uuid, LedgerError> {
        let username = username.trim().to_lowercase();
        let email = email.trim().to_lowercase();
        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(LedgerError::Validation(
                "username, email and password are required".to_string(),
            ));
        }
        let password_hash = hash_password(password)?;

        // The directory write lock is held across the store insert so two
        // registrations for the same name cannot interleave.
        let mut directory = self.directory.write().await;
        if directory.by_username.contains_key(&username)
            || directory.by_email.contains_key(&email)
        {
            return Err(LedgerError::DuplicateUser);
        }

        let user = User {
            id: Uuid::new_v4(),
            username: username.clone(),
            email: email.clone(),
            password_hash,
            balance: self.starting_balance,
            created_at: Utc::now(),
        };

        if let Some(pool) = &self.db {
            persistence::insert_user(pool, &user)
                .await
                .map_err(map_unique_violation)?;
        }

        let user_id = user.id;
        directory.by_username.insert(username, user_id);
        directory.by_email.insert(email, user_id);
        self.accounts
            .write()
            .await
            .insert(user_id, Arc::new(Mutex::new(Account::new(user))));

        info!(%user_id, "registered user");
        Ok(user_id)
    }

    /// Password login. Unknown username and wrong password are
    /// indistinguishable to the caller.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Uuid, LedgerError> {
        let username = username.trim().to_lowercase();
        let user_id = self
            .directory
            .read()
            .await
            .by_username
            .get(&username)
            .copied()
            .ok_or(LedgerError::InvalidCredentials)?;

        let account = self
            .account(user_id)
            .await
            .map_err(|_| LedgerError::InvalidCredentials)?;
        let account = account.lock().await;
        verify_password(password, &account.user.password_hash)?;
        Ok(user_id)
    }

    /// Execute a market buy or sell at the current oracle price.
    ///
    /// Balance update, position update and the trade record are applied as a
    /// single unit; on any failure the account is left exactly as it was.
    pub async fn execute_trade(
        &self,
        user_id: Uuid,
        symbol: &str,
        quantity: Qty,
        side: TradeSide,
    ) -> Result<TradeReceipt, LedgerError> {
        let symbol = normalize_symbol(symbol)?;
        if quantity <= Decimal::ZERO {
            return Err(LedgerError::Validation(
                "quantity must be positive".to_string(),
            ));
        }

        // The oracle round-trip happens before the account lock is taken; a
        // slow quote service must not block the account.
        let price = self.quote(&symbol).await?;
        let total = price * quantity;

        let account = self.account(user_id).await?;
        let mut account = account.lock().await;

        let (new_balance, new_position) = match side {
            TradeSide::Buy => {
                if account.user.balance < total {
                    return Err(LedgerError::InsufficientFunds {
                        needed: total,
                        available: account.user.balance,
                    });
                }
                let position = match account.positions.get(&symbol) {
                    Some(held) => {
                        let new_qty = held.quantity + quantity;
                        let new_avg =
                            (held.average_price * held.quantity + price * quantity) / new_qty;
                        Position {
                            symbol: symbol.clone(),
                            quantity: new_qty,
                            average_price: new_avg,
                        }
                    }
                    None => Position {
                        symbol: symbol.clone(),
                        quantity,
                        average_price: price,
                    },
                };
                (account.user.balance - total, Some(position))
            }
            TradeSide::Sell => {
                let held = account
                    .positions
                    .get(&symbol)
                    .ok_or_else(|| LedgerError::NoPosition {
                        symbol: symbol.clone(),
                    })?;
                if held.quantity < quantity {
                    return Err(LedgerError::InsufficientShares {
                        symbol: symbol.clone(),
                        held: held.quantity,
                        requested: quantity,
                    });
                }
                let remaining = held.quantity - quantity;
                let position = (remaining > Decimal::ZERO).then(|| Position {
                    symbol: symbol.clone(),
                    quantity: remaining,
                    average_price: held.average_price,
                });
                (account.user.balance + total, position)
            }
        };

        let trade = Trade {
            id: Uuid::new_v4(),
            user_id,
            symbol: symbol.clone(),
            quantity,
            price,
            side,
            executed_at: Utc::now(),
        };

        if let Some(pool) = &self.db {
            persistence::apply_trade(pool, &trade, new_balance, new_position.as_ref()).await?;
        }

        account.user.balance = new_balance;
        match new_position {
            Some(position) => {
                account.positions.insert(symbol.clone(), position);
            }
            None => {
                account.positions.remove(&symbol);
            }
        }
        let trade_id = trade.id;
        account.trades.push(trade);

        info!(%user_id, %symbol, ?side, %quantity, %price, "executed trade");
        Ok(TradeReceipt {
            trade_id,
            price,
            total,
        })
    }

    /// Mark every open position to the current oracle price. A symbol whose
    /// lookup fails is skipped with a warning rather than failing the call.
    pub async fn portfolio_valuation(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<PositionValuation>, LedgerError> {
        let account = self.account(user_id).await?;
        let mut positions: Vec<Position> =
            { account.lock().await.positions.values().cloned().collect() };
        positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        let mut rows = Vec::with_capacity(positions.len());
        for position in positions
            .into_iter()
            .filter(|p| p.quantity > Decimal::ZERO)
        {
            match self.quote(&position.symbol).await {
                Ok(current_price) => rows.push(PositionValuation {
                    market_value: current_price * position.quantity,
                    symbol: position.symbol,
                    quantity: position.quantity,
                    current_price,
                }),
                Err(error) => {
                    warn!(symbol = %position.symbol, %error, "skipping unpriceable position");
                }
            }
        }
        Ok(rows)
    }

    /// Aggregate profit/loss from the trade log.
    ///
    /// Matching is deliberately naive, preserved from the system this
    /// replaces: every sell is compared against the FIRST buy ever recorded
    /// for its symbol, with no lot depletion. Not true realized P&L.
    pub async fn performance(&self, user_id: Uuid) -> Result<PerformanceReport, LedgerError> {
        let account = self.account(user_id).await?;
        let account = account.lock().await;

        let mut report = PerformanceReport {
            total_trades: account.trades.len(),
            ..Default::default()
        };
        for sell in account.trades.iter().filter(|t| t.side == TradeSide::Sell) {
            let first_buy = account
                .trades
                .iter()
                .find(|t| t.side == TradeSide::Buy && t.symbol == sell.symbol);
            if let Some(buy) = first_buy {
                let profit = (sell.price - buy.price) * sell.quantity;
                report.total_profit_loss += profit;
                if profit > Decimal::ZERO {
                    report.profitable_trades += 1;
                }
            }
        }
        Ok(report)
    }

    /// Record a pending limit order. No matching loop evaluates these; the
    /// order rests until cancelled.
    pub async fn place_limit_order(
        &self,
        user_id: Uuid,
        symbol: &str,
        quantity: Qty,
        target_price: Price,
        side: TradeSide,
    ) -> Result<OrderId, LedgerError> {
        let symbol = normalize_symbol(symbol)?;
        if quantity <= Decimal::ZERO {
            return Err(LedgerError::Validation(
                "quantity must be positive".to_string(),
            ));
        }
        if target_price <= Decimal::ZERO {
            return Err(LedgerError::Validation(
                "target price must be positive".to_string(),
            ));
        }

        let account = self.account(user_id).await?;
        let mut account = account.lock().await;

        let order = LimitOrder {
            id: Uuid::new_v4(),
            user_id,
            symbol,
            quantity,
            target_price,
            side,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        };

        if let Some(pool) = &self.db {
            persistence::insert_limit_order(pool, &order).await?;
        }

        let order_id = order.id;
        account.orders.insert(order_id, order);
        info!(%user_id, %order_id, "placed limit order");
        Ok(order_id)
    }

    /// Pending -> Cancelled. Executed and Cancelled orders are terminal.
    pub async fn cancel_limit_order(
        &self,
        user_id: Uuid,
        order_id: OrderId,
    ) -> Result<(), LedgerError> {
        let account = self.account(user_id).await?;
        let mut account = account.lock().await;

        let order = account
            .orders
            .get_mut(&order_id)
            .ok_or(LedgerError::OrderNotFound)?;
        if order.status != OrderStatus::Pending {
            return Err(LedgerError::OrderClosed {
                status: order.status,
            });
        }

        if let Some(pool) = &self.db {
            persistence::update_order_status(pool, order_id, OrderStatus::Cancelled).await?;
        }

        order.status = OrderStatus::Cancelled;
        info!(%user_id, %order_id, "cancelled limit order");
        Ok(())
    }

    pub async fn balance(&self, user_id: Uuid) -> Result<Decimal, LedgerError> {
        let account = self.account(user_id).await?;
        let balance = account.lock().await.user.balance;
        Ok(balance)
    }

    /// Open positions ordered by symbol.
    pub async fn positions(&self, user_id: Uuid) -> Result<Vec<Position>, LedgerError> {
        let account = self.account(user_id).await?;
        let mut positions: Vec<Position> =
            { account.lock().await.positions.values().cloned().collect() };
        positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(positions)
    }

    /// Trade log in execution order.
    pub async fn trades(&self, user_id: Uuid) -> Result<Vec<Trade>, LedgerError> {
        let account = self.account(user_id).await?;
        let trades = account.lock().await.trades.clone();
        Ok(trades)
    }

    pub async fn limit_order(
        &self,
        user_id: Uuid,
        order_id: OrderId,
    ) -> Result<LimitOrder, LedgerError> {
        let account = self.account(user_id).await?;
        let order = account
            .lock()
            .await
            .orders
            .get(&order_id)
            .cloned()
            .ok_or(LedgerError::OrderNotFound)?;
        Ok(order)
    }

    async fn account(&self, user_id: Uuid) -> Result<Arc<Mutex<Account>>, LedgerError> {
        self.accounts
            .read()
            .await
            .get(&user_id)
            .cloned()
            .ok_or(LedgerError::UserNotFound)
    }

    /// Bounded price lookup. A transient failure is retried once after a
    /// short backoff; `SymbolNotFound` surfaces immediately.
    async fn quote(&self, symbol: &str) -> Result<Price, LedgerError> {
        match self.quote_once(symbol).await {
            Err(OracleError::TemporarilyUnavailable(reason)) => {
                warn!(symbol, %reason, "price lookup failed, retrying once");
                tokio::time::sleep(RETRY_BACKOFF).await;
                self.quote_once(symbol).await
            }
            other => other,
        }
        .map_err(|source| LedgerError::PriceUnavailable {
            symbol: symbol.to_string(),
            source,
        })
    }

    async fn quote_once(&self, symbol: &str) -> Result<Price, OracleError> {
        match tokio::time::timeout(self.oracle_timeout, self.oracle.price(symbol)).await {
            Ok(result) => result,
            Err(_) => Err(OracleError::TemporarilyUnavailable(format!(
                "price lookup timed out after {}ms",
                self.oracle_timeout.as_millis()
            ))),
        }
    }
}

fn normalize_symbol(symbol: &str) -> Result<String, LedgerError> {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(LedgerError::Validation("symbol is required".to_string()));
    }
    Ok(symbol)
}

fn hash_password(password: &str) -> Result<String, LedgerError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| LedgerError::PasswordHash(e.to_string()))
}

fn verify_password(password: &str, stored_hash: &str) -> Result<(), LedgerError> {
    let parsed =
        PasswordHash::new(stored_hash).map_err(|e| LedgerError::PasswordHash(e.to_string()))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| LedgerError::InvalidCredentials)
}

fn map_unique_violation(error: sqlx::Error) -> LedgerError {
    if error
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation())
    {
        LedgerError::DuplicateUser
    } else {
        LedgerError::Internal(error)
    }
}
