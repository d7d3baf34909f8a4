//! Price lookup behavior seen through the ledger: timeout enforcement, the
//! single retry on transient failure, and partial valuation results.

use async_trait::async_trait;
use paper_exchange::error::LedgerError;
use paper_exchange::ledger::Ledger;
use paper_exchange::oracle::{OracleError, PriceOracle, StaticOracle};
use paper_exchange::types::order::TradeSide;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Fails with a transient error on the first call, then serves a fixed price.
struct FlakyOracle {
    calls: AtomicUsize,
    price: Decimal,
}

#[async_trait]
impl PriceOracle for FlakyOracle {
    async fn price(&self, _symbol: &str) -> Result<Decimal, OracleError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(OracleError::TemporarilyUnavailable("feed hiccup".to_string()))
        } else {
            Ok(self.price)
        }
    }
}

/// Always down; counts calls so tests can assert the retry budget.
struct DownOracle {
    calls: AtomicUsize,
    error: OracleError,
}

#[async_trait]
impl PriceOracle for DownOracle {
    async fn price(&self, _symbol: &str) -> Result<Decimal, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

/// Never answers within any reasonable deadline.
struct StalledOracle;

#[async_trait]
impl PriceOracle for StalledOracle {
    async fn price(&self, _symbol: &str) -> Result<Decimal, OracleError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(dec!(1))
    }
}

async fn register_alice(ledger: &Ledger) -> Uuid {
    ledger
        .register("alice", "alice@example.com", "secret123")
        .await
        .unwrap()
}

#[tokio::test]
async fn transient_failure_is_retried_once_and_succeeds() {
    let oracle = Arc::new(FlakyOracle {
        calls: AtomicUsize::new(0),
        price: dec!(50),
    });
    let ledger = Ledger::new(
        oracle.clone(),
        None,
        dec!(1000),
        Duration::from_millis(500),
    );
    let user_id = register_alice(&ledger).await;

    let receipt = ledger
        .execute_trade(user_id, "AAPL", dec!(2), TradeSide::Buy)
        .await
        .unwrap();

    assert_eq!(receipt.price, dec!(50));
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn persistent_failure_surfaces_after_one_retry() {
    let oracle = Arc::new(DownOracle {
        calls: AtomicUsize::new(0),
        error: OracleError::TemporarilyUnavailable("maintenance".to_string()),
    });
    let ledger = Ledger::new(
        oracle.clone(),
        None,
        dec!(1000),
        Duration::from_millis(500),
    );
    let user_id = register_alice(&ledger).await;

    let result = ledger
        .execute_trade(user_id, "AAPL", dec!(2), TradeSide::Buy)
        .await;

    assert!(matches!(
        result,
        Err(LedgerError::PriceUnavailable { .. })
    ));
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 2);
    assert_eq!(ledger.balance(user_id).await.unwrap(), dec!(1000));
}

#[tokio::test]
async fn unknown_symbol_is_not_retried() {
    let oracle = Arc::new(DownOracle {
        calls: AtomicUsize::new(0),
        error: OracleError::SymbolNotFound("NOPE".to_string()),
    });
    let ledger = Ledger::new(
        oracle.clone(),
        None,
        dec!(1000),
        Duration::from_millis(500),
    );
    let user_id = register_alice(&ledger).await;

    let result = ledger
        .execute_trade(user_id, "NOPE", dec!(1), TradeSide::Buy)
        .await;

    assert!(matches!(
        result,
        Err(LedgerError::PriceUnavailable { .. })
    ));
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stalled_lookup_times_out() {
    let ledger = Ledger::new(
        Arc::new(StalledOracle),
        None,
        dec!(1000),
        Duration::from_millis(50),
    );
    let user_id = register_alice(&ledger).await;

    let started = Instant::now();
    let result = ledger
        .execute_trade(user_id, "AAPL", dec!(1), TradeSide::Buy)
        .await;

    assert!(matches!(
        result,
        Err(LedgerError::PriceUnavailable { .. })
    ));
    // Two bounded attempts plus the retry backoff, nowhere near the 60s stall.
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn valuation_skips_symbols_without_a_price() {
    let oracle = Arc::new(StaticOracle::new());
    oracle.set_price("AAPL", dec!(150)).await;
    oracle.set_price("MSFT", dec!(300)).await;
    let ledger = Ledger::new(
        oracle.clone(),
        None,
        dec!(100000.00),
        Duration::from_millis(500),
    );
    let user_id = register_alice(&ledger).await;
    ledger
        .execute_trade(user_id, "AAPL", dec!(10), TradeSide::Buy)
        .await
        .unwrap();
    ledger
        .execute_trade(user_id, "MSFT", dec!(2), TradeSide::Buy)
        .await
        .unwrap();

    oracle.remove_price("MSFT").await;
    let valuation = ledger.portfolio_valuation(user_id).await.unwrap();

    assert_eq!(valuation.len(), 1);
    assert_eq!(valuation[0].symbol, "AAPL");
    assert_eq!(valuation[0].quantity, dec!(10));
    assert_eq!(valuation[0].current_price, dec!(150));
    assert_eq!(valuation[0].market_value, dec!(1500));
}

#[tokio::test]
async fn valuation_marks_to_the_current_price() {
    let oracle = Arc::new(StaticOracle::new());
    oracle.set_price("AAPL", dec!(100)).await;
    let ledger = Ledger::new(
        oracle.clone(),
        None,
        dec!(100000.00),
        Duration::from_millis(500),
    );
    let user_id = register_alice(&ledger).await;
    ledger
        .execute_trade(user_id, "AAPL", dec!(10), TradeSide::Buy)
        .await
        .unwrap();

    oracle.set_price("AAPL", dec!(120)).await;
    let valuation = ledger.portfolio_valuation(user_id).await.unwrap();

    assert_eq!(valuation[0].current_price, dec!(120));
    assert_eq!(valuation[0].market_value, dec!(1200));
}

#[tokio::test]
async fn valuation_is_empty_for_a_fresh_account() {
    let ledger = Ledger::new(
        Arc::new(StaticOracle::new()),
        None,
        dec!(100000.00),
        Duration::from_millis(500),
    );
    let user_id = register_alice(&ledger).await;

    let valuation = ledger.portfolio_valuation(user_id).await.unwrap();
    assert!(valuation.is_empty());
}
