//! Concurrent trades against the same account must serialize: the balance
//! can be drained to exactly zero but never below, and a position can be
//! sold down to zero but never oversold.

use paper_exchange::error::LedgerError;
use paper_exchange::ledger::Ledger;
use paper_exchange::oracle::StaticOracle;
use paper_exchange::types::order::TradeSide;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

async fn ledger_with_price(starting_balance: Decimal, price: Decimal) -> Arc<Ledger> {
    let oracle = Arc::new(StaticOracle::new());
    oracle.set_price("AAPL", price).await;
    Arc::new(Ledger::new(
        oracle,
        None,
        starting_balance,
        Duration::from_millis(500),
    ))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_buys_drain_balance_to_exactly_zero() {
    // 10 buys of 10 shares at 10.00 each cost exactly the starting balance.
    let ledger = ledger_with_price(dec!(1000), dec!(10)).await;
    let user_id = ledger
        .register("alice", "alice@example.com", "secret123")
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger
                .execute_trade(user_id, "AAPL", dec!(10), TradeSide::Buy)
                .await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            succeeded += 1;
        }
    }

    assert_eq!(succeeded, 10);
    assert_eq!(ledger.balance(user_id).await.unwrap(), dec!(0));
    assert_eq!(
        ledger.positions(user_id).await.unwrap()[0].quantity,
        dec!(100)
    );

    // The account is empty now; one more buy must fail cleanly.
    let result = ledger
        .execute_trade(user_id, "AAPL", dec!(1), TradeSide::Buy)
        .await;
    assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sells_never_oversell() {
    let ledger = ledger_with_price(dec!(100), dec!(10)).await;
    let user_id = ledger
        .register("alice", "alice@example.com", "secret123")
        .await
        .unwrap();
    ledger
        .execute_trade(user_id, "AAPL", dec!(10), TradeSide::Buy)
        .await
        .unwrap();

    // Five concurrent sells of 4 shares against a position of 10: exactly two
    // can fill.
    let mut handles = Vec::new();
    for _ in 0..5 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger
                .execute_trade(user_id, "AAPL", dec!(4), TradeSide::Sell)
                .await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            succeeded += 1;
        }
    }

    assert_eq!(succeeded, 2);
    assert_eq!(
        ledger.positions(user_id).await.unwrap()[0].quantity,
        dec!(2)
    );
    assert_eq!(ledger.balance(user_id).await.unwrap(), dec!(80));
    assert_eq!(ledger.trades(user_id).await.unwrap().len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn users_do_not_interfere() {
    let ledger = ledger_with_price(dec!(500), dec!(10)).await;
    let alice = ledger
        .register("alice", "alice@example.com", "secret123")
        .await
        .unwrap();
    let bob = ledger
        .register("bob", "bob@example.com", "secret123")
        .await
        .unwrap();

    let mut handles = Vec::new();
    for user_id in [alice, bob] {
        for _ in 0..5 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .execute_trade(user_id, "AAPL", dec!(10), TradeSide::Buy)
                    .await
            }));
        }
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    for user_id in [alice, bob] {
        assert_eq!(ledger.balance(user_id).await.unwrap(), dec!(0));
        assert_eq!(
            ledger.positions(user_id).await.unwrap()[0].quantity,
            dec!(50)
        );
    }
}
