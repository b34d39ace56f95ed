//! Random-mode integration tests against the in-memory exchange double.

use oracle::context::RunContext;
use oracle::orchestrator::Orchestrator;
use oracle::settlement::FixedDelay;
use oracle::surface::mock::{mock_address, MockExchange};
use oracle::trader::{SigningKey, TraderIdentity, TraderModel};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

fn seeded_traders(exchange: &MockExchange, count: usize, wallet: u64) -> Vec<TraderModel> {
    (0..count)
        .map(|i| {
            let key = format!("0xkey{i}");
            let address = mock_address(&key);
            exchange.fund_wallet(&address, Decimal::from(wallet), Decimal::from(wallet));
            TraderModel::with_mock_balances(
                TraderIdentity::new(format!("Trader{}", i + 1), SigningKey::new(key), address),
                Decimal::from(wallet),
            )
        })
        .collect()
}

fn orchestrator(
    exchange: &Arc<MockExchange>,
    traders: Vec<TraderModel>,
    seed: u64,
) -> Orchestrator {
    Orchestrator::new(
        RunContext::immediate(MockExchange::test_market()),
        exchange.clone(),
        exchange.clone(),
        Arc::new(FixedDelay::new(Duration::ZERO)),
        traders,
        seed,
    )
}

#[tokio::test]
async fn test_seeded_run_executes_and_validates() {
    let exchange = Arc::new(MockExchange::new(MockExchange::test_market()));
    let traders = seeded_traders(&exchange, 4, 500_000);
    let mut orch = orchestrator(&exchange, traders, 7);

    let summary = orch.run_random(30).await.unwrap();

    assert_eq!(summary.operations_attempted, 30);
    assert!(summary.successes > 0);
    assert!(summary.assertions_passed > 0);
    assert_eq!(summary.operations_skipped, 0);
    // Shadow balances never go negative under gated execution.
    for trader in orch.traders() {
        assert!(trader.wallet_base >= Decimal::ZERO);
        assert!(trader.wallet_quote >= Decimal::ZERO);
        assert!(trader.deposited_base >= Decimal::ZERO);
        assert!(trader.deposited_quote >= Decimal::ZERO);
    }
}

#[tokio::test]
async fn test_same_seed_reproduces_the_run() {
    let run = |seed: u64| async move {
        let exchange = Arc::new(MockExchange::new(MockExchange::test_market()));
        let traders = seeded_traders(&exchange, 4, 500_000);
        let mut orch = orchestrator(&exchange, traders, seed);
        let summary = orch.run_random(20).await.unwrap();
        let balances: Vec<(Decimal, Decimal)> = orch
            .traders()
            .iter()
            .map(|t| (t.deposited_base, t.deposited_quote))
            .collect();
        (summary, balances, exchange.trade_count())
    };

    let (summary_a, balances_a, trades_a) = run(99).await;
    let (summary_b, balances_b, trades_b) = run(99).await;
    assert_eq!(summary_a, summary_b);
    assert_eq!(balances_a, balances_b);
    assert_eq!(trades_a, trades_b);
}

#[tokio::test]
async fn test_failing_traders_are_excluded_and_run_stops_early() {
    let exchange = Arc::new(MockExchange::new(MockExchange::test_market()));
    exchange.set_refuse_operations(true);
    let traders = seeded_traders(&exchange, 1, 500_000);
    let mut orch = orchestrator(&exchange, traders, 5);

    let summary = orch.run_random(10).await.unwrap();

    // Two refused deposits zero both wallet sides, the third pick finds no
    // valid operation: three consecutive failures, trader excluded.
    assert_eq!(summary.successes, 0);
    assert_eq!(summary.inactive_traders, 1);
    assert_eq!(summary.active_traders, 0);
    assert_eq!(summary.operations_attempted, 3);
    assert_eq!(summary.operations_skipped, 7);
}

#[tokio::test]
async fn test_offline_stack_never_crashes_the_run() {
    let exchange = Arc::new(MockExchange::new(MockExchange::test_market()));
    exchange.set_offline(true);
    let traders = seeded_traders(&exchange, 2, 500_000);
    let mut orch = orchestrator(&exchange, traders, 11);

    // Every operation fails on transport and every query round is skipped;
    // the run winds down by excluding both traders.
    let summary = orch.run_random(12).await.unwrap();
    assert_eq!(summary.successes, 0);
    assert_eq!(summary.inactive_traders, 2);
    assert!(summary.operations_skipped > 0);
}

#[tokio::test]
async fn test_excluded_trader_is_never_re_included() {
    let exchange = Arc::new(MockExchange::new(MockExchange::test_market()));
    exchange.set_refuse_operations(true);
    let traders = seeded_traders(&exchange, 1, 500_000);
    let mut orch = orchestrator(&exchange, traders, 13);

    let summary = orch.run_random(10).await.unwrap();
    assert_eq!(summary.inactive_traders, 1);
    let attempted = summary.operations_attempted;

    // Even with the stack healthy again, an excluded trader stays excluded.
    exchange.set_refuse_operations(false);
    let summary = orch.run_random(5).await.unwrap();
    assert_eq!(summary.operations_attempted, attempted);
    assert_eq!(summary.operations_skipped, 5);
    assert_eq!(summary.inactive_traders, 1);
}
