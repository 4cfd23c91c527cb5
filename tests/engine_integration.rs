//! End-to-end engine tests over scripted mocks: full position lifecycle
//! with durable state and alerts, and kill-switch behavior across a
//! process restart (simulated by reloading the state file).

use std::path::PathBuf;
use std::sync::Arc;

use riptide_trader::application::Orchestrator;
use riptide_trader::config::Config;
use riptide_trader::domain::{AlertSink, CloseReason, PortfolioStore};
use riptide_trader::ports::{
    ExecutionPort, MarketDataPort, MockExecution, MockMarketData, PerpExecutionPort, TokenSnapshot,
    TxnCounts,
};
use riptide_trader::strategy::Strategy;

fn hot_candidate(mint: &str, price: f64) -> TokenSnapshot {
    TokenSnapshot {
        token: mint.to_uppercase(),
        mint: mint.to_string(),
        price,
        liquidity_usd: 1_500_000.0,
        volume_24h: 800_000.0,
        volume_6h: 400_000.0,
        volume_1h: 150_000.0,
        price_change_24h: 12.0,
        price_change_6h: 6.0,
        price_change_1h: 6.0,
        txns_24h: TxnCounts {
            buys: 700,
            sells: 300,
        },
    }
}

struct Harness {
    market: Arc<MockMarketData>,
    execution: Arc<MockExecution>,
    orchestrator: Orchestrator,
    state_path: PathBuf,
    alerts_path: PathBuf,
    _dir: tempfile::TempDir,
}

fn harness(capital: f64) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    let alerts_path = dir.path().join("alerts.jsonl");

    let market = Arc::new(MockMarketData::new());
    market.set_series(vec![1.0; 24]); // neutral regime
    let execution = Arc::new(MockExecution::new());

    let store = PortfolioStore::load_or_default(state_path.clone(), capital);
    let alerts = AlertSink::new(alerts_path.clone());
    let orchestrator = Orchestrator::new(
        Config::default(),
        Arc::clone(&market) as Arc<dyn MarketDataPort>,
        Arc::clone(&execution) as Arc<dyn ExecutionPort>,
        Arc::clone(&execution) as Arc<dyn PerpExecutionPort>,
        store,
        alerts,
    );

    Harness {
        market,
        execution,
        orchestrator,
        state_path,
        alerts_path,
        _dir: dir,
    }
}

#[tokio::test]
async fn test_full_lifecycle_stop_loss_with_persistence_and_alerts() {
    let h = harness(100.0);
    h.market.set_candidates(vec![hot_candidate("mint-a", 1.0)]);
    h.market.set_price("mint-a", 1.0);
    h.execution.set_price("mint-a", 1.0);

    h.orchestrator.scan_cycle().await;

    let spent = {
        let store = h.orchestrator.store();
        let store = store.lock().await;
        assert_eq!(store.portfolio().positions.len(), 1);
        100.0 - store.portfolio().capital_usdc
    };
    assert!(spent >= 5.0 && spent <= 50.0);

    // The open was written to disk before the crash window
    let raw = std::fs::read_to_string(&h.state_path).unwrap();
    assert!(raw.contains("mint-a"));

    // Price halves: stop loss fires on review
    h.market.set_price("mint-a", 0.5);
    h.execution.set_price("mint-a", 0.5);
    h.orchestrator.review_cycle().await;

    {
        let store = h.orchestrator.store();
        let store = store.lock().await;
        assert!(store.portfolio().positions.is_empty());
        let trade = &store.portfolio().closed_trades[0];
        assert_eq!(trade.reason, CloseReason::StopLoss);
        assert_eq!(trade.strategy, Strategy::Momentum);
        assert!(trade.pnl < 0.0);
        // Proceeds at half the entry price: lost half of what was spent
        assert!((trade.pnl + spent / 2.0).abs() < 1e-9);
        assert!(
            (store.portfolio().capital_usdc - (100.0 - spent / 2.0)).abs() < 1e-9
        );
    }

    // A fresh load sees the same history
    let reloaded = PortfolioStore::load_or_default(h.state_path.clone(), 100.0);
    assert_eq!(reloaded.portfolio().closed_trades.len(), 1);
    assert!(!reloaded.portfolio().kill_switch_triggered);

    // Both lifecycle events were alerted
    let alerts = std::fs::read_to_string(&h.alerts_path).unwrap();
    assert!(alerts.contains("TRADE_OPENED"));
    assert!(alerts.contains("TRADE_CLOSED"));
    assert!(alerts.contains("STOP_LOSS"));
}

#[tokio::test]
async fn test_take_profit_realizes_gain() {
    let h = harness(100.0);
    h.market.set_candidates(vec![hot_candidate("mint-a", 1.0)]);
    h.market.set_price("mint-a", 1.0);
    h.execution.set_price("mint-a", 1.0);

    h.orchestrator.scan_cycle().await;

    // +40% blows through the +30% target
    h.market.set_price("mint-a", 1.4);
    h.execution.set_price("mint-a", 1.4);
    h.orchestrator.review_cycle().await;

    let store = h.orchestrator.store();
    let store = store.lock().await;
    let trade = &store.portfolio().closed_trades[0];
    assert_eq!(trade.reason, CloseReason::TakeProfit);
    assert!(trade.pnl > 0.0);
    assert!(store.portfolio().capital_usdc > 100.0);
}

#[tokio::test]
async fn test_kill_switch_survives_restart_and_blocks_entries() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");

    {
        let mut store = PortfolioStore::load_or_default(state_path.clone(), 100.0);
        store
            .open_long(
                "X",
                "mint-x",
                1.0,
                50.0,
                50.0,
                0.85,
                1.30,
                Strategy::Momentum,
                80.0,
                1_000,
            )
            .unwrap();
        // Lose 40% of the book: past the -30% threshold
        store
            .close_long("pos-1", 0.2, 10.0, CloseReason::StopLoss, 2_000)
            .unwrap();
        store.trip_kill_switch();
    }

    // Restart: the latch came back from disk
    let market = Arc::new(MockMarketData::new());
    market.set_candidates(vec![hot_candidate("mint-a", 1.0)]);
    market.set_series(vec![1.0; 24]);
    let execution = Arc::new(MockExecution::new());
    execution.set_price("mint-a", 1.0);

    let store = PortfolioStore::load_or_default(state_path, 100.0);
    assert!(store.portfolio().kill_switch_triggered);

    let orchestrator = Orchestrator::new(
        Config::default(),
        Arc::clone(&market) as Arc<dyn MarketDataPort>,
        Arc::clone(&execution) as Arc<dyn ExecutionPort>,
        Arc::clone(&execution) as Arc<dyn PerpExecutionPort>,
        store,
        AlertSink::disabled(),
    );
    orchestrator.scan_cycle().await;

    assert!(execution.buys().is_empty());
    let store = orchestrator.store();
    let store = store.lock().await;
    assert!(store.portfolio().positions.is_empty());
}

#[tokio::test]
async fn test_grid_state_survives_restart() {
    let h = harness(100.0);
    let stable = TokenSnapshot {
        liquidity_usd: 5_000_000.0,
        price_change_24h: 1.0,
        ..hot_candidate("mint-g", 100.0)
    };
    h.market.set_candidates(vec![stable]);
    h.market.set_price("mint-g", 100.0);
    h.execution.set_price("mint-g", 100.0);

    h.orchestrator.grid_cycle().await;
    h.market.set_price("mint-g", 97.5);
    h.execution.set_price("mint-g", 97.5);
    h.orchestrator.grid_cycle().await;

    {
        let store = h.orchestrator.store();
        let store = store.lock().await;
        assert_eq!(store.grid().tokens["mint-g"].filled_buys.len(), 1);
    }

    let reloaded = PortfolioStore::load_or_default(h.state_path.clone(), 100.0);
    let grid = reloaded.grid();
    assert_eq!(grid.tokens["mint-g"].filled_buys.len(), 1);
    assert!(grid.tokens["mint-g"].active);
    assert_eq!(grid.tokens["mint-g"].grid_levels.len(), 7);
}
