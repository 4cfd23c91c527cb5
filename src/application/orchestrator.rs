//! Orchestrator
//!
//! Owns the three periodic cycles (scan for entries, review open
//! positions, run the grid) and the shared portfolio store. The store
//! sits behind one async mutex; every cycle takes the lock for its
//! mutating section so gate checks and executions are never interleaved
//! with another cycle's writes. A cycle failure is logged and the loop
//! keeps running; only shutdown stops it.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::{Mutex, Notify};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::domain::{
    AlertSink, CloseReason, GridAction, GridEngine, OpenPosition, PortfolioStore, RiskManager,
    MIN_TRADE_USDC,
};
use crate::ports::{ExecutionPort, MarketDataPort, PerpExecutionPort, TokenSnapshot};
use crate::strategy::{Signal, SignalEngine, Strategy, TrendFilter};

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Wires the engine together and runs the trading loop.
pub struct Orchestrator {
    config: Config,
    market: Arc<dyn MarketDataPort>,
    execution: Arc<dyn ExecutionPort>,
    perps: Arc<dyn PerpExecutionPort>,
    store: Arc<Mutex<PortfolioStore>>,
    signals: Mutex<SignalEngine>,
    trend: TrendFilter,
    risk: RiskManager,
    grid: GridEngine,
    alerts: AlertSink,
    shutdown: Arc<Notify>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        market: Arc<dyn MarketDataPort>,
        execution: Arc<dyn ExecutionPort>,
        perps: Arc<dyn PerpExecutionPort>,
        store: PortfolioStore,
        alerts: AlertSink,
    ) -> Self {
        let signals = Mutex::new(SignalEngine::new(config.signal_config()));
        let trend = TrendFilter::new(config.trend_config(), Arc::clone(&market));
        let risk = RiskManager::new(config.risk.clone());
        let grid = GridEngine::new(config.grid.clone());
        Self {
            config,
            market,
            execution,
            perps,
            store: Arc::new(Mutex::new(store)),
            signals,
            trend,
            risk,
            grid,
            alerts,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Handle that stops the loop from another task.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    pub fn store(&self) -> Arc<Mutex<PortfolioStore>> {
        Arc::clone(&self.store)
    }

    /// Run until shutdown is signalled. Cycles never overlap; the first
    /// tick of each interval fires immediately on start.
    pub async fn run(&self) {
        let mut scan = tokio::time::interval(Duration::from_secs(
            self.config.scheduler.scan_interval_secs,
        ));
        let mut review = tokio::time::interval(Duration::from_secs(
            self.config.scheduler.review_interval_secs,
        ));
        let mut grid = tokio::time::interval(Duration::from_secs(
            self.config.scheduler.grid_interval_secs,
        ));
        scan.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        review.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        grid.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(
            "trading loop started (scan {}s, review {}s, grid {}s)",
            self.config.scheduler.scan_interval_secs,
            self.config.scheduler.review_interval_secs,
            self.config.scheduler.grid_interval_secs
        );

        loop {
            tokio::select! {
                _ = scan.tick() => self.scan_cycle().await,
                _ = review.tick() => self.review_cycle().await,
                _ = grid.tick() => self.grid_cycle().await,
                _ = self.shutdown.notified() => break,
            }
        }

        let mut store = self.store.lock().await;
        store.persist();
        info!("trading loop stopped, state saved");
    }

    async fn inter_trade_delay(&self) {
        let ms = self.config.scheduler.inter_trade_delay_ms;
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    /// Scan cycle: discover candidates, score them, act on qualifying
    /// signals subject to the regime filter and the risk gate.
    pub async fn scan_cycle(&self) {
        let candidates = match self.market.discover_candidates().await {
            Ok(c) => c,
            Err(e) => {
                warn!("scan skipped, discovery failed: {}", e);
                return;
            }
        };
        if candidates.is_empty() {
            debug!("scan found no candidates");
            return;
        }

        let now = unix_now();
        let signals = {
            let mut engine = self.signals.lock().await;
            engine.detect_signals(&candidates, now)
        };
        if signals.is_empty() {
            return;
        }

        let regime = self.trend.regime().await;
        debug!("scan: {} signals, regime {:?}", signals.len(), regime);

        for signal in signals {
            match signal.strategy {
                Strategy::MeanReversion if !regime.allows_mean_reversion_long() => {
                    if self.config.shorts.enabled {
                        self.try_open_short(&signal).await;
                    } else {
                        debug!(
                            "skipping {} meanReversion long in downtrend",
                            signal.token
                        );
                    }
                }
                _ => self.try_open_long(&signal).await,
            }
        }
    }

    async fn try_open_long(&self, signal: &Signal) {
        let mut store = self.store.lock().await;
        if store.portfolio().find_by_mint(&signal.mint).is_some() {
            debug!("already holding {}, skipping", signal.token);
            return;
        }

        let size = self.risk.calculate_position_size(&mut store, signal.score);
        if size < MIN_TRADE_USDC {
            debug!("gate denied or size too small for {}", signal.token);
            return;
        }

        let fill = match self.execution.buy(&signal.mint, size).await {
            Ok(f) => f,
            Err(e) => {
                warn!("buy failed for {}: {}", signal.token, e);
                return;
            }
        };

        let sltp = self.risk.calculate_sl_tp(fill.price, signal.strategy);
        match store.open_long(
            &signal.token,
            &signal.mint,
            fill.price,
            fill.output_amount,
            size,
            sltp.stop_loss,
            sltp.take_profit,
            signal.strategy,
            signal.score,
            unix_now(),
        ) {
            Ok(id) => {
                self.alerts.emit(
                    "TRADE_OPENED",
                    &format!("{} {} opened", signal.strategy, signal.token),
                    serde_json::json!({
                        "id": id,
                        "mint": signal.mint,
                        "price": fill.price,
                        "size_usdc": size,
                        "score": signal.score,
                        "tx_id": fill.tx_id,
                    }),
                );
            }
            Err(e) => error!("recording {} buy failed: {}", signal.token, e),
        }
        drop(store);
        self.inter_trade_delay().await;
    }

    /// Short entry for a mean-reversion signal blocked by a downtrend.
    async fn try_open_short(&self, signal: &Signal) {
        let mut store = self.store.lock().await;
        if store.portfolio().find_by_mint(&signal.mint).is_some() {
            return;
        }

        let size = self.risk.calculate_position_size(&mut store, signal.score);
        if size < MIN_TRADE_USDC {
            return;
        }

        let market = format!("{}{}", signal.token, self.config.shorts.market_suffix);
        let leverage = self.config.shorts.leverage;
        let fill = match self
            .perps
            .open_short(&market, &signal.mint, size, leverage)
            .await
        {
            Ok(f) => f,
            Err(e) => {
                warn!("short open failed for {}: {}", market, e);
                return;
            }
        };

        let sltp = self.risk.calculate_short_sl_tp(fill.entry_price);
        match store.open_short(
            &signal.token,
            &signal.mint,
            &market,
            fill.entry_price,
            fill.base_amount,
            size,
            leverage,
            sltp.stop_loss,
            sltp.take_profit,
            signal.strategy,
            signal.score,
            unix_now(),
        ) {
            Ok(id) => {
                self.alerts.emit(
                    "SHORT_OPENED",
                    &format!("{} shorted against downtrend", signal.token),
                    serde_json::json!({
                        "id": id,
                        "market": market,
                        "entry_price": fill.entry_price,
                        "size_usdc": size,
                        "leverage": leverage,
                    }),
                );
            }
            Err(e) => error!("recording {} short failed: {}", market, e),
        }
        drop(store);
        self.inter_trade_delay().await;
    }

    /// Review cycle: re-price every open position and close the ones
    /// whose SL, TP or time stop has triggered.
    pub async fn review_cycle(&self) {
        let ids: Vec<String> = {
            let store = self.store.lock().await;
            store
                .portfolio()
                .positions
                .iter()
                .map(|p| p.id().to_string())
                .collect()
        };

        for id in ids {
            self.review_position(&id).await;
        }

        let mut store = self.store.lock().await;
        if let Some(save_error) = store.take_save_error() {
            self.alerts.emit(
                "STATE_SAVE_FAILED",
                "portfolio state could not be written",
                serde_json::json!({ "error": save_error }),
            );
        }
        self.risk.portfolio_check(&store, &self.alerts);
    }

    async fn review_position(&self, id: &str) {
        // Snapshot the mint without holding the lock across the price
        // lookup
        let mint = {
            let store = self.store.lock().await;
            match store.portfolio().positions.iter().find(|p| p.id() == id) {
                Some(p) => p.mint().to_string(),
                None => return,
            }
        };

        let quote = match self.market.lookup_price(&mint).await {
            Ok(q) => q,
            Err(e) => {
                warn!("price lookup failed for {}: {}", mint, e);
                return;
            }
        };
        let Some(quote) = quote else {
            debug!("no quote for {}, keeping position open", mint);
            return;
        };

        let mut store = self.store.lock().await;
        // Re-find under the lock; another cycle may have closed it
        let Some(position) = store
            .portfolio()
            .positions
            .iter()
            .find(|p| p.id() == id)
            .cloned()
        else {
            return;
        };

        let reason = self.risk.check_position(&position, quote.price).or_else(|| {
            let (opened_at, pnl) = match &position {
                OpenPosition::Long(p) => (p.opened_at, p.unrealized_pnl(quote.price)),
                OpenPosition::Short(p) => (p.opened_at, p.unrealized_pnl(quote.price)),
            };
            self.risk.check_time_stop(opened_at, pnl, unix_now())
        });
        let Some(reason) = reason else {
            return;
        };

        match &position {
            OpenPosition::Long(p) => {
                let fill = match self.execution.sell(&p.mint, p.amount).await {
                    Ok(f) => f,
                    Err(e) => {
                        // Position stays open for the next review
                        warn!("sell failed for {}: {}", p.token, e);
                        return;
                    }
                };
                match store.close_long(id, quote.price, fill.usdc_received, reason, unix_now()) {
                    Ok(trade) => self.emit_close(&trade.token, reason, trade.pnl, trade.pnl_percent),
                    Err(e) => error!("recording {} close failed: {}", p.token, e),
                }
            }
            OpenPosition::Short(p) => {
                let fill = match self
                    .perps
                    .close_short(&p.market, &p.mint, p.base_amount)
                    .await
                {
                    Ok(f) => f,
                    Err(e) => {
                        warn!("short close failed for {}: {}", p.market, e);
                        return;
                    }
                };
                match store.close_short(id, fill.exit_price, reason, unix_now()) {
                    Ok(trade) => self.emit_close(&trade.token, reason, trade.pnl, trade.pnl_percent),
                    Err(e) => error!("recording {} short close failed: {}", p.market, e),
                }
            }
        }
        drop(store);
        self.inter_trade_delay().await;
    }

    fn emit_close(&self, token: &str, reason: CloseReason, pnl: f64, pnl_pct: f64) {
        self.alerts.emit(
            "TRADE_CLOSED",
            &format!("{} closed [{}]", token, reason),
            serde_json::json!({
                "reason": reason.to_string(),
                "pnl": pnl,
                "pnl_pct": pnl_pct,
            }),
        );
    }

    /// Grid cycle: keep suitable tokens on the grid and trade their
    /// level crossings.
    pub async fn grid_cycle(&self) {
        let candidates = match self.market.discover_candidates().await {
            Ok(c) => c,
            Err(e) => {
                warn!("grid cycle skipped, discovery failed: {}", e);
                return;
            }
        };

        self.retire_grid_tokens(&candidates).await;
        self.activate_grid_tokens(&candidates).await;

        let mints: Vec<String> = {
            let store = self.store.lock().await;
            store.grid().tokens.keys().cloned().collect()
        };
        for mint in mints {
            self.run_grid_token(&mint).await;
        }
    }

    /// Stop buying on grid tokens whose fresh snapshot breaches the
    /// volatility ceiling. Their live fills keep selling out as usual.
    async fn retire_grid_tokens(&self, candidates: &[TokenSnapshot]) {
        let mut store = self.store.lock().await;
        for snapshot in candidates {
            let gridded_active = store
                .grid()
                .tokens
                .get(&snapshot.mint)
                .is_some_and(|t| t.active);
            if !gridded_active || !self.grid.should_retire(snapshot) {
                continue;
            }
            match store.deactivate_grid(&self.grid, &snapshot.mint) {
                Ok(()) => self.alerts.emit(
                    "GRID_DEACTIVATED",
                    &format!("grid stopped on {}, volatility too high", snapshot.token),
                    serde_json::json!({
                        "mint": snapshot.mint,
                        "price_change_24h": snapshot.price_change_24h,
                    }),
                ),
                Err(e) => error!("grid deactivation failed for {}: {}", snapshot.token, e),
            }
        }
    }

    async fn activate_grid_tokens(&self, candidates: &[TokenSnapshot]) {
        let mut store = self.store.lock().await;
        for snapshot in self.grid.select_candidates(candidates) {
            if store.grid().tokens.contains_key(&snapshot.mint) {
                continue;
            }
            match store.activate_grid(&self.grid, snapshot) {
                Ok(()) => self.alerts.emit(
                    "GRID_ACTIVATED",
                    &format!("grid started on {}", snapshot.token),
                    serde_json::json!({
                        "mint": snapshot.mint,
                        "base_price": snapshot.price,
                    }),
                ),
                // Capacity errors just mean the grid is full
                Err(e) => debug!("grid not activated for {}: {}", snapshot.token, e),
            }
        }
    }

    async fn run_grid_token(&self, mint: &str) {
        let quote = match self.market.lookup_price(mint).await {
            Ok(Some(q)) => q,
            Ok(None) => {
                debug!("no grid quote for {}", mint);
                return;
            }
            Err(e) => {
                warn!("grid price lookup failed for {}: {}", mint, e);
                return;
            }
        };

        let mut store = self.store.lock().await;
        let Some(state) = store.grid().tokens.get(mint) else {
            return;
        };
        let actions = self.grid.check(state, quote.price);

        for action in actions {
            match action {
                GridAction::Buy {
                    mint: action_mint,
                    level,
                    usdc_amount,
                } => {
                    let fill = match self.execution.buy(&action_mint, usdc_amount).await {
                        Ok(f) => f,
                        Err(e) => {
                            warn!("grid buy failed at ${:.6}: {}", level, e);
                            continue;
                        }
                    };
                    // The venue has executed; the fill must hit disk
                    // before anything else in this cycle runs
                    if let Err(e) = store.record_grid_buy(
                        &self.grid,
                        &action_mint,
                        level,
                        fill.output_amount,
                        usdc_amount,
                        unix_now(),
                    ) {
                        error!("recording grid buy failed: {}", e);
                    }
                }
                GridAction::Sell {
                    mint: action_mint,
                    fill_id,
                    amount,
                    sell_level,
                } => {
                    let fill = match self.execution.sell(&action_mint, amount).await {
                        Ok(f) => f,
                        Err(e) => {
                            warn!("grid sell failed at ${:.6}: {}", sell_level, e);
                            continue;
                        }
                    };
                    match store.record_grid_sell(&self.grid, &action_mint, fill_id, fill.usdc_received)
                    {
                        Ok(pnl) => self.alerts.emit(
                            "GRID_TRADE",
                            &format!("grid sold {} at level", action_mint),
                            serde_json::json!({ "pnl": pnl, "level": sell_level }),
                        ),
                        Err(e) => error!("recording grid sell failed: {}", e),
                    }
                }
            }
        }

        store.mark_grid_price(&self.grid, mint, quote.price);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{MockExecution, MockMarketData, TxnCounts};
    use approx::assert_relative_eq;

    fn momentum_candidate(mint: &str, price: f64) -> TokenSnapshot {
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

    fn reversion_candidate(mint: &str, price: f64) -> TokenSnapshot {
        TokenSnapshot {
            token: mint.to_uppercase(),
            mint: mint.to_string(),
            price,
            liquidity_usd: 1_500_000.0,
            volume_24h: 800_000.0,
            volume_6h: 300_000.0,
            volume_1h: 150_000.0,
            price_change_24h: -12.0,
            price_change_6h: -9.0,
            price_change_1h: 0.5,
            txns_24h: TxnCounts {
                buys: 600,
                sells: 400,
            },
        }
    }

    fn orchestrator_with_config(
        config: Config,
        market: Arc<MockMarketData>,
        execution: Arc<MockExecution>,
        capital: f64,
    ) -> Orchestrator {
        let alerts = AlertSink::disabled();
        Orchestrator::new(
            config,
            market,
            Arc::clone(&execution) as Arc<dyn ExecutionPort>,
            execution as Arc<dyn PerpExecutionPort>,
            PortfolioStore::in_memory(capital),
            alerts,
        )
    }

    fn orchestrator(
        market: Arc<MockMarketData>,
        execution: Arc<MockExecution>,
        capital: f64,
    ) -> Orchestrator {
        orchestrator_with_config(Config::default(), market, execution, capital)
    }

    #[tokio::test]
    async fn test_scan_opens_position_on_strong_signal() {
        let market = Arc::new(MockMarketData::new());
        market.set_candidates(vec![momentum_candidate("mint-a", 1.0)]);
        market.set_series(vec![1.0; 24]); // neutral regime
        let execution = Arc::new(MockExecution::new());
        execution.set_price("mint-a", 1.0);

        let orch = orchestrator(Arc::clone(&market), Arc::clone(&execution), 100.0);
        orch.scan_cycle().await;

        let store = orch.store();
        let store = store.lock().await;
        assert_eq!(store.portfolio().positions.len(), 1);
        assert!(store.portfolio().capital_usdc < 100.0);
        assert_eq!(execution.buys().len(), 1);
    }

    #[tokio::test]
    async fn test_scan_skips_held_mint() {
        let market = Arc::new(MockMarketData::new());
        market.set_candidates(vec![momentum_candidate("mint-a", 1.0)]);
        market.set_series(vec![1.0; 24]);
        let execution = Arc::new(MockExecution::new());
        execution.set_price("mint-a", 1.0);

        let orch = orchestrator(Arc::clone(&market), Arc::clone(&execution), 100.0);
        orch.scan_cycle().await;
        orch.scan_cycle().await;

        assert_eq!(execution.buys().len(), 1);
    }

    #[tokio::test]
    async fn test_scan_survives_discovery_failure() {
        let market = Arc::new(MockMarketData::new());
        market.set_fail_discovery(true);
        let execution = Arc::new(MockExecution::new());

        let orch = orchestrator(Arc::clone(&market), Arc::clone(&execution), 100.0);
        orch.scan_cycle().await;

        assert!(execution.buys().is_empty());
    }

    #[tokio::test]
    async fn test_buy_failure_leaves_portfolio_untouched() {
        let market = Arc::new(MockMarketData::new());
        market.set_candidates(vec![momentum_candidate("mint-a", 1.0)]);
        market.set_series(vec![1.0; 24]);
        let execution = Arc::new(MockExecution::new());
        execution.set_fail_buys(true);

        let orch = orchestrator(Arc::clone(&market), Arc::clone(&execution), 100.0);
        orch.scan_cycle().await;

        let store = orch.store();
        let store = store.lock().await;
        assert!(store.portfolio().positions.is_empty());
        assert_relative_eq!(store.portfolio().capital_usdc, 100.0);
    }

    #[tokio::test]
    async fn test_review_closes_on_stop_loss() {
        let market = Arc::new(MockMarketData::new());
        market.set_candidates(vec![momentum_candidate("mint-a", 1.0)]);
        market.set_series(vec![1.0; 24]);
        let execution = Arc::new(MockExecution::new());
        execution.set_price("mint-a", 1.0);

        let orch = orchestrator(Arc::clone(&market), Arc::clone(&execution), 100.0);
        orch.scan_cycle().await;

        // Price collapses through the stop
        market.set_price("mint-a", 0.5);
        execution.set_price("mint-a", 0.5);
        orch.review_cycle().await;

        let store = orch.store();
        let store = store.lock().await;
        assert!(store.portfolio().positions.is_empty());
        assert_eq!(store.portfolio().closed_trades.len(), 1);
        assert_eq!(
            store.portfolio().closed_trades[0].reason,
            CloseReason::StopLoss
        );
        assert!(store.portfolio().total_pnl < 0.0);
    }

    #[tokio::test]
    async fn test_review_keeps_position_when_sell_fails() {
        let market = Arc::new(MockMarketData::new());
        market.set_candidates(vec![momentum_candidate("mint-a", 1.0)]);
        market.set_series(vec![1.0; 24]);
        let execution = Arc::new(MockExecution::new());
        execution.set_price("mint-a", 1.0);

        let orch = orchestrator(Arc::clone(&market), Arc::clone(&execution), 100.0);
        orch.scan_cycle().await;

        market.set_price("mint-a", 0.5);
        execution.set_fail_sells(true);
        orch.review_cycle().await;

        let store = orch.store();
        let store = store.lock().await;
        assert_eq!(store.portfolio().positions.len(), 1);
    }

    #[tokio::test]
    async fn test_review_skips_when_no_quote() {
        let market = Arc::new(MockMarketData::new());
        market.set_candidates(vec![momentum_candidate("mint-a", 1.0)]);
        market.set_series(vec![1.0; 24]);
        let execution = Arc::new(MockExecution::new());
        execution.set_price("mint-a", 1.0);

        let orch = orchestrator(Arc::clone(&market), Arc::clone(&execution), 100.0);
        orch.scan_cycle().await;

        market.clear_price("mint-a");
        orch.review_cycle().await;

        let store = orch.store();
        let store = store.lock().await;
        assert_eq!(store.portfolio().positions.len(), 1);
    }

    #[tokio::test]
    async fn test_downtrend_reversion_opens_short_when_enabled() {
        let market = Arc::new(MockMarketData::new());
        market.set_candidates(vec![reversion_candidate("mint-a", 1.0)]);
        market.set_series(vec![110.0, 105.0, 100.0, 95.0, 90.0]); // downtrend
        let execution = Arc::new(MockExecution::new());
        execution.set_price("mint-a", 1.0);

        let mut config = Config::default();
        config.shorts.enabled = true;
        let orch = orchestrator_with_config(
            config,
            Arc::clone(&market),
            Arc::clone(&execution),
            100.0,
        );
        orch.scan_cycle().await;

        {
            let store = orch.store();
            let store = store.lock().await;
            assert_eq!(store.portfolio().positions.len(), 1);
            assert!(matches!(
                store.portfolio().positions[0].side(),
                crate::domain::Side::Short
            ));
        }
        let shorts = execution.shorts();
        assert_eq!(shorts.len(), 1);
        assert_eq!(shorts[0].0, "MINT-A-PERP");

        // Price keeps falling through the short take-profit at 0.70
        market.set_price("mint-a", 0.65);
        execution.set_price("mint-a", 0.65);
        orch.review_cycle().await;

        let store = orch.store();
        let store = store.lock().await;
        assert!(store.portfolio().positions.is_empty());
        assert_eq!(
            store.portfolio().closed_trades[0].reason,
            CloseReason::TakeProfit
        );
        assert!(store.portfolio().total_pnl > 0.0);
    }

    #[tokio::test]
    async fn test_downtrend_reversion_skipped_when_shorts_disabled() {
        let market = Arc::new(MockMarketData::new());
        market.set_candidates(vec![reversion_candidate("mint-a", 1.0)]);
        market.set_series(vec![110.0, 105.0, 100.0, 95.0, 90.0]);
        let execution = Arc::new(MockExecution::new());
        execution.set_price("mint-a", 1.0);

        let orch = orchestrator(Arc::clone(&market), Arc::clone(&execution), 100.0);
        orch.scan_cycle().await;

        let store = orch.store();
        let store = store.lock().await;
        assert!(store.portfolio().positions.is_empty());
        assert!(execution.shorts().is_empty());
    }

    #[tokio::test]
    async fn test_grid_cycle_activates_and_trades() {
        let market = Arc::new(MockMarketData::new());
        let stable = TokenSnapshot {
            liquidity_usd: 5_000_000.0,
            price_change_24h: 1.0,
            volume_24h: 1_000_000.0,
            ..momentum_candidate("mint-g", 100.0)
        };
        market.set_candidates(vec![stable]);
        market.set_price("mint-g", 100.0);
        let execution = Arc::new(MockExecution::new());
        execution.set_price("mint-g", 100.0);

        let orch = orchestrator(Arc::clone(&market), Arc::clone(&execution), 100.0);
        orch.grid_cycle().await;

        {
            let store = orch.store();
            let store = store.lock().await;
            assert_eq!(store.grid().tokens.len(), 1);
            assert!(store.grid().tokens["mint-g"].active);
        }

        // Cross down through the 98 level
        market.set_price("mint-g", 97.5);
        execution.set_price("mint-g", 97.5);
        orch.grid_cycle().await;
        assert_eq!(execution.buys().len(), 1);

        // Recover above the sell level at 100
        market.set_price("mint-g", 100.5);
        execution.set_price("mint-g", 100.5);
        orch.grid_cycle().await;
        assert_eq!(execution.sells().len(), 1);

        let store = orch.store();
        let store = store.lock().await;
        assert!(store.grid().total_pnl > 0.0);
        assert_eq!(store.grid().total_trades, 1);
    }

    #[tokio::test]
    async fn test_grid_retires_token_on_volatility_breach() {
        let market = Arc::new(MockMarketData::new());
        let stable = TokenSnapshot {
            liquidity_usd: 5_000_000.0,
            price_change_24h: 1.0,
            volume_24h: 1_000_000.0,
            ..momentum_candidate("mint-g", 100.0)
        };
        market.set_candidates(vec![stable.clone()]);
        market.set_price("mint-g", 100.0);
        let execution = Arc::new(MockExecution::new());
        execution.set_price("mint-g", 100.0);

        let orch = orchestrator(Arc::clone(&market), Arc::clone(&execution), 100.0);
        orch.grid_cycle().await;

        // Fill one level so the retired grid still holds inventory
        market.set_price("mint-g", 97.5);
        execution.set_price("mint-g", 97.5);
        orch.grid_cycle().await;
        assert_eq!(execution.buys().len(), 1);

        // 24h movement blows through the volatility ceiling
        market.set_candidates(vec![TokenSnapshot {
            price_change_24h: 12.0,
            ..stable
        }]);
        market.set_price("mint-g", 95.0);
        execution.set_price("mint-g", 95.0);
        orch.grid_cycle().await;

        {
            let store = orch.store();
            let store = store.lock().await;
            assert!(!store.grid().tokens["mint-g"].active);
        }

        // No fresh buys below the next level once retired
        market.set_price("mint-g", 93.5);
        execution.set_price("mint-g", 93.5);
        orch.grid_cycle().await;
        assert_eq!(execution.buys().len(), 1);

        // The existing fill still sells out on recovery
        market.set_price("mint-g", 100.5);
        execution.set_price("mint-g", 100.5);
        orch.grid_cycle().await;
        assert_eq!(execution.sells().len(), 1);
    }
}
