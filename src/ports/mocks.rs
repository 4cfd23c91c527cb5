//! Scripted mock implementations of the ports for tests.
//!
//! Unit and integration tests drive the engine through these rather than
//! real collaborators. Failure flags let tests assert each degradation
//! path (success / empty / failure) explicitly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::execution::{
    BuyFill, CloseShortFill, ExecutionError, ExecutionPort, PerpExecutionPort, SellFill, ShortFill,
};
use super::market_data::{MarketDataError, MarketDataPort, PriceQuote, TokenSnapshot};

/// In-memory market data source scripted by tests
#[derive(Default)]
pub struct MockMarketData {
    candidates: Mutex<Vec<TokenSnapshot>>,
    prices: Mutex<HashMap<String, PriceQuote>>,
    series: Mutex<Vec<f64>>,
    fail_discovery: AtomicBool,
    fail_lookup: AtomicBool,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_candidates(&self, candidates: Vec<TokenSnapshot>) {
        *self.candidates.lock().unwrap() = candidates;
    }

    pub fn set_price(&self, mint: &str, price: f64) {
        self.prices.lock().unwrap().insert(
            mint.to_string(),
            PriceQuote {
                price,
                liquidity_usd: 1_000_000.0,
                volume_24h: 1_000_000.0,
                price_change_24h: 0.0,
            },
        );
    }

    pub fn set_quote(&self, mint: &str, quote: PriceQuote) {
        self.prices.lock().unwrap().insert(mint.to_string(), quote);
    }

    pub fn clear_price(&self, mint: &str) {
        self.prices.lock().unwrap().remove(mint);
    }

    pub fn set_series(&self, series: Vec<f64>) {
        *self.series.lock().unwrap() = series;
    }

    pub fn set_fail_discovery(&self, fail: bool) {
        self.fail_discovery.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_lookup(&self, fail: bool) {
        self.fail_lookup.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MarketDataPort for MockMarketData {
    async fn discover_candidates(&self) -> Result<Vec<TokenSnapshot>, MarketDataError> {
        if self.fail_discovery.load(Ordering::SeqCst) {
            return Err(MarketDataError::Http("scripted discovery failure".into()));
        }
        Ok(self.candidates.lock().unwrap().clone())
    }

    async fn lookup_price(&self, mint: &str) -> Result<Option<PriceQuote>, MarketDataError> {
        if self.fail_lookup.load(Ordering::SeqCst) {
            return Err(MarketDataError::Http("scripted lookup failure".into()));
        }
        Ok(self.prices.lock().unwrap().get(mint).cloned())
    }

    async fn reference_series(&self, _mint: &str, _days: u32) -> Result<Vec<f64>, MarketDataError> {
        let series = self.series.lock().unwrap();
        if series.is_empty() {
            return Err(MarketDataError::Unsupported("no series scripted".into()));
        }
        Ok(series.clone())
    }
}

/// In-memory execution venue scripted by tests
///
/// Fills at an exact scripted price per mint, no slippage, and records
/// every order so tests can assert on what was executed.
#[derive(Default)]
pub struct MockExecution {
    prices: Mutex<HashMap<String, f64>>,
    fail_buys: AtomicBool,
    fail_sells: AtomicBool,
    buys: Mutex<Vec<(String, f64)>>,
    sells: Mutex<Vec<(String, f64)>>,
    shorts: Mutex<Vec<(String, f64)>>,
    next_tx: AtomicU64,
}

impl MockExecution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&self, mint: &str, price: f64) {
        self.prices.lock().unwrap().insert(mint.to_string(), price);
    }

    pub fn set_fail_buys(&self, fail: bool) {
        self.fail_buys.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_sells(&self, fail: bool) {
        self.fail_sells.store(fail, Ordering::SeqCst);
    }

    pub fn buys(&self) -> Vec<(String, f64)> {
        self.buys.lock().unwrap().clone()
    }

    pub fn sells(&self) -> Vec<(String, f64)> {
        self.sells.lock().unwrap().clone()
    }

    pub fn shorts(&self) -> Vec<(String, f64)> {
        self.shorts.lock().unwrap().clone()
    }

    fn price_of(&self, key: &str) -> Result<f64, ExecutionError> {
        self.prices
            .lock()
            .unwrap()
            .get(key)
            .copied()
            .ok_or_else(|| ExecutionError::NoPrice(key.to_string()))
    }

    fn tx_id(&self) -> String {
        format!("mock-{}", self.next_tx.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl ExecutionPort for MockExecution {
    async fn buy(&self, mint: &str, usdc_amount: f64) -> Result<BuyFill, ExecutionError> {
        if self.fail_buys.load(Ordering::SeqCst) {
            return Err(ExecutionError::Rejected("scripted buy failure".into()));
        }
        let price = self.price_of(mint)?;
        self.buys
            .lock()
            .unwrap()
            .push((mint.to_string(), usdc_amount));
        Ok(BuyFill {
            output_amount: usdc_amount / price,
            price,
            tx_id: self.tx_id(),
            simulated: true,
        })
    }

    async fn sell(&self, mint: &str, amount: f64) -> Result<SellFill, ExecutionError> {
        if self.fail_sells.load(Ordering::SeqCst) {
            return Err(ExecutionError::Rejected("scripted sell failure".into()));
        }
        let price = self.price_of(mint)?;
        self.sells.lock().unwrap().push((mint.to_string(), amount));
        Ok(SellFill {
            usdc_received: amount * price,
            tx_id: self.tx_id(),
            simulated: true,
        })
    }
}

#[async_trait]
impl PerpExecutionPort for MockExecution {
    async fn open_short(
        &self,
        market: &str,
        mint: &str,
        size_usdc: f64,
        _leverage: f64,
    ) -> Result<ShortFill, ExecutionError> {
        if self.fail_buys.load(Ordering::SeqCst) {
            return Err(ExecutionError::Rejected("scripted short failure".into()));
        }
        let price = self.price_of(mint)?;
        self.shorts
            .lock()
            .unwrap()
            .push((market.to_string(), size_usdc));
        Ok(ShortFill {
            position_id: self.tx_id(),
            entry_price: price,
            base_amount: size_usdc / price,
            simulated: true,
        })
    }

    async fn close_short(
        &self,
        _market: &str,
        mint: &str,
        _base_amount: f64,
    ) -> Result<CloseShortFill, ExecutionError> {
        if self.fail_sells.load(Ordering::SeqCst) {
            return Err(ExecutionError::Rejected("scripted short close failure".into()));
        }
        let price = self.price_of(mint)?;
        Ok(CloseShortFill {
            exit_price: price,
            tx_id: self.tx_id(),
            simulated: true,
        })
    }
}
