//! Paper execution adapter
//!
//! Fills orders against live quotes from the market data port with a
//! configurable slippage haircut. No funds move; every fill is flagged
//! `simulated`. This is the only execution adapter wired by default.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::ports::{
    BuyFill, CloseShortFill, ExecutionError, ExecutionPort, MarketDataPort, PerpExecutionPort,
    SellFill, ShortFill,
};

/// Paper venue over live quotes.
pub struct PaperExecution {
    market: Arc<dyn MarketDataPort>,
    /// Slippage applied against the taker on both sides, in basis points
    slippage_bps: f64,
    tx_counter: AtomicU64,
}

impl PaperExecution {
    pub fn new(market: Arc<dyn MarketDataPort>, slippage_bps: f64) -> Self {
        Self {
            market,
            slippage_bps,
            tx_counter: AtomicU64::new(0),
        }
    }

    fn next_tx_id(&self) -> String {
        format!("paper-{}", self.tx_counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn quote_price(&self, mint: &str) -> Result<f64, ExecutionError> {
        let quote = self
            .market
            .lookup_price(mint)
            .await
            .map_err(|e| ExecutionError::Network(e.to_string()))?
            .ok_or_else(|| ExecutionError::NoPrice(mint.to_string()))?;
        Ok(quote.price)
    }
}

#[async_trait]
impl ExecutionPort for PaperExecution {
    async fn buy(&self, mint: &str, usdc_amount: f64) -> Result<BuyFill, ExecutionError> {
        let price = self.quote_price(mint).await?;
        // Taker pays up on a buy
        let eff_price = price * (1.0 + self.slippage_bps / 10_000.0);
        let output_amount = usdc_amount / eff_price;
        let tx_id = self.next_tx_id();
        info!(
            "paper buy {}: ${:.2} @ ${:.6} -> {:.6} tokens [{}]",
            mint, usdc_amount, eff_price, output_amount, tx_id
        );
        Ok(BuyFill {
            output_amount,
            price: eff_price,
            tx_id,
            simulated: true,
        })
    }

    async fn sell(&self, mint: &str, amount: f64) -> Result<SellFill, ExecutionError> {
        let price = self.quote_price(mint).await?;
        // Taker gives up on a sell
        let eff_price = price * (1.0 - self.slippage_bps / 10_000.0);
        let usdc_received = amount * eff_price;
        let tx_id = self.next_tx_id();
        info!(
            "paper sell {}: {:.6} tokens @ ${:.6} -> ${:.2} [{}]",
            mint, amount, eff_price, usdc_received, tx_id
        );
        Ok(SellFill {
            usdc_received,
            tx_id,
            simulated: true,
        })
    }
}

#[async_trait]
impl PerpExecutionPort for PaperExecution {
    async fn open_short(
        &self,
        market: &str,
        mint: &str,
        size_usdc: f64,
        leverage: f64,
    ) -> Result<ShortFill, ExecutionError> {
        let price = self.quote_price(mint).await?;
        // Short entry fills below mark
        let entry_price = price * (1.0 - self.slippage_bps / 10_000.0);
        let base_amount = size_usdc * leverage / entry_price;
        debug!(
            "paper short {}: ${:.2} x{} @ ${:.6} -> {:.6} base",
            market, size_usdc, leverage, entry_price, base_amount
        );
        Ok(ShortFill {
            position_id: self.next_tx_id(),
            entry_price,
            base_amount,
            simulated: true,
        })
    }

    async fn close_short(
        &self,
        _market: &str,
        mint: &str,
        _base_amount: f64,
    ) -> Result<CloseShortFill, ExecutionError> {
        let price = self.quote_price(mint).await?;
        // Buying back pays up
        let exit_price = price * (1.0 + self.slippage_bps / 10_000.0);
        Ok(CloseShortFill {
            exit_price,
            tx_id: self.next_tx_id(),
            simulated: true,
        })
    }
}
