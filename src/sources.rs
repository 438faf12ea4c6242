// =============================================================================
// COLLABORATOR INTERFACES
// =============================================================================
//
// The engine never talks to an exchange, a chat service or a file directly.
// Everything outside the process goes through one of these traits so the
// scan loop can be driven by in-memory doubles in tests.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::EngineError;
use crate::tracker::OutcomeRecord;
use crate::types::{Candle, MarketContext, Signal};

#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Most recent `limit` candles, oldest first. `Ok(None)` when the venue
    /// has no data for the pair.
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> anyhow::Result<Option<Vec<Candle>>>;

    /// Macro context for one scan of `symbol`. Sources without ticker data
    /// report a neutral context.
    async fn market_context(&self, _symbol: &str, _btc_symbol: &str) -> anyhow::Result<MarketContext> {
        Ok(MarketContext::default())
    }
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn current_price(&self, symbol: &str) -> anyhow::Result<Decimal>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, signal: &Signal, boost: u32) -> Result<(), EngineError>;
}

pub trait SignalJournal: Send + Sync {
    fn record(&self, signal: &Signal, outcome: &OutcomeRecord) -> Result<(), EngineError>;
}
