#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use rust_decimal::prelude::*;

use signal_engine::error::EngineError;
use signal_engine::sources::{MarketDataSource, Notifier, PriceSource, SignalJournal};
use signal_engine::tracker::OutcomeRecord;
use signal_engine::types::{Candle, MarketContext, Signal, SignalType};

fn dec(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap().round_dp(4)
}

/// Higher-lows zigzag (+3 / -2.5) that ends on a bullish engulfing bar.
/// `SHORT` mirrors every price around 400. `n` should be odd so the window
/// ends on the impulse candle.
pub fn trending_window(direction: SignalType, n: usize, last_volume: f64) -> Vec<Candle> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mirror = |p: f64| match direction {
        SignalType::LONG => p,
        SignalType::SHORT => 400.0 - p,
    };

    let mut prev = 100.0;
    let mut candles = Vec::with_capacity(n);
    for i in 0..n {
        let (open, high, low, close) = if i % 2 == 0 {
            (prev, prev + 3.5, prev - 0.5, prev + 3.0)
        } else {
            (prev, prev + 0.2, prev - 2.8, prev - 2.5)
        };
        prev = close;

        let (high, low) = match direction {
            SignalType::LONG => (high, low),
            SignalType::SHORT => (mirror(low), mirror(high)),
        };
        let volume = if i + 1 == n { last_volume } else { 1000.0 };
        candles.push(Candle {
            open_time: start + Duration::hours(i as i64),
            open: dec(mirror(open)),
            high: dec(high),
            low: dec(low),
            close: dec(mirror(close)),
            volume: dec(volume),
            close_time: None,
        });
    }
    candles
}

#[derive(Default)]
pub struct InMemoryMarket {
    pub windows: HashMap<(String, String), Vec<Candle>>,
    pub failing: Vec<String>,
    pub context: MarketContext,
    /// Every (timeframe, limit) requested so far.
    pub fetches: Mutex<Vec<(String, usize)>>,
}

impl InMemoryMarket {
    pub fn with_window(mut self, symbol: &str, timeframe: &str, candles: Vec<Candle>) -> Self {
        self.windows.insert((symbol.to_string(), timeframe.to_string()), candles);
        self
    }
}

#[async_trait]
impl MarketDataSource for InMemoryMarket {
    async fn fetch_candles(&self, symbol: &str, timeframe: &str, limit: usize) -> anyhow::Result<Option<Vec<Candle>>> {
        self.fetches.lock().unwrap().push((timeframe.to_string(), limit));
        if self.failing.iter().any(|tf| tf == timeframe) {
            anyhow::bail!("exchange timeout");
        }
        Ok(self
            .windows
            .get(&(symbol.to_string(), timeframe.to_string()))
            .map(|w| w[w.len().saturating_sub(limit)..].to_vec()))
    }

    async fn market_context(&self, _symbol: &str, _btc_symbol: &str) -> anyhow::Result<MarketContext> {
        Ok(self.context.clone())
    }
}

/// Replays scripted prices; `None` entries simulate a failed poll.
pub struct ScriptedPrices {
    script: Mutex<VecDeque<Option<Decimal>>>,
    last: Decimal,
}

impl ScriptedPrices {
    pub fn new(script: Vec<Option<Decimal>>, last: Decimal) -> Self {
        Self { script: Mutex::new(script.into()), last }
    }
}

#[async_trait]
impl PriceSource for ScriptedPrices {
    async fn current_price(&self, _symbol: &str) -> anyhow::Result<Decimal> {
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Some(price)) => Ok(price),
            Some(None) => anyhow::bail!("ticker unavailable"),
            None => Ok(self.last),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, SignalType, u32)>>,
    pub fail: bool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, signal: &Signal, boost: u32) -> Result<(), EngineError> {
        if self.fail {
            return Err(EngineError::Delivery("chat unreachable".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((signal.timeframe.clone(), signal.direction, boost));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryJournal {
    pub records: Mutex<Vec<(Signal, OutcomeRecord)>>,
}

impl SignalJournal for MemoryJournal {
    fn record(&self, signal: &Signal, outcome: &OutcomeRecord) -> Result<(), EngineError> {
        self.records.lock().unwrap().push((signal.clone(), outcome.clone()));
        Ok(())
    }
}
