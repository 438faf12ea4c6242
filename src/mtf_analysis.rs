// =============================================================================
// MULTI-TIMEFRAME ANALYSIS MODULE
// Per-timeframe evaluation, direction agreement and higher-timeframe boost
// =============================================================================

use std::sync::Arc;

use futures_util::future::join_all;
use rust_decimal::prelude::*;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::engine::SignalEngine;
use crate::indicators::{rolling_mean, Ema};
use crate::sources::MarketDataSource;
use crate::types::{Candle, MarketContext, Signal, SignalType};
use crate::validation::{validate_window, BREAKOUT_MIN_CANDLES, LIGHT_MIN_CANDLES};

pub const DEFAULT_WINDOW_LIMIT: usize = 250;
/// Below this share of agreeing timeframes the result is flagged.
pub const LOW_CONSENSUS_THRESHOLD: f64 = 0.15;

pub const BOOST_TIMEFRAMES: [&str; 2] = ["4h", "1d"];
pub const BOOST_WINDOW_LIMIT: usize = 100;
pub const BOOST_PER_TIMEFRAME: u32 = 5;
const BOOST_VOLUME_FACTOR: f64 = 1.5;

// =============================================================================
// RESULT TYPES
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct MultiTimeframeResult {
    pub symbol: String,
    /// One entry per requested timeframe, in request order.
    pub signals: Vec<(String, Option<Signal>)>,
    pub agreement: Option<f64>,
    pub low_consensus: bool,
}

impl MultiTimeframeResult {
    pub fn signal(&self, timeframe: &str) -> Option<&Signal> {
        self.signals
            .iter()
            .find(|(tf, _)| tf == timeframe)
            .and_then(|(_, s)| s.as_ref())
    }

    pub fn valid_signals(&self) -> impl Iterator<Item = &Signal> {
        self.signals.iter().filter_map(|(_, s)| s.as_ref())
    }
}

/// Why a higher timeframe wiped out the boost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoostVeto {
    EmaMisaligned,
    LowVolume,
    FakeBreakout,
}

/// Share of signals pointing the same way as the first one.
pub fn agreement<I>(directions: I) -> Option<f64>
where
    I: IntoIterator<Item = SignalType>,
{
    let directions: Vec<SignalType> = directions.into_iter().collect();
    let first = *directions.first()?;
    let same = directions.iter().filter(|d| **d == first).count();
    Some(same as f64 / directions.len() as f64)
}

// =============================================================================
// HIGHER-TIMEFRAME CONFIRMATION
// =============================================================================

fn column(candles: &[Candle], field: fn(&Candle) -> Decimal) -> Vec<f64> {
    candles.iter().map(|c| field(c).to_f64().unwrap_or(f64::NAN)).collect()
}

/// Checks one higher-timeframe window. `Ok` carries the points it adds.
pub fn timeframe_boost(candles: &[Candle], direction: SignalType) -> Result<u32, BoostVeto> {
    let closes = column(candles, |c| c.close);
    let volumes = column(candles, |c| c.volume);

    let mut ema20 = Ema::new(20);
    let mut ema50 = Ema::new(50);
    let (mut fast, mut slow) = (f64::NAN, f64::NAN);
    for close in &closes {
        fast = ema20.update(*close);
        slow = ema50.update(*close);
    }

    let aligned = match direction {
        SignalType::LONG => fast > slow,
        SignalType::SHORT => fast < slow,
    };
    if !aligned {
        return Err(BoostVeto::EmaMisaligned);
    }

    let volume_sma = rolling_mean(&volumes, 20, 20).last().copied().unwrap_or(f64::NAN);
    let latest_volume = volumes.last().copied().unwrap_or(f64::NAN);
    // NaN compares false, so a missing average never counts as low volume
    if latest_volume < BOOST_VOLUME_FACTOR * volume_sma {
        return Err(BoostVeto::LowVolume);
    }

    if candles.len() >= BREAKOUT_MIN_CANDLES {
        if let [third, prev, latest] = &candles[candles.len() - 3..] {
            let fake = match direction {
                SignalType::LONG => prev.high > latest.high && third.close <= prev.high,
                SignalType::SHORT => prev.low < latest.low && third.close >= prev.low,
            };
            if fake {
                return Err(BoostVeto::FakeBreakout);
            }
        }
    }

    Ok(BOOST_PER_TIMEFRAME)
}

// =============================================================================
// AGGREGATOR
// =============================================================================

pub struct MultiTimeframeAggregator {
    source: Arc<dyn MarketDataSource>,
    engine: SignalEngine,
    window_limit: usize,
}

impl MultiTimeframeAggregator {
    pub fn new(source: Arc<dyn MarketDataSource>) -> Self {
        Self {
            source,
            engine: SignalEngine::new(),
            window_limit: DEFAULT_WINDOW_LIMIT,
        }
    }

    pub fn with_window_limit(mut self, limit: usize) -> Self {
        self.window_limit = limit;
        self
    }

    async fn evaluate_timeframe(&self, symbol: &str, timeframe: &str, ctx: &MarketContext) -> Option<Signal> {
        info!("[{}] Fetching OHLCV data for {}", symbol, timeframe);
        let candles = match self.source.fetch_candles(symbol, timeframe, self.window_limit).await {
            Ok(Some(candles)) => candles,
            Ok(None) => {
                warn!("[{}] No data for {}", symbol, timeframe);
                return None;
            }
            Err(e) => {
                error!("[{}] Error fetching {}: {:#}", symbol, timeframe, e);
                return None;
            }
        };
        self.engine.evaluate(symbol, timeframe, &candles, ctx)
    }

    /// Evaluates every timeframe concurrently. A failing timeframe only
    /// blanks its own entry.
    pub async fn analyze(&self, symbol: &str, timeframes: &[String], ctx: &MarketContext) -> MultiTimeframeResult {
        let outcomes = join_all(
            timeframes
                .iter()
                .map(|tf| self.evaluate_timeframe(symbol, tf, ctx)),
        )
        .await;

        let signals: Vec<(String, Option<Signal>)> = timeframes.iter().cloned().zip(outcomes).collect();

        let agreement = agreement(signals.iter().filter_map(|(_, s)| s.as_ref().map(|s| s.direction)));
        let low_consensus = match agreement {
            Some(a) => {
                info!("[{}] Timeframe agreement: {:.2}", symbol, a);
                if a < LOW_CONSENSUS_THRESHOLD {
                    info!("[{}] Insufficient timeframe agreement ({:.2})", symbol, a);
                }
                a < LOW_CONSENSUS_THRESHOLD
            }
            None => {
                info!("[{}] No valid signals across any timeframe", symbol);
                false
            }
        };

        MultiTimeframeResult {
            symbol: symbol.to_string(),
            signals,
            agreement,
            low_consensus,
        }
    }

    /// Extra points (0, 5 or 10) when the 4h and 1d charts confirm the
    /// direction. Any veto zeroes the whole boost; a timeframe whose data
    /// cannot be fetched is skipped.
    pub async fn multi_timeframe_boost(&self, symbol: &str, direction: SignalType) -> u32 {
        let mut boost = 0;
        for timeframe in BOOST_TIMEFRAMES {
            let candles = match self.source.fetch_candles(symbol, timeframe, BOOST_WINDOW_LIMIT).await {
                Ok(Some(candles)) => candles,
                Ok(None) => {
                    warn!("[{}] No OHLCV data for {}", symbol, timeframe);
                    continue;
                }
                Err(e) => {
                    error!("[{}] Failed to fetch OHLCV for {}: {:#}", symbol, timeframe, e);
                    continue;
                }
            };
            if let Err(e) = validate_window(&candles, LIGHT_MIN_CANDLES) {
                warn!("[{}] Skipping {} boost: {}", symbol, timeframe, e);
                continue;
            }

            match timeframe_boost(&candles, direction) {
                Ok(points) => boost += points,
                Err(veto) => {
                    warn!("[{}] {} boost vetoed: {:?}", symbol, timeframe, veto);
                    return 0;
                }
            }
        }
        boost
    }
}
