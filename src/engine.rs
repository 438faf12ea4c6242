use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::classifier::{classify_trade, leverage, trade_duration};
use crate::conditions::{self, Evaluation, EvidenceInput};
use crate::indicators::calculate_indicators;
use crate::levels::SupportResistance;
use crate::patterns;
use crate::resolver::resolve_direction;
use crate::targets::{calculate_targets, possibilities};
use crate::types::{Candle, MarketContext, Signal, TrendStatus, ENGINE_VERSION};
use crate::validation::{validate_window, PREDICTION_MIN_CANDLES};

/// Turns one candle window into at most one signal.
pub struct SignalEngine {
    levels: SupportResistance,
    min_candles: usize,
}

impl Default for SignalEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalEngine {
    pub fn new() -> Self {
        Self {
            levels: SupportResistance::default(),
            min_candles: PREDICTION_MIN_CANDLES,
        }
    }

    pub fn min_candles(&self) -> usize {
        self.min_candles
    }

    pub fn evaluate(
        &self,
        symbol: &str,
        timeframe: &str,
        candles: &[Candle],
        ctx: &MarketContext,
    ) -> Option<Signal> {
        if let Err(e) = validate_window(candles, self.min_candles) {
            warn!("{} [{}]: invalid window: {}", symbol, timeframe, e);
            return None;
        }

        let frame = calculate_indicators(candles);
        if frame.is_degraded() {
            warn!("{} [{}]: indicator frame degraded, skipping", symbol, timeframe);
            return None;
        }

        let row = frame.latest()?;
        let levels = self.levels.levels(frame.rows())?;
        let flags = patterns::detect(candles);
        let latest = candles.last()?;

        let input = EvidenceInput { row, patterns: flags, levels };
        self.decide(symbol, timeframe, &input, latest, ctx)
    }

    /// Scores the evidence for the latest candle and assembles the signal.
    pub fn decide(
        &self,
        symbol: &str,
        timeframe: &str,
        input: &EvidenceInput<'_>,
        latest: &Candle,
        ctx: &MarketContext,
    ) -> Option<Signal> {
        let (conditions, confidence) = match conditions::evaluate(input) {
            Evaluation::Evidence { conditions, confidence } => (conditions, confidence),
            Evaluation::Abort(reason) => {
                info!("{} [{}]: no signal, {}", symbol, timeframe, reason);
                return None;
            }
        };
        debug!("{} [{}]: conditions {} (conf {:.1})", symbol, timeframe, conditions, confidence);

        let direction = match resolve_direction(&conditions, confidence, ctx.btc_trend) {
            Ok(direction) => direction,
            Err(rejection) => {
                info!("{} [{}]: signal rejected, {}", symbol, timeframe, rejection);
                return None;
            }
        };

        let row = input.row;
        let targets = match calculate_targets(direction, latest.close, row.atr) {
            Ok(targets) => targets,
            Err(e) => {
                warn!("{} [{}]: target calculation failed: {}", symbol, timeframe, e);
                return None;
            }
        };
        let odds = possibilities(confidence);

        let ma200_status = if row.close > row.ma200 { TrendStatus::Bullish } else { TrendStatus::Bearish };

        let signal = Signal {
            signal_id: Uuid::new_v4().to_string(),
            engine_version: ENGINE_VERSION.to_string(),
            symbol: symbol.to_string(),
            direction,
            entry: targets.entry,
            confidence,
            timeframe: timeframe.to_string(),
            conditions,
            tp1: targets.tp1,
            tp2: targets.tp2,
            tp3: targets.tp3,
            sl: targets.sl,
            tp1_possibility: odds.tp1,
            tp2_possibility: odds.tp2,
            tp3_possibility: odds.tp3,
            volume: latest.volume,
            quote_volume_24h: ctx.quote_volume_24h,
            trade_type: classify_trade(timeframe),
            trade_duration: trade_duration(timeframe).to_string(),
            timestamp: Utc::now(),
            macd_status: row.macd_status,
            leverage: leverage(confidence, row.adx),
            btc_trend: ctx.btc_trend,
            ma200_status,
        };

        info!("{}", signal);
        Some(signal)
    }
}
