use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::conditions::ConditionSet;

pub const ENGINE_VERSION: &str = "1.0.0";

// =============================================================================
// MARKET DATA
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub open_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    #[serde(default)]
    pub close_time: Option<DateTime<Utc>>,
}

impl Candle {
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// Macro context supplied by the caller for one scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketContext {
    /// 24h percent change of the reference market (BTC).
    pub btc_trend: f64,
    /// 24h quote volume of the scanned instrument.
    pub quote_volume_24h: Decimal,
}

// =============================================================================
// SIGNAL CONTRACT
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SignalType {
    LONG,
    SHORT,
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalType::LONG => write!(f, "LONG"),
            SignalType::SHORT => write!(f, "SHORT"),
        }
    }
}

/// Bullish/bearish label used for MACD and MA200 status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrendStatus {
    Bullish,
    Bearish,
}

impl fmt::Display for TrendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendStatus::Bullish => write!(f, "bullish"),
            TrendStatus::Bearish => write!(f, "bearish"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TradeType {
    Scalp,
    Normal,
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeType::Scalp => write!(f, "Scalp"),
            TradeType::Normal => write!(f, "Normal"),
        }
    }
}

/// A finished trading recommendation. Immutable once returned; the outcome
/// of the trade lives in `tracker::OutcomeRecord`, keyed by `signal_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub signal_id: String,
    pub engine_version: String,
    pub symbol: String,
    pub direction: SignalType,
    pub entry: Decimal,
    pub confidence: f64,
    pub timeframe: String,
    pub conditions: ConditionSet,
    pub tp1: Decimal,
    pub tp2: Decimal,
    pub tp3: Decimal,
    pub sl: Decimal,
    pub tp1_possibility: f64,
    pub tp2_possibility: f64,
    pub tp3_possibility: f64,
    pub volume: Decimal,
    pub quote_volume_24h: Decimal,
    pub trade_type: TradeType,
    pub trade_duration: String,
    pub timestamp: DateTime<Utc>,
    pub macd_status: TrendStatus,
    pub leverage: u8,
    pub btc_trend: f64,
    pub ma200_status: TrendStatus,
}

impl Signal {
    /// TP1 distance from entry, in percent.
    pub fn tp1_percent(&self) -> Decimal {
        if self.entry.is_zero() {
            return Decimal::ZERO;
        }
        (self.tp1 - self.entry).abs() / self.entry * Decimal::ONE_HUNDRED
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SIGNAL [{}]: {} [{}] {} @ {} (Conf: {:.2}%, TP1 {} / SL {})",
            self.signal_id.get(..8).unwrap_or(&self.signal_id),
            self.symbol,
            self.timeframe,
            self.direction,
            self.entry,
            self.confidence,
            self.tp1,
            self.sl
        )
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    /// A fully populated signal at entry 100 with ATR-2 style targets.
    pub(crate) fn sample_signal(direction: SignalType, timeframe: &str) -> Signal {
        let (tp1, tp2, tp3, sl, macd_status) = match direction {
            SignalType::LONG => (dec!(101), dec!(102), dec!(104), dec!(98.4), TrendStatus::Bullish),
            SignalType::SHORT => (dec!(99), dec!(98), dec!(96), dec!(101.6), TrendStatus::Bearish),
        };
        Signal {
            signal_id: uuid::Uuid::new_v4().to_string(),
            engine_version: ENGINE_VERSION.to_string(),
            symbol: "ETHUSDT".to_string(),
            direction,
            entry: dec!(100),
            confidence: 78.0,
            timeframe: timeframe.to_string(),
            conditions: ConditionSet::new(),
            tp1,
            tp2,
            tp3,
            sl,
            tp1_possibility: 70.0,
            tp2_possibility: 50.0,
            tp3_possibility: 30.0,
            volume: dec!(1500),
            quote_volume_24h: dec!(2500000),
            trade_type: TradeType::Normal,
            trade_duration: "Up to 6 hours".to_string(),
            timestamp: Utc::now(),
            macd_status,
            leverage: 30,
            btc_trend: 1.2,
            ma200_status: TrendStatus::Bullish,
        }
    }

    #[test]
    fn test_tp1_percent() {
        let signal = sample_signal(SignalType::SHORT, "1h");
        assert_eq!(signal.tp1_percent(), dec!(1));
    }

    #[test]
    fn test_signal_serializes_labels() {
        let signal = sample_signal(SignalType::LONG, "4h");
        let json = serde_json::to_value(&signal).unwrap();
        assert_eq!(json["direction"], "LONG");
        assert_eq!(json["macd_status"], "bullish");
        assert_eq!(json["trade_type"], "Normal");
    }
}
