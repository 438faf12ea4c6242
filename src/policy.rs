// ============================================================
// Delivery Policy: which signals are worth sending
// ============================================================

use rust_decimal::Decimal;
use std::fmt;

use crate::types::{Signal, SignalType, TrendStatus};

pub const DEFAULT_MIN_CONFIDENCE: f64 = 60.0;

const TP1_MIN_PERCENT: Decimal = Decimal::from_parts(5, 0, 0, false, 1);
const TP1_MAX_PERCENT: Decimal = Decimal::from_parts(3, 0, 0, false, 0);

#[derive(Debug, Clone, PartialEq)]
pub enum PolicyRejection {
    LowConfidence { confidence: f64, min: f64 },
    MacdMismatch { direction: SignalType, macd_status: TrendStatus },
    Tp1OutOfRange { percent: Decimal },
}

impl fmt::Display for PolicyRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyRejection::LowConfidence { confidence, min } => {
                write!(f, "confidence {:.2}% below {:.0}%", confidence, min)
            }
            PolicyRejection::MacdMismatch { direction, macd_status } => {
                write!(f, "Invalid {} signal with {} MACD", direction, macd_status)
            }
            PolicyRejection::Tp1OutOfRange { percent } => {
                write!(f, "TP1 out of 0.5-3% range ({:.2}%)", percent)
            }
        }
    }
}

/// Final gate before a signal is announced and tracked.
#[derive(Debug, Clone)]
pub struct AcceptancePolicy {
    min_confidence: f64,
}

impl Default for AcceptancePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CONFIDENCE)
    }
}

impl AcceptancePolicy {
    pub fn new(min_confidence: f64) -> Self {
        Self { min_confidence }
    }

    pub fn check(&self, signal: &Signal) -> Result<(), PolicyRejection> {
        if signal.confidence < self.min_confidence {
            return Err(PolicyRejection::LowConfidence {
                confidence: signal.confidence,
                min: self.min_confidence,
            });
        }

        let expected = match signal.direction {
            SignalType::LONG => TrendStatus::Bullish,
            SignalType::SHORT => TrendStatus::Bearish,
        };
        if signal.macd_status != expected {
            return Err(PolicyRejection::MacdMismatch {
                direction: signal.direction,
                macd_status: signal.macd_status,
            });
        }

        let percent = signal.tp1_percent();
        if percent < TP1_MIN_PERCENT || percent > TP1_MAX_PERCENT {
            return Err(PolicyRejection::Tp1OutOfRange { percent });
        }

        Ok(())
    }
}
