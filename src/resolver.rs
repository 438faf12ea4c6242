use std::fmt;

use crate::conditions::{Condition, ConditionSet};
use crate::types::SignalType;

pub const MIN_DIRECTION_CONFIDENCE: f64 = 40.0;
/// Above this confidence a contrary macro trend no longer blocks the signal.
pub const MACRO_OVERRIDE_CONFIDENCE: f64 = 80.0;
pub const MACRO_TREND_LIMIT: f64 = 5.0;

pub const BULLISH_EVIDENCE: [Condition; 6] = [
    Condition::BullishMacd,
    Condition::OversoldRsi,
    Condition::BullishEngulfing,
    Condition::Hammer,
    Condition::NearSupport,
    Condition::ThreeWhiteSoldiers,
];

pub const BEARISH_EVIDENCE: [Condition; 6] = [
    Condition::BearishMacd,
    Condition::OverboughtRsi,
    Condition::BearishEngulfing,
    Condition::ShootingStar,
    Condition::NearResistance,
    Condition::ThreeBlackCrows,
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    /// LONG evidence, but also overbought and pressing on resistance.
    Contradictory,
    /// Macro trend runs against the direction and confidence is below the override.
    MacroHeadwind { direction: SignalType, btc_trend: f64 },
    NoClearDirection,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Contradictory => write!(f, "Overbought RSI and Near Resistance"),
            Rejection::MacroHeadwind { direction, btc_trend } => {
                write!(f, "{} against BTC trend ({:.2}%) with low confidence", direction, btc_trend)
            }
            Rejection::NoClearDirection => write!(f, "no clear direction"),
        }
    }
}

fn long_clause(conditions: &ConditionSet, confidence: f64) -> bool {
    conditions.contains_any(&BULLISH_EVIDENCE)
        && conditions.contains(Condition::BullishMacd)
        && confidence >= MIN_DIRECTION_CONFIDENCE
        && !conditions.contains(Condition::BearishMa200)
}

fn short_clause(conditions: &ConditionSet, confidence: f64) -> bool {
    conditions.contains_any(&BEARISH_EVIDENCE)
        && conditions.contains(Condition::BearishMacd)
        && confidence >= MIN_DIRECTION_CONFIDENCE
        && !conditions.contains(Condition::BullishMa200)
}

/// Picks LONG or SHORT from the evidence. LONG is checked first and, once its
/// clause matches, its guards decide the outcome without falling through.
pub fn resolve_direction(
    conditions: &ConditionSet,
    confidence: f64,
    btc_trend: f64,
) -> Result<SignalType, Rejection> {
    if long_clause(conditions, confidence) {
        if conditions.contains(Condition::OverboughtRsi) && conditions.contains(Condition::NearResistance) {
            return Err(Rejection::Contradictory);
        }
        if btc_trend < -MACRO_TREND_LIMIT && confidence < MACRO_OVERRIDE_CONFIDENCE {
            return Err(Rejection::MacroHeadwind { direction: SignalType::LONG, btc_trend });
        }
        return Ok(SignalType::LONG);
    }

    if short_clause(conditions, confidence) {
        if btc_trend > MACRO_TREND_LIMIT && confidence < MACRO_OVERRIDE_CONFIDENCE {
            return Err(Rejection::MacroHeadwind { direction: SignalType::SHORT, btc_trend });
        }
        return Ok(SignalType::SHORT);
    }

    Err(Rejection::NoClearDirection)
}
