use rust_decimal::prelude::*;
use serde::Serialize;
use tracing::warn;

use crate::error::{EngineError, Result};
use crate::types::SignalType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Targets {
    pub entry: Decimal,
    pub tp1: Decimal,
    pub tp2: Decimal,
    pub tp3: Decimal,
    pub sl: Decimal,
    /// ATR actually used after the fallback.
    pub atr: Decimal,
    /// True when the TP1 band guard replaced the formula value.
    pub tp1_adjusted: bool,
}

impl Targets {
    /// TP1 distance from entry as a fraction of entry. `None` when the
    /// quotient does not fit in a Decimal.
    pub fn tp1_ratio(&self) -> Option<Decimal> {
        tp1_ratio(self.entry, self.tp1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Possibilities {
    pub tp1: f64,
    pub tp2: f64,
    pub tp3: f64,
}

// (minimum distance as fraction of entry, ATR multiple)
const TP1_RULE: (Decimal, Decimal) = (Decimal::from_parts(5, 0, 0, false, 3), Decimal::from_parts(5, 0, 0, false, 1));
const TP2_RULE: (Decimal, Decimal) = (Decimal::from_parts(15, 0, 0, false, 3), Decimal::ONE);
const TP3_RULE: (Decimal, Decimal) = (Decimal::from_parts(3, 0, 0, false, 2), Decimal::TWO);
const SL_RULE: (Decimal, Decimal) = (Decimal::from_parts(8, 0, 0, false, 3), Decimal::from_parts(8, 0, 0, false, 1));

const TP1_MIN_RATIO: Decimal = Decimal::from_parts(5, 0, 0, false, 3);
const TP1_MAX_RATIO: Decimal = Decimal::from_parts(3, 0, 0, false, 2);
const TP1_RESET_RATIO: Decimal = Decimal::from_parts(15, 0, 0, false, 3);

const ATR_FALLBACK_RATIO: Decimal = Decimal::from_parts(1, 0, 0, false, 1);
const ATR_FALLBACK_FLOOR: Decimal = Decimal::from_parts(2, 0, 0, false, 2);

/// ATR as a price, falling back to `max(0.1 * entry, 0.02)` when the value is
/// not representable or not positive.
pub fn effective_atr(entry: Decimal, atr: f64) -> Decimal {
    match Decimal::from_f64(atr) {
        Some(a) if a > Decimal::ZERO => a,
        _ => (entry * ATR_FALLBACK_RATIO).max(ATR_FALLBACK_FLOOR),
    }
}

fn distance(entry: Decimal, atr: Decimal, rule: (Decimal, Decimal)) -> Result<Decimal> {
    let (ratio, multiple) = rule;
    let by_ratio = entry.checked_mul(ratio);
    let by_atr = atr.checked_mul(multiple);
    match (by_ratio, by_atr) {
        (Some(r), Some(a)) => Ok(r.max(a)),
        _ => Err(EngineError::InvalidInput(format!("target distance overflow (entry {}, atr {})", entry, atr))),
    }
}

fn tp1_ratio(entry: Decimal, tp1: Decimal) -> Option<Decimal> {
    tp1.checked_sub(entry)?.abs().checked_div(entry)
}

fn shift(entry: Decimal, offset: Decimal, up: bool) -> Result<Decimal> {
    let shifted = if up { entry.checked_add(offset) } else { entry.checked_sub(offset) };
    shifted.ok_or_else(|| EngineError::InvalidInput(format!("target price overflow (entry {})", entry)))
}

pub fn calculate_targets(direction: SignalType, entry: Decimal, atr: f64) -> Result<Targets> {
    if entry <= Decimal::ZERO {
        return Err(EngineError::InvalidInput(format!("entry price must be positive, got {}", entry)));
    }

    let atr = effective_atr(entry, atr);
    let long = direction == SignalType::LONG;

    let mut tp1 = shift(entry, distance(entry, atr, TP1_RULE)?, long)?;
    let tp2 = shift(entry, distance(entry, atr, TP2_RULE)?, long)?;
    let tp3 = shift(entry, distance(entry, atr, TP3_RULE)?, long)?;
    let sl = shift(entry, distance(entry, atr, SL_RULE)?, !long)?;

    // An unrepresentable ratio is far outside the band
    let tp1_adjusted = match tp1_ratio(entry, tp1) {
        Some(ratio) => ratio < TP1_MIN_RATIO || ratio > TP1_MAX_RATIO,
        None => true,
    };
    if tp1_adjusted {
        warn!("TP1 {} out of 0.5-3% range from entry {}, adjusting", tp1, entry);
        tp1 = shift(entry, entry * TP1_RESET_RATIO, long)?;
    }

    Ok(Targets { entry, tp1, tp2, tp3, sl, atr, tp1_adjusted })
}

pub fn possibilities(confidence: f64) -> Possibilities {
    let (tp1, tp2, tp3) = if confidence > 75.0 { (70.0, 50.0, 30.0) } else { (60.0, 40.0, 20.0) };
    Possibilities {
        tp1: f64::clamp(tp1, 0.0, 100.0),
        tp2: f64::clamp(tp2, 0.0, 100.0),
        tp3: f64::clamp(tp3, 0.0, 100.0),
    }
}
