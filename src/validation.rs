// =============================================================================
// CANDLE WINDOW VALIDATION
// =============================================================================

use rust_decimal::Decimal;

use crate::error::{EngineError, Result};
use crate::types::Candle;

/// Minimum history for a full prediction (MA200 needs 200 closes).
pub const PREDICTION_MIN_CANDLES: usize = 200;
/// Minimum history for the lighter confirmation checks.
pub const LIGHT_MIN_CANDLES: usize = 50;
/// Minimum history for the fake-breakout check.
pub const BREAKOUT_MIN_CANDLES: usize = 3;

/// Rejects windows that are too short, out of order, carry non-positive
/// closes or volumes, or have a high/low range that does not contain the body.
pub fn validate_window(candles: &[Candle], min_len: usize) -> Result<()> {
    if candles.len() < min_len {
        return Err(EngineError::InvalidInput(format!(
            "insufficient data: {} candles, need {}",
            candles.len(),
            min_len
        )));
    }

    for (i, candle) in candles.iter().enumerate() {
        if candle.close <= Decimal::ZERO {
            return Err(EngineError::InvalidInput(format!(
                "non-positive close {} at index {}",
                candle.close, i
            )));
        }
        if candle.volume <= Decimal::ZERO {
            return Err(EngineError::InvalidInput(format!(
                "non-positive volume {} at index {}",
                candle.volume, i
            )));
        }
        if candle.high < candle.open.max(candle.close) || candle.low > candle.open.min(candle.close) {
            return Err(EngineError::InvalidInput(format!(
                "inconsistent range at index {}: high {} low {} for body {}-{}",
                i, candle.high, candle.low, candle.open, candle.close
            )));
        }
    }

    if let Some(pos) = candles.windows(2).position(|w| w[1].open_time <= w[0].open_time) {
        return Err(EngineError::InvalidInput(format!(
            "candles not strictly chronological at index {}",
            pos + 1
        )));
    }

    Ok(())
}
