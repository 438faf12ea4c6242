// =============================================================================
// SUPPORT / RESISTANCE & FIBONACCI LEVELS
// =============================================================================

use serde::Serialize;

use crate::indicators::IndicatorRow;

/// Standard retracement ratios between the swing low (0.0) and swing high (1.0).
pub const FIB_RATIOS: [f64; 7] = [0.0, 0.236, 0.382, 0.5, 0.618, 0.786, 1.0];

pub const DEFAULT_LOOKBACK: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Levels {
    pub support: f64,
    pub resistance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FibonacciLevels {
    pub swing_low: f64,
    pub swing_high: f64,
    /// Prices ascending from the swing low to the swing high.
    pub levels: Vec<f64>,
}

impl FibonacciLevels {
    pub fn from_swing(swing_low: f64, swing_high: f64) -> Self {
        let span = swing_high - swing_low;
        Self {
            swing_low,
            swing_high,
            levels: FIB_RATIOS.iter().map(|r| swing_low + span * r).collect(),
        }
    }
}

/// Derives support/resistance from the swing range of the recent rows,
/// snapped to the closest Fibonacci level on each side of the price.
#[derive(Debug, Clone)]
pub struct SupportResistance {
    lookback: usize,
}

impl Default for SupportResistance {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKBACK)
    }
}

impl SupportResistance {
    pub fn new(lookback: usize) -> Self {
        Self { lookback: lookback.max(1) }
    }

    pub fn fibonacci(&self, rows: &[IndicatorRow]) -> Option<FibonacciLevels> {
        let recent = &rows[rows.len().saturating_sub(self.lookback)..];
        if recent.is_empty() {
            return None;
        }
        let swing_low = recent.iter().map(|r| r.low).fold(f64::INFINITY, f64::min);
        let swing_high = recent.iter().map(|r| r.high).fold(f64::NEG_INFINITY, f64::max);
        Some(FibonacciLevels::from_swing(swing_low, swing_high))
    }

    pub fn levels(&self, rows: &[IndicatorRow]) -> Option<Levels> {
        let price = rows.last()?.close;
        let fib = self.fibonacci(rows)?;

        let support = fib
            .levels
            .iter()
            .copied()
            .filter(|l| *l <= price)
            .fold(fib.swing_low, f64::max);
        let resistance = fib
            .levels
            .iter()
            .copied()
            .filter(|l| *l >= price)
            .fold(fib.swing_high, f64::min);

        Some(Levels { support, resistance })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::calculate_indicators;
    use crate::indicators::tests::make_candles;

    #[test]
    fn test_fibonacci_levels_span_swing() {
        let fib = FibonacciLevels::from_swing(100.0, 200.0);
        assert_eq!(fib.levels.first(), Some(&100.0));
        assert_eq!(fib.levels.last(), Some(&200.0));
        assert!((fib.levels[3] - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_levels_bracket_price() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let frame = calculate_indicators(&make_candles(&closes));
        let levels = SupportResistance::default().levels(frame.rows()).unwrap();
        let price = frame.latest().unwrap().close;
        assert!(levels.support <= price);
        assert!(levels.resistance >= price);
    }

    #[test]
    fn test_levels_snap_to_fib() {
        // Rows 10..=110 range, price in the middle
        let mut closes: Vec<f64> = vec![11.0, 109.0];
        closes.push(62.0);
        let frame = calculate_indicators(&make_candles(&closes));
        let levels = SupportResistance::new(10).levels(frame.rows()).unwrap();
        // swing low 10, high 110 -> 0.5 level = 60, 0.618 level = 71.8
        assert!((levels.support - 60.0).abs() < 1e-9);
        assert!((levels.resistance - 71.8).abs() < 1e-9);
    }

    #[test]
    fn test_empty_rows() {
        assert!(SupportResistance::default().levels(&[]).is_none());
    }
}
