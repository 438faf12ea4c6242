// =============================================================================
// CANDLESTICK PATTERNS
// Evaluated on the most recent candle of a window
// =============================================================================

use rust_decimal::Decimal;
use serde::Serialize;

use crate::types::Candle;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PatternFlags {
    pub bullish_engulfing: bool,
    pub bearish_engulfing: bool,
    pub doji: bool,
    pub hammer: bool,
    pub shooting_star: bool,
    pub three_white_soldiers: bool,
    pub three_black_crows: bool,
}

pub fn detect(candles: &[Candle]) -> PatternFlags {
    PatternFlags {
        bullish_engulfing: is_bullish_engulfing(candles),
        bearish_engulfing: is_bearish_engulfing(candles),
        doji: is_doji(candles),
        hammer: is_hammer(candles),
        shooting_star: is_shooting_star(candles),
        three_white_soldiers: is_three_white_soldiers(candles),
        three_black_crows: is_three_black_crows(candles),
    }
}

fn body(c: &Candle) -> Decimal {
    (c.close - c.open).abs()
}

fn upper_shadow(c: &Candle) -> Decimal {
    c.high - c.open.max(c.close)
}

fn lower_shadow(c: &Candle) -> Decimal {
    c.open.min(c.close) - c.low
}

fn last_two(candles: &[Candle]) -> Option<(&Candle, &Candle)> {
    match candles {
        [.., prev, curr] => Some((prev, curr)),
        _ => None,
    }
}

fn last_three(candles: &[Candle]) -> Option<(&Candle, &Candle, &Candle)> {
    match candles {
        [.., a, b, c] => Some((a, b, c)),
        _ => None,
    }
}

pub fn is_bullish_engulfing(candles: &[Candle]) -> bool {
    last_two(candles).map_or(false, |(prev, curr)| {
        prev.is_bearish() && curr.is_bullish() && curr.open <= prev.close && curr.close >= prev.open
    })
}

pub fn is_bearish_engulfing(candles: &[Candle]) -> bool {
    last_two(candles).map_or(false, |(prev, curr)| {
        prev.is_bullish() && curr.is_bearish() && curr.open >= prev.close && curr.close <= prev.open
    })
}

pub fn is_doji(candles: &[Candle]) -> bool {
    candles.last().map_or(false, |c| {
        let range = c.high - c.low;
        range > Decimal::ZERO && body(c) <= range * Decimal::new(1, 1)
    })
}

pub fn is_hammer(candles: &[Candle]) -> bool {
    candles.last().map_or(false, |c| {
        let b = body(c);
        b > Decimal::ZERO && lower_shadow(c) >= b * Decimal::TWO && upper_shadow(c) <= b
    })
}

pub fn is_shooting_star(candles: &[Candle]) -> bool {
    candles.last().map_or(false, |c| {
        let b = body(c);
        b > Decimal::ZERO && upper_shadow(c) >= b * Decimal::TWO && lower_shadow(c) <= b
    })
}

pub fn is_three_white_soldiers(candles: &[Candle]) -> bool {
    last_three(candles).map_or(false, |(a, b, c)| {
        [a, b, c].iter().all(|x| x.is_bullish())
            && b.close > a.close
            && c.close > b.close
            && b.open >= a.open
            && b.open <= a.close
            && c.open >= b.open
            && c.open <= b.close
    })
}

pub fn is_three_black_crows(candles: &[Candle]) -> bool {
    last_three(candles).map_or(false, |(a, b, c)| {
        [a, b, c].iter().all(|x| x.is_bearish())
            && b.close < a.close
            && c.close < b.close
            && b.open <= a.open
            && b.open >= a.close
            && c.open <= b.open
            && c.open >= b.close
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn candle(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Candle {
        Candle {
            open_time: Utc::now(),
            open,
            high,
            low,
            close,
            volume: dec!(1000),
            close_time: None,
        }
    }

    #[test]
    fn test_bullish_engulfing() {
        let window = vec![
            candle(dec!(105), dec!(106), dec!(99), dec!(100)),
            candle(dec!(99), dec!(108), dec!(98), dec!(107)),
        ];
        let flags = detect(&window);
        assert!(flags.bullish_engulfing);
        assert!(!flags.bearish_engulfing);
    }

    #[test]
    fn test_bearish_engulfing() {
        let window = vec![
            candle(dec!(100), dec!(106), dec!(99), dec!(105)),
            candle(dec!(106), dec!(107), dec!(98), dec!(99)),
        ];
        let flags = detect(&window);
        assert!(flags.bearish_engulfing);
        assert!(!flags.bullish_engulfing);
    }

    #[test]
    fn test_doji() {
        let window = vec![candle(dec!(100), dec!(105), dec!(95), dec!(100.5))];
        assert!(detect(&window).doji);

        let window = vec![candle(dec!(100), dec!(105), dec!(95), dec!(104))];
        assert!(!detect(&window).doji);

        // Zero range is not a doji
        let window = vec![candle(dec!(100), dec!(100), dec!(100), dec!(100))];
        assert!(!detect(&window).doji);
    }

    #[test]
    fn test_hammer_and_shooting_star() {
        // body 1, lower shadow 4, upper shadow 0.5
        let hammer = vec![candle(dec!(100), dec!(101.5), dec!(96), dec!(101))];
        let flags = detect(&hammer);
        assert!(flags.hammer);
        assert!(!flags.shooting_star);

        // body 1, upper shadow 4, lower shadow 0.5
        let star = vec![candle(dec!(101), dec!(105), dec!(99.5), dec!(100))];
        let flags = detect(&star);
        assert!(flags.shooting_star);
        assert!(!flags.hammer);
    }

    #[test]
    fn test_three_white_soldiers() {
        let window = vec![
            candle(dec!(100), dec!(103), dec!(99), dec!(102)),
            candle(dec!(101), dec!(105), dec!(100), dec!(104)),
            candle(dec!(103), dec!(107), dec!(102), dec!(106)),
        ];
        let flags = detect(&window);
        assert!(flags.three_white_soldiers);
        assert!(!flags.three_black_crows);
    }

    #[test]
    fn test_three_black_crows() {
        let window = vec![
            candle(dec!(106), dec!(107), dec!(103), dec!(104)),
            candle(dec!(105), dec!(106), dec!(101), dec!(102)),
            candle(dec!(103), dec!(104), dec!(99), dec!(100)),
        ];
        let flags = detect(&window);
        assert!(flags.three_black_crows);
        assert!(!flags.three_white_soldiers);
    }

    #[test]
    fn test_short_windows_yield_no_multi_candle_patterns() {
        let window = vec![candle(dec!(99), dec!(108), dec!(98), dec!(107))];
        let flags = detect(&window);
        assert!(!flags.bullish_engulfing);
        assert!(!flags.three_white_soldiers);
        assert_eq!(detect(&[]), PatternFlags::default());
    }
}
