use tracing::warn;

use crate::types::TradeType;

/// Maps a timeframe to a trade style. Unknown timeframes fall back to Scalp.
pub fn classify_trade(timeframe: &str) -> TradeType {
    match timeframe {
        "15m" => TradeType::Scalp,
        "1h" | "4h" | "1d" => TradeType::Normal,
        other => {
            warn!("Unknown timeframe {}, defaulting to Scalp", other);
            TradeType::Scalp
        }
    }
}

pub fn trade_duration(timeframe: &str) -> &'static str {
    match timeframe {
        "15m" => "Up to 1 hour",
        "1h" => "Up to 6 hours",
        "4h" => "Up to 24 hours",
        "1d" => "Up to 3 days",
        _ => "Unknown",
    }
}

/// Suggested leverage from confidence and trend strength.
pub fn leverage(confidence: f64, adx: f64) -> u8 {
    if confidence > 80.0 && adx > 20.0 {
        40
    } else if confidence > 70.0 && adx > 15.0 {
        30
    } else if confidence > 60.0 && adx > 10.0 {
        20
    } else {
        10
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_trade() {
        assert_eq!(classify_trade("15m"), TradeType::Scalp);
        assert_eq!(classify_trade("1h"), TradeType::Normal);
        assert_eq!(classify_trade("4h"), TradeType::Normal);
        assert_eq!(classify_trade("1d"), TradeType::Normal);
        assert_eq!(classify_trade("3m"), TradeType::Scalp);
        assert_eq!(classify_trade(""), TradeType::Scalp);
    }

    #[test]
    fn test_trade_duration() {
        assert_eq!(trade_duration("4h"), "Up to 24 hours");
        assert_eq!(trade_duration("1w"), "Unknown");
    }

    #[test]
    fn test_leverage_tiers() {
        assert_eq!(leverage(85.0, 25.0), 40);
        assert_eq!(leverage(85.0, 18.0), 30);
        assert_eq!(leverage(75.0, 16.0), 30);
        assert_eq!(leverage(65.0, 16.0), 20);
        assert_eq!(leverage(60.0, 30.0), 10);
        assert_eq!(leverage(95.0, 5.0), 10);
    }
}
