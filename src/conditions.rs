// =============================================================================
// CONDITION EXTRACTION & CONFIDENCE SCORING
// =============================================================================
//
// Evidence is collected by an ordered list of named rules. A rule either
// contributes tags or aborts the whole evaluation; rules after an abort are
// never run.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::indicators::IndicatorRow;
use crate::levels::Levels;
use crate::patterns::PatternFlags;

pub const BASE_CONFIDENCE: f64 = 40.0;
pub const MIN_CONDITIONS: usize = 4;

const RSI_OVERSOLD: f64 = 42.0;
const RSI_OVERBOUGHT: f64 = 58.0;
const RSI_NEUTRAL_LOW: f64 = 45.0;
const RSI_NEUTRAL_HIGH: f64 = 55.0;
const NEUTRAL_RSI_MIN_ADX: f64 = 20.0;
const MIN_TREND_ADX: f64 = 15.0;
const LEVEL_PROXIMITY: f64 = 0.1;
const HIGH_VOLUME_FACTOR: f64 = 1.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    #[serde(rename = "Oversold RSI")]
    OversoldRsi,
    #[serde(rename = "Overbought RSI")]
    OverboughtRsi,
    #[serde(rename = "Neutral RSI with Strong Trend")]
    NeutralRsiStrongTrend,
    #[serde(rename = "Bullish MACD")]
    BullishMacd,
    #[serde(rename = "Bearish MACD")]
    BearishMacd,
    #[serde(rename = "Strong Trend")]
    StrongTrend,
    #[serde(rename = "Bearish MA200")]
    BearishMa200,
    #[serde(rename = "Bullish MA200")]
    BullishMa200,
    #[serde(rename = "Bullish Engulfing")]
    BullishEngulfing,
    #[serde(rename = "Bearish Engulfing")]
    BearishEngulfing,
    #[serde(rename = "Doji")]
    Doji,
    #[serde(rename = "Hammer")]
    Hammer,
    #[serde(rename = "Shooting Star")]
    ShootingStar,
    #[serde(rename = "Three White Soldiers")]
    ThreeWhiteSoldiers,
    #[serde(rename = "Three Black Crows")]
    ThreeBlackCrows,
    #[serde(rename = "Near Support")]
    NearSupport,
    #[serde(rename = "Near Resistance")]
    NearResistance,
    #[serde(rename = "High Volume")]
    HighVolume,
}

impl Condition {
    pub const ALL: [Condition; 18] = [
        Condition::OversoldRsi,
        Condition::OverboughtRsi,
        Condition::NeutralRsiStrongTrend,
        Condition::BullishMacd,
        Condition::BearishMacd,
        Condition::StrongTrend,
        Condition::BearishMa200,
        Condition::BullishMa200,
        Condition::BullishEngulfing,
        Condition::BearishEngulfing,
        Condition::Doji,
        Condition::Hammer,
        Condition::ShootingStar,
        Condition::ThreeWhiteSoldiers,
        Condition::ThreeBlackCrows,
        Condition::NearSupport,
        Condition::NearResistance,
        Condition::HighVolume,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Condition::OversoldRsi => "Oversold RSI",
            Condition::OverboughtRsi => "Overbought RSI",
            Condition::NeutralRsiStrongTrend => "Neutral RSI with Strong Trend",
            Condition::BullishMacd => "Bullish MACD",
            Condition::BearishMacd => "Bearish MACD",
            Condition::StrongTrend => "Strong Trend",
            Condition::BearishMa200 => "Bearish MA200",
            Condition::BullishMa200 => "Bullish MA200",
            Condition::BullishEngulfing => "Bullish Engulfing",
            Condition::BearishEngulfing => "Bearish Engulfing",
            Condition::Doji => "Doji",
            Condition::Hammer => "Hammer",
            Condition::ShootingStar => "Shooting Star",
            Condition::ThreeWhiteSoldiers => "Three White Soldiers",
            Condition::ThreeBlackCrows => "Three Black Crows",
            Condition::NearSupport => "Near Support",
            Condition::NearResistance => "Near Resistance",
            Condition::HighVolume => "High Volume",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Evidence tags in evaluation order. Each tag appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionSet(Vec<Condition>);

impl ConditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, condition: Condition) {
        if !self.0.contains(&condition) {
            self.0.push(condition);
        }
    }

    pub fn contains(&self, condition: Condition) -> bool {
        self.0.contains(&condition)
    }

    pub fn contains_any(&self, conditions: &[Condition]) -> bool {
        conditions.iter().any(|c| self.contains(*c))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.0.iter()
    }
}

impl FromIterator<Condition> for ConditionSet {
    fn from_iter<I: IntoIterator<Item = Condition>>(iter: I) -> Self {
        let mut set = ConditionSet::new();
        for c in iter {
            set.insert(c);
        }
        set
    }
}

impl fmt::Display for ConditionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("None");
        }
        let labels: Vec<&str> = self.0.iter().map(|c| c.label()).collect();
        f.write_str(&labels.join(", "))
    }
}

/// A deliberate no-signal decision. Not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    NeutralRsiWeakTrend,
    WeakTrend,
    InsufficientConditions(usize),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::NeutralRsiWeakTrend => write!(f, "neutral RSI without strong trend"),
            AbortReason::WeakTrend => write!(f, "weak trend (ADX <= {})", MIN_TREND_ADX),
            AbortReason::InsufficientConditions(n) => {
                write!(f, "insufficient conditions ({} < {})", n, MIN_CONDITIONS)
            }
        }
    }
}

/// Everything the rules look at for the latest candle.
#[derive(Debug, Clone, Copy)]
pub struct EvidenceInput<'a> {
    pub row: &'a IndicatorRow,
    pub patterns: PatternFlags,
    pub levels: Levels,
}

pub type RuleOutcome = Result<Vec<Condition>, AbortReason>;

pub struct Rule {
    pub name: &'static str,
    pub apply: fn(&EvidenceInput<'_>) -> RuleOutcome,
}

/// Evaluation order is part of the contract: RSI and ADX exits must run
/// before later tags are computed.
pub const RULES: [Rule; 7] = [
    Rule { name: "rsi", apply: rsi_rule },
    Rule { name: "macd", apply: macd_rule },
    Rule { name: "adx", apply: adx_rule },
    Rule { name: "ma200", apply: ma200_rule },
    Rule { name: "patterns", apply: pattern_rule },
    Rule { name: "support_resistance", apply: level_rule },
    Rule { name: "volume", apply: volume_rule },
];

pub fn rsi_rule(input: &EvidenceInput<'_>) -> RuleOutcome {
    let row = input.row;
    if row.rsi < RSI_OVERSOLD {
        Ok(vec![Condition::OversoldRsi])
    } else if row.rsi > RSI_OVERBOUGHT {
        Ok(vec![Condition::OverboughtRsi])
    } else if (RSI_NEUTRAL_LOW..=RSI_NEUTRAL_HIGH).contains(&row.rsi) {
        if row.adx > NEUTRAL_RSI_MIN_ADX || row.close > row.ma50 {
            Ok(vec![Condition::NeutralRsiStrongTrend])
        } else {
            Err(AbortReason::NeutralRsiWeakTrend)
        }
    } else {
        Ok(Vec::new())
    }
}

pub fn macd_rule(input: &EvidenceInput<'_>) -> RuleOutcome {
    let row = input.row;
    if row.macd > row.macd_signal {
        Ok(vec![Condition::BullishMacd])
    } else if row.macd < row.macd_signal {
        Ok(vec![Condition::BearishMacd])
    } else {
        Ok(Vec::new())
    }
}

pub fn adx_rule(input: &EvidenceInput<'_>) -> RuleOutcome {
    if input.row.adx > MIN_TREND_ADX {
        Ok(vec![Condition::StrongTrend])
    } else {
        Err(AbortReason::WeakTrend)
    }
}

pub fn ma200_rule(input: &EvidenceInput<'_>) -> RuleOutcome {
    let row = input.row;
    if row.close < row.ma200 {
        Ok(vec![Condition::BearishMa200])
    } else if row.close > row.ma200 {
        Ok(vec![Condition::BullishMa200])
    } else {
        Ok(Vec::new())
    }
}

pub fn pattern_rule(input: &EvidenceInput<'_>) -> RuleOutcome {
    let p = input.patterns;
    let tags = [
        (p.bullish_engulfing, Condition::BullishEngulfing),
        (p.bearish_engulfing, Condition::BearishEngulfing),
        (p.doji, Condition::Doji),
        (p.hammer, Condition::Hammer),
        (p.shooting_star, Condition::ShootingStar),
        (p.three_white_soldiers, Condition::ThreeWhiteSoldiers),
        (p.three_black_crows, Condition::ThreeBlackCrows),
    ];
    Ok(tags.into_iter().filter(|(hit, _)| *hit).map(|(_, c)| c).collect())
}

pub fn level_rule(input: &EvidenceInput<'_>) -> RuleOutcome {
    let price = input.row.close;
    let mut tags = Vec::new();
    if (price - input.levels.support).abs() / price < LEVEL_PROXIMITY {
        tags.push(Condition::NearSupport);
    }
    if (price - input.levels.resistance).abs() / price < LEVEL_PROXIMITY {
        tags.push(Condition::NearResistance);
    }
    Ok(tags)
}

pub fn volume_rule(input: &EvidenceInput<'_>) -> RuleOutcome {
    let row = input.row;
    if row.volume > row.volume_sma_20 * HIGH_VOLUME_FACTOR {
        Ok(vec![Condition::HighVolume])
    } else {
        Ok(Vec::new())
    }
}

/// Runs every rule in order, stopping at the first abort.
pub fn extract_conditions(input: &EvidenceInput<'_>) -> Result<ConditionSet, AbortReason> {
    let mut conditions = ConditionSet::new();
    for rule in RULES.iter() {
        for tag in (rule.apply)(input)? {
            conditions.insert(tag);
        }
    }
    Ok(conditions)
}

// Groups award their bonus once, whichever member is present.
const BONUSES: [(&[Condition], f64); 8] = [
    (&[Condition::BullishMacd, Condition::BearishMacd], 15.0),
    (
        &[
            Condition::BullishEngulfing,
            Condition::BearishEngulfing,
            Condition::Hammer,
            Condition::ShootingStar,
        ],
        10.0,
    ),
    (&[Condition::StrongTrend], 8.0),
    (&[Condition::NearSupport, Condition::NearResistance], 10.0),
    (&[Condition::HighVolume], 10.0),
    (&[Condition::OversoldRsi, Condition::OverboughtRsi], 5.0),
    (&[Condition::ThreeWhiteSoldiers, Condition::ThreeBlackCrows], 10.0),
    (&[Condition::Doji], 5.0),
];

pub fn score(conditions: &ConditionSet) -> f64 {
    let raw = BONUSES
        .iter()
        .filter(|(group, _)| conditions.contains_any(group))
        .fold(BASE_CONFIDENCE, |acc, (_, bonus)| acc + bonus);
    raw.clamp(0.0, 100.0)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Evidence { conditions: ConditionSet, confidence: f64 },
    Abort(AbortReason),
}

/// Scores a condition set and applies the minimum-conditions gate.
pub fn finalize(conditions: ConditionSet) -> Evaluation {
    let confidence = score(&conditions);
    if conditions.len() < MIN_CONDITIONS {
        return Evaluation::Abort(AbortReason::InsufficientConditions(conditions.len()));
    }
    Evaluation::Evidence { conditions, confidence }
}

pub fn evaluate(input: &EvidenceInput<'_>) -> Evaluation {
    match extract_conditions(input) {
        Ok(conditions) => finalize(conditions),
        Err(reason) => Evaluation::Abort(reason),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::TrendStatus;
    use proptest::prelude::*;

    /// Oversold, bullish MACD, strong trend, above MA200, near support, high volume.
    pub(crate) fn bullish_row() -> IndicatorRow {
        IndicatorRow {
            open: 99.0,
            high: 101.0,
            low: 98.0,
            close: 100.0,
            volume: 1500.0,
            rsi: 35.0,
            macd: 1.0,
            macd_signal: 0.5,
            macd_status: TrendStatus::Bullish,
            atr: 2.0,
            adx: 25.0,
            ema_20: 99.0,
            ema_50: 97.0,
            ma50: 96.0,
            ma200: 90.0,
            volume_sma_20: 1000.0,
        }
    }

    pub(crate) fn far_levels() -> Levels {
        Levels { support: 50.0, resistance: 200.0 }
    }

    fn input(row: &IndicatorRow) -> EvidenceInput<'_> {
        EvidenceInput { row, patterns: PatternFlags::default(), levels: far_levels() }
    }

    #[test]
    fn test_rule_order_matches_evaluation_contract() {
        let names: Vec<&str> = RULES.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec!["rsi", "macd", "adx", "ma200", "patterns", "support_resistance", "volume"]
        );
    }

    #[test]
    fn test_rsi_bands() {
        let mut row = bullish_row();
        row.rsi = 41.99;
        assert_eq!(rsi_rule(&input(&row)), Ok(vec![Condition::OversoldRsi]));
        row.rsi = 58.01;
        assert_eq!(rsi_rule(&input(&row)), Ok(vec![Condition::OverboughtRsi]));
        // Between bands: no tag, no abort
        row.rsi = 43.0;
        assert_eq!(rsi_rule(&input(&row)), Ok(vec![]));
        row.rsi = 57.0;
        assert_eq!(rsi_rule(&input(&row)), Ok(vec![]));
        row.rsi = 45.0;
        assert_eq!(rsi_rule(&input(&row)), Ok(vec![Condition::NeutralRsiStrongTrend]));
    }

    #[test]
    fn test_neutral_rsi_weak_trend_aborts() {
        let mut row = bullish_row();
        row.rsi = 50.0;
        row.adx = 10.0;
        row.close = 95.0;
        row.ma50 = 96.0;
        assert_eq!(evaluate(&input(&row)), Evaluation::Abort(AbortReason::NeutralRsiWeakTrend));
    }

    #[test]
    fn test_neutral_rsi_rescued_by_price_above_ma50() {
        let mut row = bullish_row();
        row.rsi = 50.0;
        row.adx = 18.0;
        let conditions = extract_conditions(&input(&row)).unwrap();
        assert!(conditions.contains(Condition::NeutralRsiStrongTrend));
    }

    #[test]
    fn test_macd_tie_tags_neither() {
        let mut row = bullish_row();
        row.macd = 0.5;
        assert_eq!(macd_rule(&input(&row)), Ok(vec![]));
        row.macd = 0.4;
        assert_eq!(macd_rule(&input(&row)), Ok(vec![Condition::BearishMacd]));
    }

    #[test]
    fn test_adx_boundary_is_exclusive() {
        let mut row = bullish_row();
        row.adx = 15.0;
        assert_eq!(evaluate(&input(&row)), Evaluation::Abort(AbortReason::WeakTrend));

        row.adx = 15.0001;
        match evaluate(&input(&row)) {
            Evaluation::Evidence { conditions, .. } => {
                assert!(conditions.contains(Condition::StrongTrend));
                assert!(conditions.len() >= MIN_CONDITIONS);
            }
            other => panic!("expected evidence, got {:?}", other),
        }
    }

    #[test]
    fn test_ma200_equality_tags_neither() {
        let mut row = bullish_row();
        row.ma200 = row.close;
        assert_eq!(ma200_rule(&input(&row)), Ok(vec![]));
        row.ma200 = 120.0;
        assert_eq!(ma200_rule(&input(&row)), Ok(vec![Condition::BearishMa200]));
    }

    #[test]
    fn test_both_level_tags_may_fire() {
        let row = bullish_row();
        let evidence = EvidenceInput {
            row: &row,
            patterns: PatternFlags::default(),
            levels: Levels { support: 95.0, resistance: 105.0 },
        };
        assert_eq!(
            level_rule(&evidence),
            Ok(vec![Condition::NearSupport, Condition::NearResistance])
        );
    }

    #[test]
    fn test_volume_threshold() {
        let mut row = bullish_row();
        row.volume = 1050.0;
        assert_eq!(volume_rule(&input(&row)), Ok(vec![]));
        row.volume = 1050.1;
        assert_eq!(volume_rule(&input(&row)), Ok(vec![Condition::HighVolume]));
    }

    #[test]
    fn test_full_evidence_order() {
        let row = bullish_row();
        let evidence = EvidenceInput {
            row: &row,
            patterns: PatternFlags { hammer: true, doji: true, ..Default::default() },
            levels: Levels { support: 97.0, resistance: 200.0 },
        };
        let conditions = extract_conditions(&evidence).unwrap();
        let labels: Vec<&str> = conditions.iter().map(|c| c.label()).collect();
        assert_eq!(
            labels,
            vec![
                "Oversold RSI",
                "Bullish MACD",
                "Strong Trend",
                "Bullish MA200",
                "Doji",
                "Hammer",
                "Near Support",
                "High Volume"
            ]
        );
        // 40 + 15 + 10 + 8 + 10 + 10 + 5 + 5
        assert_eq!(score(&conditions), 100.0);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let everything: ConditionSet = Condition::ALL.into_iter().collect();
        // Unclamped total would be 113
        assert_eq!(score(&everything), 100.0);
        assert_eq!(score(&ConditionSet::new()), BASE_CONFIDENCE);
    }

    #[test]
    fn test_bonus_groups_award_once() {
        let set: ConditionSet =
            [Condition::BullishEngulfing, Condition::Hammer, Condition::ShootingStar].into_iter().collect();
        assert_eq!(score(&set), 50.0);
    }

    fn any_conditions() -> impl Strategy<Value = ConditionSet> {
        proptest::sample::subsequence(Condition::ALL.to_vec(), 0..=Condition::ALL.len())
            .prop_shuffle()
            .prop_map(|tags| tags.into_iter().collect::<ConditionSet>())
    }

    proptest! {
        #[test]
        fn test_fewer_than_four_conditions_never_pass(conditions in any_conditions()) {
            let count = conditions.len();
            let expected = score(&conditions);
            match finalize(conditions) {
                Evaluation::Abort(reason) => {
                    prop_assert!(count < MIN_CONDITIONS);
                    prop_assert_eq!(reason, AbortReason::InsufficientConditions(count));
                }
                Evaluation::Evidence { conditions, confidence } => {
                    prop_assert!(conditions.len() >= MIN_CONDITIONS);
                    prop_assert_eq!(confidence, expected);
                    prop_assert!((BASE_CONFIDENCE..=100.0).contains(&confidence));
                }
            }
        }
    }

    #[test]
    fn test_empty_evidence_aborts() {
        assert_eq!(
            finalize(ConditionSet::new()),
            Evaluation::Abort(AbortReason::InsufficientConditions(0))
        );
    }

    #[test]
    fn test_condition_set_display_and_serde() {
        let set: ConditionSet = [Condition::BullishMacd, Condition::HighVolume].into_iter().collect();
        assert_eq!(set.to_string(), "Bullish MACD, High Volume");
        assert_eq!(ConditionSet::new().to_string(), "None");
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["Bullish MACD","High Volume"]"#);
    }
}
