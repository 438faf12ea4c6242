use rust_decimal::prelude::*;
use serde::Serialize;
use tracing::{debug, error};

use crate::error::{EngineError, Result};
use crate::types::{Candle, TrendStatus};

pub const RSI_PERIOD: usize = 14;
pub const ATR_PERIOD: usize = 14;
pub const ADX_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const VOLUME_SMA_PERIOD: usize = 20;

// =============================================================================
// STREAMING INDICATORS
// =============================================================================

#[derive(Debug, Clone)]
pub struct Ema {
    pub period: usize,
    pub current_value: Option<f64>,
    k: f64,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            current_value: None,
            k: 2.0 / (period as f64 + 1.0),
        }
    }

    // Seeds with the first price, then applies the usual smoothing.
    pub fn update(&mut self, price: f64) -> f64 {
        let new_val = match self.current_value {
            Some(prev) => (price - prev) * self.k + prev,
            None => price,
        };
        self.current_value = Some(new_val);
        new_val
    }
}

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    prev_close: Option<f64>,
    seed: Vec<f64>,
    pub current_value: Option<f64>,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            prev_close: None,
            seed: Vec::with_capacity(period),
            current_value: None,
        }
    }

    pub fn update(&mut self, high: f64, low: f64, close: f64) -> Option<f64> {
        let tr = true_range(high, low, self.prev_close);
        self.prev_close = Some(close);

        match self.current_value {
            Some(prev_atr) => {
                // RMA (Wilder): (prev * (n - 1) + tr) / n
                let n = self.period as f64;
                self.current_value = Some((prev_atr * (n - 1.0) + tr) / n);
            }
            None => {
                self.seed.push(tr);
                if self.seed.len() == self.period {
                    self.current_value = Some(self.seed.iter().sum::<f64>() / self.period as f64);
                }
            }
        }

        self.current_value
    }
}

#[derive(Debug, Clone)]
pub struct Rsi {
    pub period: usize,
    pub current_value: Option<f64>,
    prev_close: Option<f64>,
    seen: usize,
    avg_gain: f64,
    avg_loss: f64,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            current_value: None,
            prev_close: None,
            seen: 0,
            avg_gain: 0.0,
            avg_loss: 0.0,
        }
    }

    pub fn update(&mut self, close: f64) -> Option<f64> {
        if let Some(prev) = self.prev_close {
            let change = close - prev;
            let gain = change.max(0.0);
            let loss = (-change).max(0.0);
            let n = self.period as f64;

            self.seen += 1;
            if self.seen <= self.period {
                // Seed: plain average of the first `period` changes
                self.avg_gain += gain / n;
                self.avg_loss += loss / n;
            } else {
                self.avg_gain = (self.avg_gain * (n - 1.0) + gain) / n;
                self.avg_loss = (self.avg_loss * (n - 1.0) + loss) / n;
            }

            if self.seen >= self.period {
                let rsi = if self.avg_loss == 0.0 {
                    100.0
                } else {
                    let rs = self.avg_gain / self.avg_loss;
                    100.0 - (100.0 / (1.0 + rs))
                };
                self.current_value = Some(rsi);
            }
        }

        self.prev_close = Some(close);
        self.current_value
    }
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: Ema,
    slow: Ema,
    signal: Ema,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self {
            fast: Ema::new(fast),
            slow: Ema::new(slow),
            signal: Ema::new(signal),
        }
    }

    /// Returns (macd, signal).
    pub fn update(&mut self, close: f64) -> (f64, f64) {
        let macd = self.fast.update(close) - self.slow.update(close);
        let signal = self.signal.update(macd);
        (macd, signal)
    }
}

/// Wilder's Average Directional Index.
#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
    prev: Option<(f64, f64, f64)>, // high, low, close
    bars: usize,
    tr_sm: f64,
    plus_dm_sm: f64,
    minus_dm_sm: f64,
    dx_seed: Vec<f64>,
    pub current_value: Option<f64>,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            prev: None,
            bars: 0,
            tr_sm: 0.0,
            plus_dm_sm: 0.0,
            minus_dm_sm: 0.0,
            dx_seed: Vec::with_capacity(period),
            current_value: None,
        }
    }

    pub fn update(&mut self, high: f64, low: f64, close: f64) -> Option<f64> {
        let Some((prev_high, prev_low, prev_close)) = self.prev.replace((high, low, close)) else {
            return None;
        };

        let up = high - prev_high;
        let down = prev_low - low;
        let plus_dm = if up > down && up > 0.0 { up } else { 0.0 };
        let minus_dm = if down > up && down > 0.0 { down } else { 0.0 };
        let tr = true_range(high, low, Some(prev_close));

        let n = self.period as f64;
        self.bars += 1;
        if self.bars <= self.period {
            self.tr_sm += tr;
            self.plus_dm_sm += plus_dm;
            self.minus_dm_sm += minus_dm;
            if self.bars < self.period {
                return None;
            }
        } else {
            self.tr_sm = self.tr_sm - self.tr_sm / n + tr;
            self.plus_dm_sm = self.plus_dm_sm - self.plus_dm_sm / n + plus_dm;
            self.minus_dm_sm = self.minus_dm_sm - self.minus_dm_sm / n + minus_dm;
        }

        // Division by zero yields NaN here on purpose; the frame sanitizer fills it.
        let plus_di = 100.0 * self.plus_dm_sm / self.tr_sm;
        let minus_di = 100.0 * self.minus_dm_sm / self.tr_sm;
        let dx = 100.0 * (plus_di - minus_di).abs() / (plus_di + minus_di);

        match self.current_value {
            Some(prev_adx) => {
                self.current_value = Some((prev_adx * (n - 1.0) + dx) / n);
            }
            None => {
                self.dx_seed.push(dx);
                if self.dx_seed.len() == self.period {
                    self.current_value = Some(self.dx_seed.iter().sum::<f64>() / n);
                }
            }
        }

        self.current_value
    }
}

fn true_range(high: f64, low: f64, prev_close: Option<f64>) -> f64 {
    match prev_close {
        Some(prev) => (high - low).max((high - prev).abs()).max((low - prev).abs()),
        None => high - low,
    }
}

/// Rolling mean; positions with fewer than `min_periods` samples are NaN.
pub fn rolling_mean(values: &[f64], window: usize, min_periods: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for (i, v) in values.iter().enumerate() {
        sum += v;
        if i >= window {
            sum -= values[i - window];
        }
        let count = (i + 1).min(window);
        if count >= min_periods.max(1) {
            out.push(sum / count as f64);
        } else {
            out.push(f64::NAN);
        }
    }
    out
}

/// Forward-fills non-finite values, then zero-fills whatever is left at the head.
pub fn sanitize(column: &mut [f64]) {
    let mut last: Option<f64> = None;
    for v in column.iter_mut() {
        if v.is_finite() {
            last = Some(*v);
        } else {
            *v = last.unwrap_or(0.0);
        }
    }
}

// =============================================================================
// INDICATOR FRAME
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct IndicatorRow {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_status: TrendStatus,
    pub atr: f64,
    pub adx: f64,
    pub ema_20: f64,
    pub ema_50: f64,
    pub ma50: f64,
    pub ma200: f64,
    pub volume_sma_20: f64,
}

/// Indicator values aligned 1:1 with a candle window.
#[derive(Debug, Clone)]
pub struct IndicatorFrame {
    rows: Vec<IndicatorRow>,
    degraded: bool,
}

impl IndicatorFrame {
    pub fn rows(&self) -> &[IndicatorRow] {
        &self.rows
    }

    pub fn latest(&self) -> Option<&IndicatorRow> {
        self.rows.last()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// True when indicator math failed and only OHLCV values are meaningful.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    fn degraded(candles: &[Candle]) -> Self {
        let rows = candles
            .iter()
            .map(|c| {
                let px = |d: Decimal| d.to_f64().unwrap_or(0.0);
                IndicatorRow {
                    open: px(c.open),
                    high: px(c.high),
                    low: px(c.low),
                    close: px(c.close),
                    volume: px(c.volume),
                    rsi: 0.0,
                    macd: 0.0,
                    macd_signal: 0.0,
                    macd_status: TrendStatus::Bearish,
                    atr: 0.0,
                    adx: 0.0,
                    ema_20: 0.0,
                    ema_50: 0.0,
                    ma50: 0.0,
                    ma200: 0.0,
                    volume_sma_20: 0.0,
                }
            })
            .collect();
        Self { rows, degraded: true }
    }
}

/// Computes the full indicator frame. Never fails: on error the frame comes
/// back degraded and the error is logged.
pub fn calculate_indicators(candles: &[Candle]) -> IndicatorFrame {
    match compute_frame(candles) {
        Ok(frame) => {
            debug!(
                rows = frame.len(),
                "Indicators calculated: rsi, volume_sma_20, macd, atr, adx, ema, ma"
            );
            frame
        }
        Err(e) => {
            error!("Error calculating indicators: {}", e);
            IndicatorFrame::degraded(candles)
        }
    }
}

fn to_f64(value: Decimal, field: &str) -> Result<f64> {
    value
        .to_f64()
        .ok_or_else(|| EngineError::Indicator(format!("{} not representable as f64: {}", field, value)))
}

fn compute_frame(candles: &[Candle]) -> Result<IndicatorFrame> {
    if candles.is_empty() {
        return Err(EngineError::Indicator("empty candle window".to_string()));
    }

    let len = candles.len();
    let mut open = Vec::with_capacity(len);
    let mut high = Vec::with_capacity(len);
    let mut low = Vec::with_capacity(len);
    let mut close = Vec::with_capacity(len);
    let mut volume = Vec::with_capacity(len);
    for c in candles {
        open.push(to_f64(c.open, "open")?);
        high.push(to_f64(c.high, "high")?);
        low.push(to_f64(c.low, "low")?);
        close.push(to_f64(c.close, "close")?);
        volume.push(to_f64(c.volume, "volume")?);
    }

    let mut rsi_ind = Rsi::new(RSI_PERIOD);
    let mut macd_ind = Macd::new(MACD_FAST, MACD_SLOW, MACD_SIGNAL);
    let mut atr_ind = Atr::new(ATR_PERIOD);
    let mut adx_ind = Adx::new(ADX_PERIOD);
    let mut ema20_ind = Ema::new(20);
    let mut ema50_ind = Ema::new(50);

    let mut rsi = Vec::with_capacity(len);
    let mut macd = Vec::with_capacity(len);
    let mut macd_signal = Vec::with_capacity(len);
    let mut atr = Vec::with_capacity(len);
    let mut adx = Vec::with_capacity(len);
    let mut ema_20 = Vec::with_capacity(len);
    let mut ema_50 = Vec::with_capacity(len);

    for i in 0..len {
        rsi.push(rsi_ind.update(close[i]).unwrap_or(f64::NAN));
        let (m, s) = macd_ind.update(close[i]);
        macd.push(m);
        macd_signal.push(s);
        atr.push(atr_ind.update(high[i], low[i], close[i]).unwrap_or(f64::NAN));
        adx.push(adx_ind.update(high[i], low[i], close[i]).unwrap_or(f64::NAN));
        ema_20.push(ema20_ind.update(close[i]));
        ema_50.push(ema50_ind.update(close[i]));
    }

    let mut ma50 = rolling_mean(&close, 50, 50);
    let mut ma200 = rolling_mean(&close, 200, 200);
    let mut volume_sma_20 = rolling_mean(&volume, VOLUME_SMA_PERIOD, 1);

    for column in [
        &mut rsi,
        &mut macd,
        &mut macd_signal,
        &mut atr,
        &mut adx,
        &mut ema_20,
        &mut ema_50,
        &mut ma50,
        &mut ma200,
        &mut volume_sma_20,
    ] {
        if column.len() != len {
            return Err(EngineError::Indicator(format!(
                "column length {} does not match window length {}",
                column.len(),
                len
            )));
        }
        sanitize(column);
    }

    let rows = (0..len)
        .map(|i| IndicatorRow {
            open: open[i],
            high: high[i],
            low: low[i],
            close: close[i],
            volume: volume[i],
            rsi: rsi[i],
            macd: macd[i],
            macd_signal: macd_signal[i],
            macd_status: if macd[i] > macd_signal[i] {
                TrendStatus::Bullish
            } else {
                TrendStatus::Bearish
            },
            atr: atr[i],
            adx: adx[i],
            ema_20: ema_20[i],
            ema_50: ema_50[i],
            ma50: ma50[i],
            ma200: ma200[i],
            volume_sma_20: volume_sma_20[i],
        })
        .collect();

    Ok(IndicatorFrame { rows, degraded: false })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    pub(crate) fn make_candles(closes: &[f64]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle {
                open_time: start + Duration::minutes(15 * i as i64),
                open: Decimal::from_f64(c - 0.5).unwrap(),
                high: Decimal::from_f64(c + 1.0).unwrap(),
                low: Decimal::from_f64(c - 1.0).unwrap(),
                close: Decimal::from_f64(c).unwrap(),
                volume: Decimal::from(1000),
                close_time: None,
            })
            .collect()
    }

    #[test]
    fn test_ema_seeds_with_first_price() {
        let mut ema = Ema::new(3);
        assert_eq!(ema.update(10.0), 10.0);
        // k = 0.5
        assert_eq!(ema.update(12.0), 11.0);
        assert_eq!(ema.update(13.0), 12.0);
    }

    #[test]
    fn test_rsi_all_gains_is_100() {
        let mut rsi = Rsi::new(14);
        let mut last = None;
        for i in 0..30 {
            last = rsi.update(100.0 + i as f64);
        }
        assert_eq!(last, Some(100.0));
    }

    #[test]
    fn test_rsi_warmup_returns_none() {
        let mut rsi = Rsi::new(14);
        for i in 0..14 {
            assert!(rsi.update(100.0 + i as f64).is_none());
        }
        assert!(rsi.update(120.0).is_some());
    }

    #[test]
    fn test_atr_constant_range() {
        let mut atr = Atr::new(14);
        let mut last = None;
        for _ in 0..30 {
            last = atr.update(102.0, 98.0, 100.0);
        }
        assert!((last.unwrap() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_sanitize_forward_then_zero_fill() {
        let mut col = vec![f64::NAN, f64::NAN, 1.5, f64::INFINITY, f64::NAN, 2.0, f64::NEG_INFINITY];
        sanitize(&mut col);
        assert_eq!(col, vec![0.0, 0.0, 1.5, 1.5, 1.5, 2.0, 2.0]);
    }

    #[test]
    fn test_rolling_mean_min_periods() {
        let out = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 2, 2);
        assert!(out[0].is_nan());
        assert_eq!(&out[1..], &[1.5, 2.5, 3.5]);

        let out = rolling_mean(&[2.0, 4.0, 6.0], 20, 1);
        assert_eq!(out, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_frame_never_contains_non_finite_values() {
        // Short window: MA200, ADX and RSI never warm up
        let frame = calculate_indicators(&make_candles(&[100.0, 101.0, 100.5, 102.0, 101.0]));
        assert!(!frame.is_degraded());
        assert_eq!(frame.len(), 5);
        for row in frame.rows() {
            for v in [
                row.rsi, row.macd, row.macd_signal, row.atr, row.adx, row.ema_20, row.ema_50, row.ma50,
                row.ma200, row.volume_sma_20,
            ] {
                assert!(v.is_finite());
            }
            assert_eq!(row.ma200, 0.0);
        }
    }

    #[test]
    fn test_flat_prices_do_not_leak_nan() {
        // Zero true range makes DI/DX divide by zero
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let candles: Vec<Candle> = (0..60)
            .map(|i| Candle {
                open_time: start + Duration::hours(i),
                open: Decimal::from(50),
                high: Decimal::from(50),
                low: Decimal::from(50),
                close: Decimal::from(50),
                volume: Decimal::from(10),
                close_time: None,
            })
            .collect();
        let frame = calculate_indicators(&candles);
        let latest = frame.latest().unwrap();
        assert!(latest.adx.is_finite());
        assert_eq!(latest.atr, 0.0);
        // macd == signal on flat prices: ties are bearish
        assert_eq!(latest.macd_status, TrendStatus::Bearish);
    }

    #[test]
    fn test_full_window_populates_long_averages() {
        let closes: Vec<f64> = (0..220).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0 + i as f64 * 0.1).collect();
        let frame = calculate_indicators(&make_candles(&closes));
        let latest = frame.latest().unwrap();
        let expected_ma200: f64 = closes[20..].iter().sum::<f64>() / 200.0;
        assert!((latest.ma200 - expected_ma200).abs() < 1e-9);
        assert!(latest.adx > 0.0);
        assert!(latest.rsi > 0.0 && latest.rsi < 100.0);
        assert_eq!(
            latest.macd_status,
            if latest.macd > latest.macd_signal { TrendStatus::Bullish } else { TrendStatus::Bearish }
        );
    }

    #[test]
    fn test_empty_window_degrades() {
        let frame = calculate_indicators(&[]);
        assert!(frame.is_degraded());
        assert!(frame.latest().is_none());
    }
}
