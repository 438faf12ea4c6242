use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::error::EngineError;
use crate::sources::{MarketDataSource, PriceSource};
use crate::types::{Candle, MarketContext};

const DEFAULT_BASE_URL: &str = "https://api.binance.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    price_change_percent: String,
    quote_volume: String,
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: String,
}

pub struct BinanceClient {
    base_url: String,
    client: reqwest::Client,
}

impl Default for BinanceClient {
    fn default() -> Self {
        Self::new()
    }
}

impl BinanceClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Klines for `symbol`. `None` when the exchange does not know the pair.
    pub async fn fetch_klines(&self, symbol: &str, interval: &str, limit: usize) -> Result<Option<Vec<Candle>>> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let params = [
            ("symbol", symbol),
            ("interval", interval),
            ("limit", &limit.to_string()),
        ];

        let resp = self.client.get(&url).query(&params).send().await.map_err(transient)?;
        if resp.status() == reqwest::StatusCode::BAD_REQUEST {
            debug!("Binance rejected klines request for {} {}", symbol, interval);
            return Ok(None);
        }
        let json: Vec<Vec<serde_json::Value>> = resp
            .error_for_status()
            .map_err(transient)?
            .json()
            .await
            .context("decoding klines")?;

        let candles = json
            .iter()
            .map(|row| parse_kline(row))
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("malformed kline for {} {}", symbol, interval))?;
        Ok(Some(candles))
    }

    /// GET `path` for one symbol. Network and HTTP status failures surface
    /// as `EngineError::Transient`.
    async fn get_ticker<T: DeserializeOwned>(&self, path: &str, symbol: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let ticker = self
            .client
            .get(&url)
            .query(&[("symbol", symbol)])
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(transient)?
            .json()
            .await
            .with_context(|| format!("decoding {} for {}", path, symbol))?;
        Ok(ticker)
    }

    async fn ticker_24h(&self, symbol: &str) -> Result<Ticker24h> {
        self.get_ticker("/api/v3/ticker/24hr", symbol).await
    }

    pub async fn last_price(&self, symbol: &str) -> Result<Decimal> {
        let ticker: TickerPrice = self.get_ticker("/api/v3/ticker/price", symbol).await?;
        ticker
            .price
            .parse()
            .with_context(|| format!("invalid price for {}: {}", symbol, ticker.price))
    }

    /// BTC 24h change (percent) plus the instrument's 24h quote volume.
    pub async fn fetch_market_context(&self, symbol: &str, btc_symbol: &str) -> Result<MarketContext> {
        let btc = self.ticker_24h(btc_symbol).await.context("BTC ticker")?;
        let btc_trend: f64 = btc
            .price_change_percent
            .parse()
            .with_context(|| format!("invalid priceChangePercent: {}", btc.price_change_percent))?;

        let ticker = self.ticker_24h(symbol).await.with_context(|| format!("{} ticker", symbol))?;
        let quote_volume_24h: Decimal = ticker
            .quote_volume
            .parse()
            .with_context(|| format!("invalid quoteVolume: {}", ticker.quote_volume))?;

        Ok(MarketContext { btc_trend, quote_volume_24h })
    }
}

fn transient(e: reqwest::Error) -> EngineError {
    EngineError::Transient(e.without_url().to_string())
}

fn decimal_field(row: &[serde_json::Value], idx: usize, name: &str) -> Result<Decimal> {
    let raw = row
        .get(idx)
        .and_then(|v| v.as_str())
        .with_context(|| format!("missing {}", name))?;
    raw.parse().with_context(|| format!("invalid {}: {}", name, raw))
}

fn timestamp_field(row: &[serde_json::Value], idx: usize) -> Option<DateTime<Utc>> {
    row.get(idx)
        .and_then(|v| v.as_i64())
        .and_then(DateTime::<Utc>::from_timestamp_millis)
}

// Binance kline: [open_time, open, high, low, close, volume, close_time, ...]
fn parse_kline(row: &[serde_json::Value]) -> Result<Candle> {
    let open_time = timestamp_field(row, 0).context("invalid open time")?;
    Ok(Candle {
        open_time,
        open: decimal_field(row, 1, "open")?,
        high: decimal_field(row, 2, "high")?,
        low: decimal_field(row, 3, "low")?,
        close: decimal_field(row, 4, "close")?,
        volume: decimal_field(row, 5, "volume")?,
        close_time: timestamp_field(row, 6),
    })
}

#[async_trait]
impl MarketDataSource for BinanceClient {
    async fn fetch_candles(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Option<Vec<Candle>>> {
        self.fetch_klines(symbol, timeframe, limit).await
    }

    async fn market_context(&self, symbol: &str, btc_symbol: &str) -> Result<MarketContext> {
        self.fetch_market_context(symbol, btc_symbol).await
    }
}

#[async_trait]
impl PriceSource for BinanceClient {
    async fn current_price(&self, symbol: &str) -> Result<Decimal> {
        self.last_price(symbol).await
    }
}
