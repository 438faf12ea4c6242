// =============================================================================
// SIGNAL OUTCOME TRACKING
// =============================================================================

use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::sources::PriceSource;
use crate::types::{Signal, SignalType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalOutcome {
    Pending,
    #[serde(rename = "TP1 Hit")]
    Tp1Hit,
    #[serde(rename = "TP2 Hit")]
    Tp2Hit,
    #[serde(rename = "TP3 Hit")]
    Tp3Hit,
    #[serde(rename = "SL Hit")]
    SlHit,
    Timeout,
}

impl SignalOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SignalOutcome::Pending)
    }
}

impl fmt::Display for SignalOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SignalOutcome::Pending => "Pending",
            SignalOutcome::Tp1Hit => "TP1 Hit",
            SignalOutcome::Tp2Hit => "TP2 Hit",
            SignalOutcome::Tp3Hit => "TP3 Hit",
            SignalOutcome::SlHit => "SL Hit",
            SignalOutcome::Timeout => "Timeout",
        };
        f.write_str(label)
    }
}

/// What eventually happened to a signal. References the signal by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub signal_id: String,
    pub symbol: String,
    pub status: SignalOutcome,
    pub hit_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy)]
pub struct TrackerConfig {
    pub poll_interval: Duration,
    pub horizon: Duration,
    pub retry_backoff: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            horizon: Duration::from_secs(24 * 60 * 60),
            retry_backoff: Duration::from_secs(10),
        }
    }
}

/// Follows one signal until a target or the stop is touched, or the
/// horizon runs out.
#[derive(Debug, Clone)]
pub struct OutcomeTracker {
    direction: SignalType,
    tp1: Decimal,
    tp2: Decimal,
    tp3: Decimal,
    sl: Decimal,
    record: OutcomeRecord,
    config: TrackerConfig,
}

impl OutcomeTracker {
    pub fn new(signal: &Signal) -> Self {
        Self::with_config(signal, TrackerConfig::default())
    }

    pub fn with_config(signal: &Signal, config: TrackerConfig) -> Self {
        Self {
            direction: signal.direction,
            tp1: signal.tp1,
            tp2: signal.tp2,
            tp3: signal.tp3,
            sl: signal.sl,
            record: OutcomeRecord {
                signal_id: signal.signal_id.clone(),
                symbol: signal.symbol.clone(),
                status: SignalOutcome::Pending,
                hit_timestamp: None,
            },
            config,
        }
    }

    pub fn record(&self) -> &OutcomeRecord {
        &self.record
    }

    fn classify(&self, price: Decimal) -> SignalOutcome {
        match self.direction {
            SignalType::LONG => {
                if price >= self.tp3 {
                    SignalOutcome::Tp3Hit
                } else if price >= self.tp2 {
                    SignalOutcome::Tp2Hit
                } else if price >= self.tp1 {
                    SignalOutcome::Tp1Hit
                } else if price <= self.sl {
                    SignalOutcome::SlHit
                } else {
                    SignalOutcome::Pending
                }
            }
            SignalType::SHORT => {
                if price <= self.tp3 {
                    SignalOutcome::Tp3Hit
                } else if price <= self.tp2 {
                    SignalOutcome::Tp2Hit
                } else if price <= self.tp1 {
                    SignalOutcome::Tp1Hit
                } else if price >= self.sl {
                    SignalOutcome::SlHit
                } else {
                    SignalOutcome::Pending
                }
            }
        }
    }

    /// Applies one price observation. Terminal states never change again.
    pub fn observe(&mut self, price: Decimal, at: DateTime<Utc>) -> SignalOutcome {
        if self.record.status.is_terminal() {
            return self.record.status;
        }
        let status = self.classify(price);
        if status.is_terminal() {
            self.record.status = status;
            self.record.hit_timestamp = Some(at);
        }
        status
    }

    async fn poll(&mut self, prices: &dyn PriceSource) -> SignalOutcome {
        loop {
            match prices.current_price(&self.record.symbol).await {
                Ok(price) => {
                    let status = self.observe(price, Utc::now());
                    if status.is_terminal() {
                        return status;
                    }
                    debug!("[{}] price {} still pending", self.record.symbol, price);
                    sleep(self.config.poll_interval).await;
                }
                Err(e) => {
                    warn!("[{}] price poll failed: {:#}, retrying", self.record.symbol, e);
                    sleep(self.config.retry_backoff).await;
                }
            }
        }
    }

    /// Polls until the signal resolves or the horizon passes.
    pub async fn run(self, prices: &dyn PriceSource) -> OutcomeRecord {
        self.run_until(prices, std::future::pending()).await
    }

    /// Like `run`, but gives up early when `stop` completes. A stopped
    /// tracker returns its record as it stands, usually still `Pending`.
    pub async fn run_until<F>(mut self, prices: &dyn PriceSource, stop: F) -> OutcomeRecord
    where
        F: Future<Output = ()>,
    {
        let deadline = Instant::now() + self.config.horizon;
        let finished = tokio::select! {
            polled = timeout_at(deadline, self.poll(prices)) => Some(polled),
            _ = stop => None,
        };
        match finished {
            Some(Ok(status)) => {
                info!("[{}] signal {} resolved: {}", self.record.symbol, self.record.signal_id, status);
            }
            Some(Err(_)) => {
                info!("[{}] signal {} timed out", self.record.symbol, self.record.signal_id);
                self.record.status = SignalOutcome::Timeout;
                self.record.hit_timestamp = None;
            }
            None => {
                warn!(
                    "[{}] tracking of {} stopped early with status {}",
                    self.record.symbol, self.record.signal_id, self.record.status
                );
            }
        }
        self.record
    }
}
