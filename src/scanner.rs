// =============================================================================
// SCAN LOOP
// =============================================================================
//
// One pass over a symbol: macro context, multi-timeframe analysis, delivery
// gate, boost, notification, then a detached outcome tracker per accepted
// signal whose result lands in the journal.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::mtf_analysis::MultiTimeframeAggregator;
use crate::policy::AcceptancePolicy;
use crate::sources::{MarketDataSource, Notifier, PriceSource, SignalJournal};
use crate::tracker::{OutcomeRecord, OutcomeTracker, TrackerConfig};
use crate::types::{MarketContext, Signal, SignalType};

pub struct Scanner {
    market: Arc<dyn MarketDataSource>,
    prices: Arc<dyn PriceSource>,
    notifier: Arc<dyn Notifier>,
    journal: Arc<dyn SignalJournal>,
    aggregator: MultiTimeframeAggregator,
    policy: AcceptancePolicy,
    tracker_config: TrackerConfig,
    timeframes: Vec<String>,
    btc_symbol: String,
    shutdown: watch::Sender<bool>,
}

impl Scanner {
    pub fn new(
        settings: &Settings,
        market: Arc<dyn MarketDataSource>,
        prices: Arc<dyn PriceSource>,
        notifier: Arc<dyn Notifier>,
        journal: Arc<dyn SignalJournal>,
    ) -> Self {
        let aggregator =
            MultiTimeframeAggregator::new(Arc::clone(&market)).with_window_limit(settings.trading.window_limit);
        Self {
            market,
            prices,
            notifier,
            journal,
            aggregator,
            policy: AcceptancePolicy::new(settings.app.min_confidence),
            tracker_config: settings.tracker.to_tracker_config(),
            timeframes: settings.trading.timeframes.clone(),
            btc_symbol: settings.trading.btc_symbol.clone(),
            shutdown: watch::channel(false).0,
        }
    }

    /// Stops every running tracker. Each one still journals its record,
    /// with whatever status it had reached.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    async fn context(&self, symbol: &str) -> MarketContext {
        match self.market.market_context(symbol, &self.btc_symbol).await {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!("[{}] Market context unavailable ({:#}), assuming neutral", symbol, e);
                MarketContext::default()
            }
        }
    }

    fn spawn_tracker(&self, signal: Signal) -> JoinHandle<OutcomeRecord> {
        let prices = Arc::clone(&self.prices);
        let journal = Arc::clone(&self.journal);
        let config = self.tracker_config;
        let mut stop = self.shutdown.subscribe();
        tokio::spawn(async move {
            let stopped = async move {
                let requested = stop.wait_for(|stopped| *stopped).await.is_ok();
                // A dropped scanner never asks the tracker to stop
                if !requested {
                    std::future::pending::<()>().await;
                }
            };
            let record = OutcomeTracker::with_config(&signal, config)
                .run_until(prices.as_ref(), stopped)
                .await;
            if let Err(e) = journal.record(&signal, &record) {
                error!("[{}] Error logging signal {}: {}", signal.symbol, signal.signal_id, e);
            }
            record
        })
    }

    /// Scans one symbol and returns the tracker tasks it started.
    pub async fn scan_symbol(&self, symbol: &str) -> Vec<JoinHandle<OutcomeRecord>> {
        let ctx = self.context(symbol).await;
        let result = self.aggregator.analyze(symbol, &self.timeframes, &ctx).await;

        let mut trackers = Vec::new();
        let mut boosts: HashMap<SignalType, u32> = HashMap::new();
        for signal in result.valid_signals() {
            if let Err(reason) = self.policy.check(signal) {
                warn!("[{}] [{}] Skipping signal: {}", symbol, signal.timeframe, reason);
                continue;
            }

            let boost = match boosts.get(&signal.direction) {
                Some(boost) => *boost,
                None => {
                    let boost = self.aggregator.multi_timeframe_boost(symbol, signal.direction).await;
                    boosts.insert(signal.direction, boost);
                    boost
                }
            };
            if result.low_consensus {
                info!(
                    "[{}] [{}] Delivering despite low timeframe agreement ({:.2})",
                    symbol,
                    signal.timeframe,
                    result.agreement.unwrap_or_default()
                );
            }

            info!("[{}] Signal generated, sending notification", symbol);
            if let Err(e) = self.notifier.send(signal, boost).await {
                error!("[{}] Error sending notification: {}", symbol, e);
            }

            trackers.push(self.spawn_tracker(signal.clone()));
        }
        trackers
    }

    pub async fn scan(&self, symbols: &[String]) -> Vec<JoinHandle<OutcomeRecord>> {
        let mut trackers = Vec::new();
        for symbol in symbols {
            info!("[{}] Scanning {} timeframes", symbol, self.timeframes.len());
            trackers.extend(self.scan_symbol(symbol).await);
        }
        trackers
    }
}
