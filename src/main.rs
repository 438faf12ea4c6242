use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures_util::future::join_all;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use signal_engine::config::Settings;
use signal_engine::connect::BinanceClient;
use signal_engine::journal::CsvJournal;
use signal_engine::notify::{LogNotifier, TelegramNotifier};
use signal_engine::scanner::Scanner;
use signal_engine::sources::Notifier;
use signal_engine::tracker::OutcomeRecord;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load("config").context("loading configuration")?;

    // Logs go to stderr; RUST_LOG overrides the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.app.log_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("🚀 Signal engine starting...");
    info!(
        "Settings loaded: {} symbols on {:?}, min confidence {}%",
        settings.trading.symbols.len(),
        settings.trading.timeframes,
        settings.app.min_confidence
    );

    let client = Arc::new(BinanceClient::new());
    let notifier: Arc<dyn Notifier> = match TelegramNotifier::from_env() {
        Some(telegram) => Arc::new(telegram),
        None => {
            warn!("TELEGRAM_BOT_TOKEN / TELEGRAM_CHAT_ID not set, signals will only be logged");
            Arc::new(LogNotifier)
        }
    };
    let journal = Arc::new(CsvJournal::new(settings.journal.path.clone()));
    info!("Journal: {}", journal.path().display());

    let scanner = Scanner::new(&settings, client.clone(), client, notifier, journal);

    if settings.app.scan_interval_secs == 0 {
        let trackers = scanner.scan(&settings.trading.symbols).await;
        info!("Scan complete, waiting on {} tracked signals", trackers.len());
        let drain = join_all(trackers);
        tokio::pin!(drain);
        let outcomes = tokio::select! {
            outcomes = &mut drain => outcomes,
            _ = tokio::signal::ctrl_c() => {
                warn!("Shutdown requested, journaling open trackers");
                scanner.shutdown();
                drain.await
            }
        };
        report(outcomes);
        return Ok(());
    }

    let interval = Duration::from_secs(settings.app.scan_interval_secs);
    let mut trackers: Vec<JoinHandle<OutcomeRecord>> = Vec::new();
    loop {
        trackers.retain(|handle| !handle.is_finished());
        let started = scanner.scan(&settings.trading.symbols).await;
        info!(
            "Scan complete, {} new signals tracked ({} open). Next scan in {:?}",
            started.len(),
            trackers.len() + started.len(),
            interval
        );
        trackers.extend(started);

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                warn!("Shutdown requested, journaling {} open trackers", trackers.len());
                break;
            }
        }
    }

    scanner.shutdown();
    report(join_all(trackers).await);
    Ok(())
}

fn report(outcomes: Vec<Result<OutcomeRecord, JoinError>>) {
    for outcome in outcomes {
        match outcome {
            Ok(record) => info!("[{}] {} -> {}", record.symbol, record.signal_id, record.status),
            Err(e) => error!("Tracker task failed: {}", e),
        }
    }
}
