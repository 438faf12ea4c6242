use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

use crate::error::{EngineError, Result};
use crate::sources::SignalJournal;
use crate::tracker::{OutcomeRecord, SignalOutcome};
use crate::types::{Signal, SignalType, TradeType, TrendStatus};

/// One line of the signal log: the signal joined with its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalRow {
    pub signal_id: String,
    pub engine_version: String,
    pub symbol: String,
    pub timeframe: String,
    pub price: Decimal,
    pub direction: SignalType,
    pub tp1: Decimal,
    pub tp2: Decimal,
    pub tp3: Decimal,
    pub sl: Decimal,
    pub confidence: f64,
    pub trade_type: TradeType,
    pub trade_duration: String,
    pub timestamp: DateTime<Utc>,
    pub tp1_possibility: f64,
    pub tp2_possibility: f64,
    pub tp3_possibility: f64,
    pub conditions: String,
    pub volume: Decimal,
    pub quote_volume_24h: Decimal,
    pub status: SignalOutcome,
    pub hit_timestamp: Option<DateTime<Utc>>,
    pub leverage: u8,
    pub macd_status: TrendStatus,
    pub btc_trend: f64,
    pub ma200_status: TrendStatus,
}

impl JournalRow {
    pub fn new(signal: &Signal, outcome: &OutcomeRecord) -> Self {
        Self {
            signal_id: signal.signal_id.clone(),
            engine_version: signal.engine_version.clone(),
            symbol: signal.symbol.clone(),
            timeframe: signal.timeframe.clone(),
            price: signal.entry,
            direction: signal.direction,
            tp1: signal.tp1,
            tp2: signal.tp2,
            tp3: signal.tp3,
            sl: signal.sl,
            confidence: signal.confidence,
            trade_type: signal.trade_type,
            trade_duration: signal.trade_duration.clone(),
            timestamp: signal.timestamp,
            tp1_possibility: signal.tp1_possibility,
            tp2_possibility: signal.tp2_possibility,
            tp3_possibility: signal.tp3_possibility,
            conditions: signal.conditions.to_string(),
            volume: signal.volume,
            quote_volume_24h: signal.quote_volume_24h,
            status: outcome.status,
            hit_timestamp: outcome.hit_timestamp,
            leverage: signal.leverage,
            macd_status: signal.macd_status,
            btc_trend: signal.btc_trend,
            ma200_status: signal.ma200_status,
        }
    }
}

/// Append-only CSV log of finalized signals. The header is written once,
/// when the file is first created.
pub struct CsvJournal {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CsvJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, row: &JournalRow) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "journal lock poisoned"))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let is_new = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);

        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = WriterBuilder::new().has_headers(is_new).from_writer(file);
        writer.serialize(row)?;
        writer.flush()?;
        Ok(())
    }
}

impl SignalJournal for CsvJournal {
    fn record(&self, signal: &Signal, outcome: &OutcomeRecord) -> std::result::Result<(), EngineError> {
        self.append(&JournalRow::new(signal, outcome))?;
        info!("[{}] Signal saved to CSV with status: {}", signal.symbol, outcome.status);
        Ok(())
    }
}
