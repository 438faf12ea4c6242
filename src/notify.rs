// =============================================================================
// SIGNAL NOTIFICATION
// =============================================================================

use async_trait::async_trait;
use rust_decimal::prelude::*;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info};

use crate::error::EngineError;
use crate::sources::Notifier;
use crate::types::Signal;

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Formats `value` with two decimals and comma thousand separators.
fn with_thousands(value: Decimal) -> String {
    let fixed = format!("{:.2}", value.abs().round_dp(2));
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if value.is_sign_negative() && !value.is_zero() { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac_part)
}

pub fn format_signal_message(signal: &Signal, boost: u32) -> String {
    let mut message = format!(
        "📈 Trading Signal\n\
         📊 Direction: {}\n\
         ⏰ Timeframe: {}\n\
         ⏳ Trade Duration: {}\n\
         💰 Entry Price: {:.4}\n\
         🎯 TP1: {:.4} ({:.1}%)\n\
         🎯 TP2: {:.4} ({:.1}%)\n\
         🎯 TP3: {:.4} ({:.1}%)\n\
         🛑 SL: {:.4}\n\
         🔍 Confidence: {:.2}%\n\
         ⚡ Trade Type: {}\n\
         📈 Candle Volume: ${}\n\
         📈 24 Hour Volume: ${}\n\
         🔎 Conditions: {}\n\
         🕒 Timestamp: {}\n\
         📊 Leverage: {}x",
        signal.direction,
        signal.timeframe,
        signal.trade_duration,
        signal.entry,
        signal.tp1,
        signal.tp1_possibility,
        signal.tp2,
        signal.tp2_possibility,
        signal.tp3,
        signal.tp3_possibility,
        signal.sl,
        signal.confidence,
        signal.trade_type,
        with_thousands(signal.volume),
        with_thousands(signal.quote_volume_24h),
        signal.conditions,
        signal.timestamp.format("%Y-%m-%d %H:%M:%S"),
        signal.leverage,
    );
    if boost > 0 {
        message.push_str(&format!("\n🚀 Higher Timeframe Boost: +{}", boost));
    }
    message
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Posts signals to a Telegram chat through the Bot API.
pub struct TelegramNotifier {
    client: reqwest::Client,
    token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, token: token.into(), chat_id: chat_id.into() }
    }

    /// Reads `TELEGRAM_BOT_TOKEN` and `TELEGRAM_CHAT_ID`.
    pub fn from_env() -> Option<Self> {
        let token = std::env::var("TELEGRAM_BOT_TOKEN").ok().filter(|t| !t.is_empty())?;
        let chat_id = std::env::var("TELEGRAM_CHAT_ID").ok().filter(|c| !c.is_empty())?;
        Some(Self::new(token, chat_id))
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, signal: &Signal, boost: u32) -> Result<(), EngineError> {
        let text = format_signal_message(signal, boost);
        let url = format!("{}/bot{}/sendMessage", TELEGRAM_API, self.token);
        let resp = self
            .client
            .post(&url)
            .json(&SendMessage { chat_id: &self.chat_id, text: &text })
            .send()
            .await
            .map_err(|e| EngineError::Delivery(e.without_url().to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!("Telegram rejected message ({}): {}", status, body);
            return Err(EngineError::Delivery(format!("telegram returned {}", status)));
        }

        info!(
            "[{}] Signal sent: {}, Confidence: {:.2}%",
            signal.symbol, signal.direction, signal.confidence
        );
        Ok(())
    }
}

/// Writes the formatted message to the log. Used when no chat is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, signal: &Signal, boost: u32) -> Result<(), EngineError> {
        info!("[{}] {}", signal.symbol, format_signal_message(signal, boost));
        Ok(())
    }
}
