use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Insufficient or corrupt candle data. Aborts only the affected timeframe.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Indicator math failed; callers receive a degraded frame instead.
    #[error("Indicator calculation error: {0}")]
    Indicator(String),

    /// Data source or price feed unavailable; retried by the caller.
    #[error("Transient I/O error: {0}")]
    Transient(String),

    /// Notification channel refused or failed to deliver.
    #[error("Delivery failure: {0}")]
    Delivery(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("CSV error: {source}")]
    Csv {
        #[from]
        source: csv::Error,
    },
}

pub type Result<T> = std::result::Result<T, EngineError>;
