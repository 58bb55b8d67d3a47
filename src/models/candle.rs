use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV bar. `(symbol, ts)` is the natural key: the store collapses
/// duplicates last-write-wins, so corrections are re-upserts, never in-place
/// edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,

    /// Always carries an explicit UTC offset. Daily bars sit at midnight UTC.
    pub ts: DateTime<Utc>,

    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Candle {
    pub fn new(
        symbol: impl Into<String>,
        ts: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            ts,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}
