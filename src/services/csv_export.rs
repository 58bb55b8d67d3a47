use std::path::Path;

use chrono::SecondsFormat;

use crate::error::Result;
use crate::models::Candle;

pub const CSV_HEADER: [&str; 7] = [
    "symbol", "timestamp", "open", "high", "low", "close", "volume",
];

/// Write candles to the CSV artifact format: fixed header, ISO-8601
/// timestamps with an explicit `Z`, one row per record in input order
/// (callers hand in ascending data). Parent directories are created.
pub fn write_candles(path: &Path, candles: &[Candle]) -> Result<usize> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(CSV_HEADER)?;

    for candle in candles {
        writer.write_record(&[
            candle.symbol.clone(),
            candle.ts.to_rfc3339_opts(SecondsFormat::Secs, true),
            candle.open.to_string(),
            candle.high.to_string(),
            candle.low.to_string(),
            candle.close.to_string(),
            candle.volume.to_string(),
        ])?;
    }

    writer.flush().map_err(|e| crate::error::AppError::Io(e.to_string()))?;
    Ok(candles.len())
}
