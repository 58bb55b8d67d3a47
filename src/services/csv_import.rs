use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::{AppError, Result};
use crate::models::Candle;

/// Read candles from a CSV file. The header must include
/// open,high,low,close,volume and at least one of date|timestamp
/// (case-insensitive, trimmed). An optional symbol column overrides
/// `default_symbol` row by row.
///
/// A date column is interpreted as UTC midnight; a timestamp column accepts
/// RFC 3339 (with or without the `Z` marker) or `YYYY-MM-DD HH:MM:SS`, both
/// naive forms assumed UTC — naive inputs are normalized, never rejected.
pub fn read_candles(path: &Path, default_symbol: &str) -> Result<Vec<Candle>> {
    if !path.exists() {
        return Err(AppError::Io(format!("CSV not found: {}", path.display())));
    }

    let mut reader = csv::Reader::from_path(path)?;
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let position = |name: &str| headers.iter().position(|h| h == name);

    let open_idx = position("open");
    let high_idx = position("high");
    let low_idx = position("low");
    let close_idx = position("close");
    let volume_idx = position("volume");
    let ts_idx = position("timestamp");
    let date_idx = position("date");
    let symbol_idx = position("symbol");

    let has_ohlcv = [open_idx, high_idx, low_idx, close_idx, volume_idx]
        .iter()
        .all(Option::is_some);
    if !has_ohlcv || (ts_idx.is_none() && date_idx.is_none()) {
        return Err(AppError::MalformedPayload(
            "CSV must include open,high,low,close,volume and either 'date' or 'timestamp'"
                .to_string(),
        ));
    }

    let mut candles = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let field = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("").trim();

        let symbol = match field(symbol_idx) {
            "" => default_symbol,
            explicit => explicit,
        };

        let ts = if let Some(idx) = ts_idx {
            parse_timestamp(field(Some(idx)))
        } else {
            parse_date_midnight(field(date_idx))
        }
        .map_err(|e| AppError::MalformedPayload(format!("row {}: {}", line + 2, e)))?;

        candles.push(Candle {
            symbol: symbol.to_string(),
            ts,
            open: parse_price(field(open_idx), "open", line)?,
            high: parse_price(field(high_idx), "high", line)?,
            low: parse_price(field(low_idx), "low", line)?,
            close: parse_price(field(close_idx), "close", line)?,
            volume: parse_volume(field(volume_idx), line)?,
        });
    }

    Ok(candles)
}

fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    // naive forms are assumed UTC
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(format!("invalid timestamp '{}'", raw))
}

fn parse_date_midnight(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{}'", raw))?;
    Ok(date.and_hms_opt(0, 0, 0).expect("midnight is valid").and_utc())
}

fn parse_price(raw: &str, name: &str, line: usize) -> Result<f64> {
    raw.parse::<f64>().map_err(|_| {
        AppError::MalformedPayload(format!("row {}: invalid {} '{}'", line + 2, name, raw))
    })
}

/// Volume tolerates float-formatted integers ("1000.0") from exporters that
/// write volumes as floats.
fn parse_volume(raw: &str, line: usize) -> Result<u64> {
    if let Ok(v) = raw.parse::<u64>() {
        return Ok(v);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|v| *v >= 0.0)
        .map(|v| v as u64)
        .ok_or_else(|| {
            AppError::MalformedPayload(format!("row {}: invalid volume '{}'", line + 2, raw))
        })
}
