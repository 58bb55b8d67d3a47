use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::Candle;

/// Fixed civil timezone the provider uses for intraday timestamps.
pub const EXCHANGE_TZ: Tz = chrono_tz::America::New_York;

const DAILY_SERIES_KEY: &str = "Time Series (Daily)";

/// Parse a TIME_SERIES_DAILY payload. Each entry is keyed by calendar date
/// and maps to a candle at midnight UTC of that date. Output is ascending
/// by timestamp.
pub fn parse_daily(payload: &Value, symbol: &str) -> Result<Vec<Candle>> {
    let series = payload
        .get(DAILY_SERIES_KEY)
        .and_then(Value::as_object)
        .ok_or_else(|| {
            AppError::MalformedPayload(format!("Missing series block '{}'", DAILY_SERIES_KEY))
        })?;

    let mut candles = Vec::with_capacity(series.len());
    for (date_str, entry) in series {
        let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|_| {
            AppError::MalformedPayload(format!("Invalid date key '{}'", date_str))
        })?;
        let ts = date.and_hms_opt(0, 0, 0).expect("midnight is valid").and_utc();
        candles.push(candle_from_entry(symbol, ts, entry)?);
    }

    candles.sort_by(|a, b| a.ts.cmp(&b.ts));
    Ok(candles)
}

/// Parse a TIME_SERIES_INTRADAY payload. Entry keys are local exchange-time
/// timestamps; each is converted to UTC through the fixed exchange zone.
/// The series block key varies with the interval ("Time Series (5min)" etc.),
/// so the first key containing "Time Series" is taken — and its absence is a
/// malformed payload, not an empty result.
pub fn parse_intraday(payload: &Value, symbol: &str) -> Result<Vec<Candle>> {
    let series = payload
        .as_object()
        .and_then(|map| {
            map.iter()
                .find(|(k, _)| k.contains("Time Series"))
                .and_then(|(_, v)| v.as_object())
        })
        .ok_or_else(|| {
            AppError::MalformedPayload("Missing intraday 'Time Series' block".to_string())
        })?;

    let mut candles = Vec::with_capacity(series.len());
    for (ts_str, entry) in series {
        let local = NaiveDateTime::parse_from_str(ts_str, "%Y-%m-%d %H:%M:%S").map_err(|_| {
            AppError::MalformedPayload(format!("Invalid timestamp key '{}'", ts_str))
        })?;
        // earliest() picks the first wall-clock occurrence across a DST fold
        let ts = EXCHANGE_TZ
            .from_local_datetime(&local)
            .earliest()
            .ok_or_else(|| {
                AppError::MalformedPayload(format!(
                    "Timestamp '{}' does not exist in {}",
                    ts_str, EXCHANGE_TZ
                ))
            })?
            .with_timezone(&Utc);
        candles.push(candle_from_entry(symbol, ts, entry)?);
    }

    candles.sort_by(|a, b| a.ts.cmp(&b.ts));
    Ok(candles)
}

fn candle_from_entry(
    symbol: &str,
    ts: chrono::DateTime<Utc>,
    entry: &Value,
) -> Result<Candle> {
    Ok(Candle {
        symbol: symbol.to_string(),
        ts,
        open: field_f64(entry, "1. open")?,
        high: field_f64(entry, "2. high")?,
        low: field_f64(entry, "3. low")?,
        close: field_f64(entry, "4. close")?,
        volume: field_u64(entry, "5. volume")?,
    })
}

fn field_str<'a>(entry: &'a Value, key: &str) -> Result<&'a str> {
    entry
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::MalformedPayload(format!("Missing field '{}'", key)))
}

fn field_f64(entry: &Value, key: &str) -> Result<f64> {
    let raw = field_str(entry, key)?;
    raw.parse::<f64>()
        .map_err(|_| AppError::MalformedPayload(format!("Invalid number '{}' for '{}'", raw, key)))
}

fn field_u64(entry: &Value, key: &str) -> Result<u64> {
    let raw = field_str(entry, key)?;
    raw.parse::<u64>()
        .map_err(|_| AppError::MalformedPayload(format!("Invalid volume '{}' for '{}'", raw, key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(open: &str, close: &str, volume: &str) -> Value {
        json!({
            "1. open": open,
            "2. high": "192.50",
            "3. low": "189.10",
            "4. close": close,
            "5. volume": volume,
        })
    }

    #[test]
    fn daily_entries_land_at_midnight_utc_ascending() {
        let payload = json!({
            "Meta Data": {"2. Symbol": "AAPL"},
            "Time Series (Daily)": {
                "2024-06-11": entry("191.00", "192.00", "1200"),
                "2024-06-10": entry("190.00", "191.00", "1000"),
            }
        });

        let candles = parse_daily(&payload, "AAPL").unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].ts.to_rfc3339(), "2024-06-10T00:00:00+00:00");
        assert_eq!(candles[1].ts.to_rfc3339(), "2024-06-11T00:00:00+00:00");
        assert_eq!(candles[0].symbol, "AAPL");
        assert_eq!(candles[0].open, 190.00);
        assert_eq!(candles[0].volume, 1000);
    }

    #[test]
    fn intraday_summer_timestamp_converts_through_exchange_zone() {
        // 09:30 America/New_York in June is EDT (UTC-4)
        let payload = json!({
            "Time Series (5min)": {
                "2024-06-10 09:30:00": entry("190.00", "190.50", "5000"),
            }
        });

        let candles = parse_intraday(&payload, "AAPL").unwrap();
        assert_eq!(candles[0].ts.to_rfc3339(), "2024-06-10T13:30:00+00:00");
    }

    #[test]
    fn intraday_winter_timestamp_uses_standard_offset() {
        // 09:30 America/New_York in January is EST (UTC-5)
        let payload = json!({
            "Time Series (5min)": {
                "2024-01-10 09:30:00": entry("190.00", "190.50", "5000"),
            }
        });

        let candles = parse_intraday(&payload, "AAPL").unwrap();
        assert_eq!(candles[0].ts.to_rfc3339(), "2024-01-10T14:30:00+00:00");
    }

    #[test]
    fn intraday_output_is_sorted_ascending() {
        let payload = json!({
            "Time Series (5min)": {
                "2024-06-10 09:40:00": entry("191.00", "191.50", "3000"),
                "2024-06-10 09:30:00": entry("190.00", "190.50", "5000"),
                "2024-06-10 09:35:00": entry("190.50", "191.00", "4000"),
            }
        });

        let candles = parse_intraday(&payload, "AAPL").unwrap();
        let times: Vec<_> = candles.iter().map(|c| c.ts).collect();
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);
    }

    #[test]
    fn missing_series_block_is_malformed_not_empty() {
        let payload = json!({"Meta Data": {}});
        assert!(matches!(
            parse_intraday(&payload, "AAPL"),
            Err(AppError::MalformedPayload(_))
        ));
        assert!(matches!(
            parse_daily(&payload, "AAPL"),
            Err(AppError::MalformedPayload(_))
        ));
    }

    #[test]
    fn malformed_numeric_fails_the_whole_fetch() {
        let payload = json!({
            "Time Series (5min)": {
                "2024-06-10 09:30:00": entry("190.00", "190.50", "5000"),
                "2024-06-10 09:35:00": entry("not-a-number", "190.50", "5000"),
            }
        });

        assert!(matches!(
            parse_intraday(&payload, "AAPL"),
            Err(AppError::MalformedPayload(_))
        ));
    }

    #[test]
    fn fractional_volume_is_rejected() {
        let payload = json!({
            "Time Series (5min)": {
                "2024-06-10 09:30:00": entry("190.00", "190.50", "50.5"),
            }
        });

        assert!(matches!(
            parse_intraday(&payload, "AAPL"),
            Err(AppError::MalformedPayload(_))
        ));
    }
}
