use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration as ChronoDuration, Utc};
use serde_json::Value;
use tracing::info;

use crate::error::Result;
use crate::models::{Candle, MinuteInterval};
use crate::services::alpha_vantage::{AlphaVantageClient, Transport};
use crate::services::normalizer;

/// Maximum lookback one intraday fetch reliably covers. Beyond it the
/// previous calendar month is fetched as a second query and merged.
const SINGLE_FETCH_SPAN_DAYS: u32 = 30;

/// Provider seam. Orchestration is written against this trait so window
/// merging and dedup can be exercised with scripted clients.
#[async_trait]
pub trait MarketDataClient: Send + Sync {
    async fn fetch_time_series_daily(&self, symbol: &str, outputsize: &str) -> Result<Value>;

    async fn fetch_time_series_intraday(
        &self,
        symbol: &str,
        interval: MinuteInterval,
        outputsize: &str,
        month: Option<&str>,
    ) -> Result<Value>;
}

#[async_trait]
impl<T: Transport> MarketDataClient for AlphaVantageClient<T> {
    async fn fetch_time_series_daily(&self, symbol: &str, outputsize: &str) -> Result<Value> {
        AlphaVantageClient::fetch_time_series_daily(self, symbol, outputsize).await
    }

    async fn fetch_time_series_intraday(
        &self,
        symbol: &str,
        interval: MinuteInterval,
        outputsize: &str,
        month: Option<&str>,
    ) -> Result<Value> {
        AlphaVantageClient::fetch_time_series_intraday(self, symbol, interval, outputsize, month)
            .await
    }
}

pub struct TimeSeriesService<C: MarketDataClient> {
    client: C,
}

impl<C: MarketDataClient> TimeSeriesService<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Intraday bars for the last `days` days, ascending, deduplicated by
    /// (ts, symbol). A lookback beyond one fetch span issues a second query
    /// scoped to the previous calendar month; if the first fetch fails the
    /// second is never attempted. Zero surviving records is not an error
    /// here — callers decide whether an empty window is fatal.
    pub async fn intraday_history(
        &self,
        symbol: &str,
        interval: MinuteInterval,
        days: u32,
    ) -> Result<Vec<Candle>> {
        let recent = self
            .client
            .fetch_time_series_intraday(symbol, interval, "full", None)
            .await?;
        let mut bars = normalizer::parse_intraday(&recent, symbol)?;

        if days > SINGLE_FETCH_SPAN_DAYS {
            let month = previous_month(Utc::now());
            info!(symbol, %month, "Lookback exceeds one fetch span, fetching previous month");
            let older = self
                .client
                .fetch_time_series_intraday(symbol, interval, "full", Some(&month))
                .await?;
            bars.extend(normalizer::parse_intraday(&older, symbol)?);
        }

        Ok(window(bars, days))
    }

    /// Daily bars for the last `days` days, same dedup and cutoff rules.
    pub async fn daily_history(&self, symbol: &str, days: u32) -> Result<Vec<Candle>> {
        let payload = self.client.fetch_time_series_daily(symbol, "full").await?;
        let bars = normalizer::parse_daily(&payload, symbol)?;
        Ok(window(bars, days))
    }
}

/// Merge keyed by (ts, symbol) — later entries win, which only matters when
/// fetch windows overlap — then drop bars older than the cutoff and sort
/// ascending.
fn window(bars: Vec<Candle>, days: u32) -> Vec<Candle> {
    let mut merged: HashMap<(DateTime<Utc>, String), Candle> =
        HashMap::with_capacity(bars.len());
    for bar in bars {
        merged.insert((bar.ts, bar.symbol.clone()), bar);
    }

    let cutoff = Utc::now() - ChronoDuration::days(i64::from(days));
    let mut out: Vec<Candle> = merged.into_values().filter(|b| b.ts >= cutoff).collect();
    out.sort_by(|a, b| a.ts.cmp(&b.ts));
    out
}

/// Previous calendar month as the provider's "YYYY-MM" query value.
fn previous_month(now: DateTime<Utc>) -> String {
    let first_of_month = now
        .date_naive()
        .with_day(1)
        .expect("first of month is valid");
    let last_of_previous = first_of_month - ChronoDuration::days(1);
    last_of_previous.format("%Y-%m").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::services::normalizer::EXCHANGE_TZ;
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Scripted client: one payload for the current window, one for the
    /// previous-month window. Errors propagate as the real client's would.
    struct ScriptedClient {
        recent: Result<Value>,
        older: Result<Value>,
        intraday_calls: AtomicU32,
    }

    impl ScriptedClient {
        fn new(recent: Result<Value>, older: Result<Value>) -> Self {
            Self {
                recent,
                older,
                intraday_calls: AtomicU32::new(0),
            }
        }
    }

    fn clone_result(r: &Result<Value>) -> Result<Value> {
        match r {
            Ok(v) => Ok(v.clone()),
            Err(AppError::Transport { status, snippet }) => Err(AppError::Transport {
                status: *status,
                snippet: snippet.clone(),
            }),
            Err(e) => Err(AppError::MalformedPayload(e.to_string())),
        }
    }

    #[async_trait]
    impl MarketDataClient for ScriptedClient {
        async fn fetch_time_series_daily(&self, _symbol: &str, _outputsize: &str) -> Result<Value> {
            clone_result(&self.recent)
        }

        async fn fetch_time_series_intraday(
            &self,
            _symbol: &str,
            _interval: MinuteInterval,
            _outputsize: &str,
            month: Option<&str>,
        ) -> Result<Value> {
            self.intraday_calls.fetch_add(1, Ordering::SeqCst);
            if month.is_none() {
                clone_result(&self.recent)
            } else {
                clone_result(&self.older)
            }
        }
    }

    /// Render a UTC instant as the provider's exchange-local entry key.
    fn entry_key(ts: DateTime<Utc>) -> String {
        ts.with_timezone(&EXCHANGE_TZ)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }

    fn intraday_payload(entries: &[(DateTime<Utc>, &str)]) -> Value {
        let mut series = serde_json::Map::new();
        for (ts, close) in entries {
            series.insert(
                entry_key(*ts),
                json!({
                    "1. open": "100.0",
                    "2. high": "101.0",
                    "3. low": "99.0",
                    "4. close": close,
                    "5. volume": "1000",
                }),
            );
        }
        json!({ "Time Series (5min)": series })
    }

    fn truncate_to_minute(ts: DateTime<Utc>) -> DateTime<Utc> {
        // entry keys have second precision; stay on a whole minute so the
        // round-trip through the key format is lossless
        DateTime::from_timestamp(ts.timestamp() / 60 * 60, 0).unwrap()
    }

    #[tokio::test]
    async fn short_lookback_issues_a_single_query() {
        let now = truncate_to_minute(Utc::now());
        let client = ScriptedClient::new(
            Ok(intraday_payload(&[(now - ChronoDuration::days(1), "101.0")])),
            Ok(intraday_payload(&[])),
        );
        let svc = TimeSeriesService::new(client);

        let bars = svc
            .intraday_history("AAPL", MinuteInterval::Minute5, 5)
            .await
            .unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(svc.client.intraday_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn long_lookback_merges_two_windows_and_dedups_overlap() {
        let now = truncate_to_minute(Utc::now());
        let overlap = now - ChronoDuration::days(20);
        let recent_only = now - ChronoDuration::days(1);
        let older_only = now - ChronoDuration::days(40);
        let too_old = now - ChronoDuration::days(60);

        let client = ScriptedClient::new(
            Ok(intraday_payload(&[
                (recent_only, "110.0"),
                (overlap, "120.0"),
            ])),
            Ok(intraday_payload(&[
                (overlap, "121.0"),
                (older_only, "130.0"),
                (too_old, "140.0"),
            ])),
        );
        let svc = TimeSeriesService::new(client);

        let bars = svc
            .intraday_history("AAPL", MinuteInterval::Minute5, 45)
            .await
            .unwrap();

        assert_eq!(svc.client.intraday_calls.load(Ordering::SeqCst), 2);
        // one record per timestamp, 60-day-old bar filtered out
        assert_eq!(bars.len(), 3);
        let overlap_bar = bars.iter().find(|b| b.ts == overlap).unwrap();
        // the later (previous-month) fetch wins the overlapping key
        assert_eq!(overlap_bar.close, 121.0);
        assert!(bars.iter().all(|b| b.ts >= now - ChronoDuration::days(45)));
        assert!(bars.windows(2).all(|w| w[0].ts <= w[1].ts));
    }

    #[tokio::test]
    async fn first_fetch_failure_aborts_before_second_query() {
        let client = ScriptedClient::new(
            Err(AppError::Transport {
                status: 503,
                snippet: "unavailable".to_string(),
            }),
            Ok(intraday_payload(&[])),
        );
        let svc = TimeSeriesService::new(client);

        let err = svc
            .intraday_history("AAPL", MinuteInterval::Minute5, 45)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Transport { status: 503, .. }));
        assert_eq!(svc.client.intraday_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_window_is_ok_not_an_error() {
        let now = truncate_to_minute(Utc::now());
        let client = ScriptedClient::new(
            Ok(intraday_payload(&[(now - ChronoDuration::days(20), "100.0")])),
            Ok(intraday_payload(&[])),
        );
        let svc = TimeSeriesService::new(client);

        let bars = svc
            .intraday_history("AAPL", MinuteInterval::Minute5, 5)
            .await
            .unwrap();
        assert!(bars.is_empty());
    }

    #[tokio::test]
    async fn daily_history_applies_the_same_cutoff() {
        let today = Utc::now().date_naive();
        let recent_key = (today - ChronoDuration::days(2)).format("%Y-%m-%d").to_string();
        let old_key = (today - ChronoDuration::days(30)).format("%Y-%m-%d").to_string();
        let mut series = serde_json::Map::new();
        series.insert(
            recent_key,
            json!({
                "1. open": "100.0", "2. high": "101.0", "3. low": "99.0",
                "4. close": "100.5", "5. volume": "1000",
            }),
        );
        series.insert(
            old_key,
            json!({
                "1. open": "90.0", "2. high": "91.0", "3. low": "89.0",
                "4. close": "90.5", "5. volume": "900",
            }),
        );
        let payload = json!({ "Time Series (Daily)": series });
        let client = ScriptedClient::new(Ok(payload), Ok(json!({})));
        let svc = TimeSeriesService::new(client);

        let bars = svc.daily_history("AAPL", 7).await.unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, 100.5);
    }

    #[test]
    fn previous_month_rolls_over_year_boundary() {
        let jan = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        assert_eq!(previous_month(jan), "2023-12");
        let jun = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(previous_month(jun), "2024-05");
    }
}
