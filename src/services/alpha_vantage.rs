use std::time::Duration;

use async_trait::async_trait;
use isahc::{config::Configurable, AsyncReadResponseExt, HttpClient};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::models::MinuteInterval;

/// Per-request network timeout. Retries are bounded by the attempt budget,
/// not by a higher-level deadline.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Raw HTTP exchange result, decoupled from the HTTP library so the retry
/// and classification logic can be driven by scripted responses in tests.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<RawResponse>;
}

/// Production transport: one reusable isahc client. The connection pool is
/// tied to the client handle and released when the client drops, on every
/// exit path.
pub struct IsahcTransport {
    client: HttpClient,
}

impl IsahcTransport {
    pub fn new() -> Result<Self> {
        let client = HttpClient::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for IsahcTransport {
    async fn get(&self, url: &str) -> Result<RawResponse> {
        let mut response = self.client.get_async(url).await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(RawResponse { status, body })
    }
}

/// Alpha Vantage client with a bounded fixed-backoff retry loop.
///
/// Response classification, in priority order:
/// 1. non-2xx status: retryable, `Transport` after the attempt budget
/// 2. "Error Message" field: fatal, no retry
/// 3. "Information" premium notice: fatal, no retry
/// 4. "Note" throttle notice: retryable, `RateLimitExhausted` after budget
/// 5. otherwise the parsed document is returned
///
/// The attempt budget is shared across HTTP-level and payload-level triggers.
pub struct AlphaVantageClient<T: Transport = IsahcTransport> {
    transport: T,
    base_url: String,
    api_key: String,
    max_retries: u32,
    backoff: Duration,
}

impl AlphaVantageClient<IsahcTransport> {
    pub fn new(cfg: &AppConfig) -> Result<Self> {
        Ok(Self::with_transport(
            IsahcTransport::new()?,
            &cfg.base_url,
            &cfg.api_key,
            cfg.max_retries,
            cfg.backoff,
        ))
    }
}

impl<T: Transport> AlphaVantageClient<T> {
    pub fn with_transport(
        transport: T,
        base_url: &str,
        api_key: &str,
        max_retries: u32,
        backoff: Duration,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            max_retries,
            backoff,
        }
    }

    pub async fn fetch_time_series_daily(&self, symbol: &str, outputsize: &str) -> Result<Value> {
        self.fetch_series(
            "TIME_SERIES_DAILY",
            &[("symbol", symbol), ("outputsize", outputsize)],
        )
        .await
    }

    pub async fn fetch_time_series_intraday(
        &self,
        symbol: &str,
        interval: MinuteInterval,
        outputsize: &str,
        month: Option<&str>,
    ) -> Result<Value> {
        let mut params = vec![
            ("symbol", symbol),
            ("interval", interval.as_provider_str()),
            ("outputsize", outputsize),
        ];
        if let Some(month) = month {
            params.push(("month", month));
        }
        self.fetch_series("TIME_SERIES_INTRADAY", &params).await
    }

    pub async fn fetch_series(&self, function: &str, extra_params: &[(&str, &str)]) -> Result<Value> {
        let mut params: Vec<(&str, &str)> = vec![("function", function), ("datatype", "json")];
        params.extend_from_slice(extra_params);
        params.push(("apikey", self.api_key.as_str()));

        let url = build_url(&self.base_url, &params);
        self.get_json_with_retries(&url).await
    }

    async fn get_json_with_retries(&self, url: &str) -> Result<Value> {
        let masked = mask_api_key(url, &self.api_key);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            debug!(attempt, url = %masked, "Provider request");

            let response = self.transport.get(url).await?;

            if !(200..300).contains(&response.status) {
                if attempt >= self.max_retries {
                    return Err(AppError::Transport {
                        status: response.status,
                        snippet: snippet(&response.body),
                    });
                }
                warn!(
                    attempt,
                    status = response.status,
                    backoff_secs = self.backoff.as_secs(),
                    "Provider returned non-2xx, retrying"
                );
                sleep(self.backoff).await;
                continue;
            }

            let data: Value = serde_json::from_str(&response.body)
                .map_err(|e| AppError::MalformedPayload(format!("Invalid JSON body: {}", e)))?;

            if let Some(msg) = data.get("Error Message").and_then(Value::as_str) {
                return Err(AppError::ProviderRejected(msg.to_string()));
            }

            if let Some(info) = data.get("Information").and_then(Value::as_str) {
                if info.to_lowercase().contains("premium") {
                    return Err(AppError::PlanRestricted(info.to_string()));
                }
            }

            // Rate limit / throttle message comes in "Note"
            if let Some(note) = data.get("Note").and_then(Value::as_str) {
                if attempt >= self.max_retries {
                    return Err(AppError::RateLimitExhausted(note.to_string()));
                }
                warn!(
                    attempt,
                    backoff_secs = self.backoff.as_secs(),
                    "Provider throttle notice, retrying"
                );
                sleep(self.backoff).await;
                continue;
            }

            return Ok(data);
        }
    }
}

fn build_url(base_url: &str, params: &[(&str, &str)]) -> String {
    let query: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect();
    format!("{}?{}", base_url, query.join("&"))
}

/// Credentials never reach the logs.
fn mask_api_key(url: &str, api_key: &str) -> String {
    if api_key.is_empty() {
        url.to_string()
    } else {
        url.replace(api_key, "***")
    }
}

/// First 200 chars of an error body, newlines collapsed.
fn snippet(body: &str) -> String {
    body.chars().take(200).collect::<String>().replace('\n', " ")
}
