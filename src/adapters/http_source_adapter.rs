//! Exchange chart API bar source.
//!
//! Requests `{base_url}/history?symbol=BTC_JPY&resolution=60&from=..&to=..`
//! with unix-second bounds. The body is an object with an `ohlc_data` array of
//! `{time, open, high, low, close}` where `time` is in milliseconds. Some
//! deployments wrap that object in a JSON string, which is unwrapped first.

use crate::domain::config_validation::DEFAULT_BASE_URL;
use crate::domain::error::TradetermError;
use crate::domain::ohlcv::Bar;
use crate::domain::period::Period;
use crate::ports::bar_source_port::BarSource;
use crate::ports::config_port::ConfigPort;
use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct OhlcResponse {
    ohlc_data: Vec<OhlcPoint>,
}

#[derive(Debug, Deserialize)]
struct OhlcPoint {
    time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

pub struct HttpBarSource {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpBarSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TradetermError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tradeterm/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TradetermError::Remote {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TradetermError> {
        let base_url = config
            .get_string("remote", "base_url")
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let timeout = config.get_count("remote", "timeout_secs", 30)?;
        Self::new(base_url.trim(), Duration::from_secs(timeout as u64))
    }

    pub fn history_url(
        &self,
        instrument: &str,
        period: Period,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> String {
        format!(
            "{}/history?symbol={}&resolution={}&from={}&to={}",
            self.base_url,
            instrument.to_uppercase(),
            period.api_code(),
            from.and_utc().timestamp(),
            to.and_utc().timestamp()
        )
    }
}

/// Decode a chart API body into ascending bars.
pub fn parse_history(body: &str) -> Result<Vec<Bar>, TradetermError> {
    let malformed = |e: serde_json::Error| TradetermError::RemoteResponse {
        reason: format!("malformed chart response: {e}"),
    };

    let value: serde_json::Value = serde_json::from_str(body).map_err(malformed)?;
    let value = match value {
        serde_json::Value::String(inner) => serde_json::from_str(&inner).map_err(malformed)?,
        other => other,
    };
    let response: OhlcResponse = serde_json::from_value(value).map_err(malformed)?;

    response
        .ohlc_data
        .into_iter()
        .map(|p| {
            let time = DateTime::from_timestamp_millis(p.time)
                .map(|t| t.naive_utc())
                .ok_or_else(|| TradetermError::RemoteResponse {
                    reason: format!("invalid bar time {}", p.time),
                })?;
            Ok(Bar {
                time,
                open: p.open,
                high: p.high,
                low: p.low,
                close: p.close,
            })
        })
        .collect()
}

impl BarSource for HttpBarSource {
    fn name(&self) -> &str {
        "chart_api"
    }

    fn fetch(
        &self,
        instrument: &str,
        period: Period,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Bar>, TradetermError> {
        let url = self.history_url(instrument, period, from, to);

        let resp = self.client.get(&url).send().map_err(|e| {
            if e.is_connect() || e.is_timeout() || e.is_request() {
                TradetermError::Remote {
                    reason: e.to_string(),
                }
            } else {
                TradetermError::RemoteResponse {
                    reason: e.to_string(),
                }
            }
        })?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(TradetermError::Remote {
                reason: format!("HTTP {status} for {instrument} {period}"),
            });
        }
        if !status.is_success() {
            return Err(TradetermError::RemoteResponse {
                reason: format!("HTTP {status} for {instrument} {period}"),
            });
        }

        let body = resp.text().map_err(|e| TradetermError::Remote {
            reason: format!("failed to read body: {e}"),
        })?;
        parse_history(&body)
    }
}
