use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::{Config, USER_AGENT};
use crate::error::{AppError, Result};
use crate::types::{DerivativeRecord, InstrumentKind, OptionSide};

/// Per-ticker fetch failure. Recorded on the ticker, never propagated past the scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Non-200 response.
    Status(u16),
    Timeout,
    /// Connection, TLS, body or decode failure.
    Transport(String),
}

impl FetchError {
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = e.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Status(code) => write!(f, "HTTP {code}"),
            FetchError::Timeout => write!(f, "timed out"),
            FetchError::Transport(msg) => write!(f, "{msg}"),
        }
    }
}

/// Upstream market-data API: the ticker universe plus per-ticker derivative records.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Failure here aborts the whole scan.
    async fn fetch_universe(&self) -> Result<Vec<String>>;

    async fn fetch_records(&self, ticker: &str) -> std::result::Result<Vec<DerivativeRecord>, FetchError>;
}

/// NSE-style JSON API over reqwest. The client keeps a cookie jar so the
/// session handed out by the landing page is reused for the API calls.
pub struct HttpMarketData {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMarketData {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.fetch_timeout_secs))
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.upstream_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Hit the landing page so cookie-gated endpoints accept us. Best effort.
    async fn warm_up(&self) {
        if let Err(e) = self.client.get(&self.base_url).send().await {
            debug!("Session warm-up failed: {e}");
        }
    }
}

#[async_trait]
impl MarketDataSource for HttpMarketData {
    async fn fetch_universe(&self) -> Result<Vec<String>> {
        self.warm_up().await;

        let url = format!("{}/api/master-quote", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::UniverseFetch(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(AppError::UniverseFetch(format!("{url} returned HTTP {}", resp.status())));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| AppError::UniverseFetch(e.to_string()))?;

        parse_universe(&body)
            .ok_or_else(|| AppError::UniverseFetch("universe response was not an array".to_string()))
    }

    async fn fetch_records(&self, ticker: &str) -> std::result::Result<Vec<DerivativeRecord>, FetchError> {
        let url = format!("{}/api/quote-derivative", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("symbol", ticker)])
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body: serde_json::Value = resp.json().await.map_err(|e| FetchError::from_reqwest(&e))?;
        Ok(parse_records(&body))
    }
}

/// Ticker universe: a JSON array of strings. Non-string and blank entries are skipped.
pub fn parse_universe(v: &serde_json::Value) -> Option<Vec<String>> {
    let items = v.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|t| t.as_str())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
    )
}

/// Derivative records from `{"stocks":[{"metadata":{...}}]}`. The feed is not
/// contractually shaped, so every field falls back to zero or empty.
pub fn parse_records(v: &serde_json::Value) -> Vec<DerivativeRecord> {
    let Some(stocks) = v.get("stocks").and_then(|s| s.as_array()) else {
        return Vec::new();
    };

    stocks
        .iter()
        .map(|row| {
            let meta = row.get("metadata").unwrap_or(row);
            DerivativeRecord {
                kind: parse_instrument_kind(str_field(meta, "instrumentType")),
                expiry: str_field(meta, "expiryDate").to_string(),
                side: parse_option_side(str_field(meta, "optionType")),
                open: num_field(meta, "openPrice"),
                high: num_field(meta, "highPrice"),
                low: num_field(meta, "lowPrice"),
                prev_close: num_field(meta, "prevClose"),
                volume: num_field(meta, "numberOfContractsTraded"),
            }
        })
        .collect()
}

fn str_field<'a>(v: &'a serde_json::Value, key: &str) -> &'a str {
    v.get(key).and_then(|s| s.as_str()).unwrap_or("")
}

/// Numbers arrive either as JSON numbers or as strings, sometimes with thousands separators.
fn num_field(v: &serde_json::Value, key: &str) -> f64 {
    v.get(key)
        .and_then(|x| {
            x.as_f64()
                .or_else(|| x.as_str().and_then(|s| s.trim().replace(',', "").parse().ok()))
        })
        .unwrap_or(0.0)
}

pub fn parse_instrument_kind(s: &str) -> InstrumentKind {
    match s.trim().to_lowercase().as_str() {
        "stock futures" | "futstk" => InstrumentKind::StockFuture,
        "stock options" | "optstk" => InstrumentKind::StockOption,
        _ => InstrumentKind::Other,
    }
}

pub fn parse_option_side(s: &str) -> OptionSide {
    match s.trim().to_lowercase().as_str() {
        "call" | "ce" => OptionSide::Call,
        "put" | "pe" => OptionSide::Put,
        _ => OptionSide::None,
    }
}
