//! In-memory market data source and record builders shared by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::error::{AppError, Result};
use crate::fetcher::{FetchError, MarketDataSource};
use crate::types::{DerivativeRecord, InstrumentKind, OptionSide};

pub fn future(expiry: &str, open: f64, prev_close: f64) -> DerivativeRecord {
    DerivativeRecord {
        kind: InstrumentKind::StockFuture,
        expiry: expiry.to_string(),
        side: OptionSide::None,
        open,
        high: open,
        low: open,
        prev_close,
        volume: 1_000.0,
    }
}

pub fn option(expiry: &str, side: OptionSide, open: f64, high: f64, low: f64, volume: f64) -> DerivativeRecord {
    DerivativeRecord {
        kind: InstrumentKind::StockOption,
        expiry: expiry.to_string(),
        side,
        open,
        high,
        low,
        prev_close: open,
        volume,
    }
}

/// Scripted upstream. Tickers with no scripted records return an empty list.
pub struct FakeSource {
    universe: std::result::Result<Vec<String>, String>,
    records: HashMap<String, std::result::Result<Vec<DerivativeRecord>, FetchError>>,
    delay: Duration,
    universe_delay: Duration,
    /// When set, every `fetch_records` waits for a notification first.
    hold: Option<Arc<Notify>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new(universe: &[&str]) -> Self {
        Self {
            universe: Ok(universe.iter().map(|t| t.to_string()).collect()),
            records: HashMap::new(),
            delay: Duration::ZERO,
            universe_delay: Duration::ZERO,
            hold: None,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_universe(msg: &str) -> Self {
        let mut s = Self::new(&[]);
        s.universe = Err(msg.to_string());
        s
    }

    pub fn with(mut self, ticker: &str, records: Vec<DerivativeRecord>) -> Self {
        self.records.insert(ticker.to_string(), Ok(records));
        self
    }

    pub fn fail(mut self, ticker: &str, err: FetchError) -> Self {
        self.records.insert(ticker.to_string(), Err(err));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_universe_delay(mut self, delay: Duration) -> Self {
        self.universe_delay = delay;
        self
    }

    pub fn held_by(mut self, notify: Arc<Notify>) -> Self {
        self.hold = Some(notify);
        self
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MarketDataSource for FakeSource {
    async fn fetch_universe(&self) -> Result<Vec<String>> {
        if !self.universe_delay.is_zero() {
            tokio::time::sleep(self.universe_delay).await;
        }
        self.universe.clone().map_err(AppError::UniverseFetch)
    }

    async fn fetch_records(&self, ticker: &str) -> std::result::Result<Vec<DerivativeRecord>, FetchError> {
        self.calls.lock().unwrap().push(ticker.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(hold) = &self.hold {
            hold.notified().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.records.get(ticker).cloned().unwrap_or_else(|| Ok(Vec::new()))
    }
}
