use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{FixedOffset, Utc};
use futures_util::future::join_all;
use tracing::{info, warn};

use crate::api::latency::LatencyStats;
use crate::config::RANKED_LIST_LEN;
use crate::error::Result;
use crate::fetcher::MarketDataSource;
use crate::scanner::evaluator::evaluate;
use crate::scanner::gate::ConcurrencyGate;
use crate::types::{RankedEntry, ScanResult, ScanStatus, SymbolClassification};

/// Runs one full scan: universe discovery, gated fan-out, fan-in, ranking.
pub struct ScanOrchestrator {
    source: Arc<dyn MarketDataSource>,
    gate: Arc<ConcurrencyGate>,
    latency: Arc<LatencyStats>,
    utc_offset: FixedOffset,
}

/// Counts and rankings derived from a completed fan-in.
#[derive(Debug, Default, PartialEq)]
pub struct Tally {
    pub scanned: usize,
    pub qualified: usize,
    pub errored: usize,
    pub bullish: Vec<RankedEntry>,
    pub bearish: Vec<RankedEntry>,
}

impl ScanOrchestrator {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        gate: Arc<ConcurrencyGate>,
        latency: Arc<LatencyStats>,
        utc_offset: FixedOffset,
    ) -> Self {
        Self { source, gate, latency, utc_offset }
    }

    /// Only a universe failure is returned as an error; per-ticker failures are
    /// folded into the result.
    pub async fn run(&self, category: &str, expiry: &str) -> Result<ScanResult> {
        let universe = dedup_preserving_order(self.source.fetch_universe().await?);
        // Elapsed covers the symbol fan-out only, not universe discovery.
        let started = Instant::now();
        info!(category = %category, symbols = universe.len(), expiry = %expiry, "Scan started");

        // join_all yields results in universe order regardless of completion order.
        let classifications: Vec<SymbolClassification> = join_all(universe.iter().map(|ticker| async move {
            let _permit = self.gate.acquire().await;
            evaluate(self.source.as_ref(), ticker, expiry, &self.latency).await
        }))
        .await;

        let tally = tally(&classifications);
        let elapsed_secs = round2(started.elapsed().as_secs_f64());
        let now = Utc::now().with_timezone(&self.utc_offset);

        if tally.errored > 0 {
            warn!(category = %category, errored = tally.errored, "Some symbols failed to fetch");
        }
        info!(
            category = %category,
            total = universe.len(),
            scanned = tally.scanned,
            qualified = tally.qualified,
            elapsed_secs,
            "Scan complete: {}/{} scanned, {} qualified in {elapsed_secs:.2}s",
            tally.scanned,
            universe.len(),
            tally.qualified,
        );

        Ok(ScanResult {
            id: now.timestamp_millis().to_string(),
            category: category.to_string(),
            timestamp: now.to_rfc3339(),
            total_symbols: universe.len(),
            scanned: tally.scanned,
            qualified: tally.qualified,
            errored: tally.errored,
            elapsed_secs,
            expiry: expiry.to_string(),
            bullish: tally.bullish,
            bearish: tally.bearish,
        })
    }
}

/// Partition outcomes and rank the qualified tickers. Input order is the tie-break.
pub fn tally(classifications: &[SymbolClassification]) -> Tally {
    let errored = classifications.iter().filter(|c| c.status.is_error()).count();
    let qualified: Vec<&SymbolClassification> = classifications
        .iter()
        .filter(|c| c.status == ScanStatus::Success)
        .collect();

    Tally {
        scanned: classifications.len() - errored,
        qualified: qualified.len(),
        errored,
        bullish: rank(&qualified, |c| (c.call.open_low, c.put.open_high)),
        bearish: rank(&qualified, |c| (c.put.open_low, c.call.open_high)),
    }
}

/// Stable sort descending on the first key, keep the top `RANKED_LIST_LEN`.
fn rank<F>(qualified: &[&SymbolClassification], key: F) -> Vec<RankedEntry>
where
    F: Fn(&SymbolClassification) -> (u32, u32),
{
    let mut entries: Vec<RankedEntry> = qualified
        .iter()
        .map(|c| {
            let (primary, secondary) = key(c);
            RankedEntry { ticker: c.ticker.clone(), primary, secondary }
        })
        .collect();
    entries.sort_by(|a, b| b.primary.cmp(&a.primary));
    entries.truncate(RANKED_LIST_LEN);
    entries
}

fn dedup_preserving_order(tickers: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tickers.into_iter().filter(|t| seen.insert(t.clone())).collect()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
