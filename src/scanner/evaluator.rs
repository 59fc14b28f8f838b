use std::time::Instant;

use tracing::debug;

use crate::api::latency::LatencyStats;
use crate::config::MAX_OPEN_DEVIATION_PCT;
use crate::fetcher::{FetchError, MarketDataSource};
use crate::types::{
    DerivativeRecord, InstrumentKind, OptionSide, ScanStatus, SideCounts, SymbolClassification,
};

/// Fetch one ticker's records and classify them. Fetch failures become a
/// status on the classification; this never fails.
pub async fn evaluate(
    source: &dyn MarketDataSource,
    ticker: &str,
    expiry: &str,
    latency: &LatencyStats,
) -> SymbolClassification {
    let started = Instant::now();
    let fetched = source.fetch_records(ticker).await;
    latency.record(started.elapsed());

    match fetched {
        Ok(records) => classify(ticker, &records, expiry),
        Err(e) => {
            debug!(ticker = %ticker, "Fetch failed: {e}");
            let status = match e {
                FetchError::Status(code) => ScanStatus::HttpError(code),
                FetchError::Timeout => ScanStatus::Timeout,
                FetchError::Transport(msg) => ScanStatus::TransportError(msg),
            };
            SymbolClassification::with_status(ticker, status)
        }
    }
}

/// Apply the eligibility gate, then the open-equals-low/high counting rule.
pub fn classify(ticker: &str, records: &[DerivativeRecord], expiry: &str) -> SymbolClassification {
    if !is_eligible(records, expiry) {
        return SymbolClassification::with_status(ticker, ScanStatus::ConditionNotMet);
    }

    let mut call = SideCounts::default();
    let mut put = SideCounts::default();

    for r in records {
        if r.kind != InstrumentKind::StockOption || !expiry_matches(&r.expiry, expiry) {
            continue;
        }
        if r.open <= 0.0 || r.volume <= 0.0 {
            continue;
        }
        let counts = match r.side {
            OptionSide::Call => &mut call,
            OptionSide::Put => &mut put,
            OptionSide::None => continue,
        };
        // Exact equality on purpose: these prices come straight from the feed.
        if r.open == r.low {
            counts.open_low += 1;
        }
        if r.open == r.high {
            counts.open_high += 1;
        }
    }

    SymbolClassification {
        ticker: ticker.to_string(),
        call,
        put,
        status: ScanStatus::Success,
    }
}

/// At least one stock future at `expiry` opened within the allowed band around its previous close.
pub fn is_eligible(records: &[DerivativeRecord], expiry: &str) -> bool {
    records.iter().any(|r| {
        r.kind == InstrumentKind::StockFuture
            && expiry_matches(&r.expiry, expiry)
            && r.prev_close > 0.0
            && within_open_band(r.open, r.prev_close)
    })
}

/// |open - prev| / prev * 100 <= band, evaluated without the division so that
/// round-number boundaries (e.g. 100.5 vs 100) land exactly on the band.
fn within_open_band(open: f64, prev_close: f64) -> bool {
    (open - prev_close).abs() * 100.0 <= MAX_OPEN_DEVIATION_PCT * prev_close
}

/// Case-insensitive, whitespace-tolerant. A blank expiry on either side never matches.
pub fn expiry_matches(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    !a.is_empty() && !b.is_empty() && a.eq_ignore_ascii_case(b)
}
