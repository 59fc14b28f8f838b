//! In-memory histogram of per-symbol upstream fetch latency.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

/// Shared fetch latency stats. The evaluator records, the API reads.
/// Values stored in microseconds, 1us to 100s at 3 significant figures.
pub struct LatencyStats {
    inner: Mutex<hdrhistogram::Histogram<u64>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LatencySnapshot {
    pub samples: u64,
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
    pub max_ms: Option<f64>,
}

impl LatencyStats {
    pub fn new() -> Self {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, 100_000_000, 3)
            .expect("valid histogram bounds");
        Self {
            inner: Mutex::new(histogram),
        }
    }

    pub fn record(&self, d: Duration) {
        let us = d.as_micros().clamp(1, 100_000_000) as u64;
        if let Ok(mut h) = self.inner.lock() {
            let _ = h.record(us);
        }
    }

    pub fn snapshot(&self) -> LatencySnapshot {
        let Ok(h) = self.inner.lock() else {
            return LatencySnapshot { samples: 0, p50_ms: None, p95_ms: None, p99_ms: None, max_ms: None };
        };
        if h.len() == 0 {
            return LatencySnapshot { samples: 0, p50_ms: None, p95_ms: None, p99_ms: None, max_ms: None };
        }
        let ms = |us: u64| Some(us as f64 / 1000.0);
        LatencySnapshot {
            samples: h.len(),
            p50_ms: ms(h.value_at_quantile(0.5)),
            p95_ms: ms(h.value_at_quantile(0.95)),
            p99_ms: ms(h.value_at_quantile(0.99)),
            max_ms: ms(h.max()),
        }
    }

    /// Sample count.
    pub fn len(&self) -> u64 {
        self.inner.lock().map(|h| h.len()).unwrap_or(0)
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}
