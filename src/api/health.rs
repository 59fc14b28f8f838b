//! Shared health state for the /health endpoint.
//! Updated by the scan service and the scheduler.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Process health counters. Written by scanner components, read by the API.
#[derive(Default)]
pub struct HealthState {
    /// True while the scheduler loop is polling.
    pub scheduler_running: AtomicBool,
    pub scans_in_flight: AtomicU64,
    pub scans_completed: AtomicU64,
    /// Runs that ended with an error (universe fetch failures).
    pub scans_failed: AtomicU64,
    /// Millisecond timestamp of the last successful scan (0 = none).
    pub last_scan_at_ms: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_scheduler_running(&self, v: bool) {
        self.scheduler_running.store(v, Ordering::Relaxed);
    }

    pub fn scan_started(&self) {
        self.scans_in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn scan_finished(&self, ok: bool) {
        self.scans_in_flight.fetch_sub(1, Ordering::Relaxed);
        if ok {
            self.scans_completed.fetch_add(1, Ordering::Relaxed);
            self.last_scan_at_ms.store(now_ms(), Ordering::Relaxed);
        } else {
            self.scans_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn scheduler_running(&self) -> bool {
        self.scheduler_running.load(Ordering::Relaxed)
    }

    pub fn scans_in_flight(&self) -> u64 {
        self.scans_in_flight.load(Ordering::Relaxed)
    }

    pub fn scans_completed(&self) -> u64 {
        self.scans_completed.load(Ordering::Relaxed)
    }

    pub fn scans_failed(&self) -> u64 {
        self.scans_failed.load(Ordering::Relaxed)
    }

    pub fn last_scan_at_ms(&self) -> u64 {
        self.last_scan_at_ms.load(Ordering::Relaxed)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_scan_lifecycle() {
        let h = HealthState::new();
        h.scan_started();
        h.scan_started();
        assert_eq!(h.scans_in_flight(), 2);

        h.scan_finished(true);
        h.scan_finished(false);
        assert_eq!(h.scans_in_flight(), 0);
        assert_eq!(h.scans_completed(), 1);
        assert_eq!(h.scans_failed(), 1);
        assert!(h.last_scan_at_ms() > 0);
    }
}
