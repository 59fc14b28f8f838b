use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info};

use crate::api::health::HealthState;
use crate::config::{CategoryConfig, JOURNAL_CAPACITY};
use crate::error::{AppError, Result};
use crate::journal::ResultJournal;
use crate::scanner::orchestrator::ScanOrchestrator;
use crate::types::ScanResult;

struct CategorySlot {
    config: CategoryConfig,
    journal: ResultJournal,
    /// Held across the scan and its journal append.
    run_lock: Mutex<()>,
}

/// Entry point for scheduled and manual scans and for history queries.
/// Holds one journal per category and guarantees at most one in-flight run
/// per category.
pub struct ScanService {
    orchestrator: ScanOrchestrator,
    categories: HashMap<String, CategorySlot>,
    health: Arc<HealthState>,
}

impl ScanService {
    pub fn new(
        orchestrator: ScanOrchestrator,
        categories: &[CategoryConfig],
        journal_dir: impl AsRef<Path>,
        health: Arc<HealthState>,
    ) -> Arc<Self> {
        let categories = categories
            .iter()
            .map(|c| {
                let slot = CategorySlot {
                    config: c.clone(),
                    journal: ResultJournal::new(journal_dir.as_ref(), &c.name, JOURNAL_CAPACITY),
                    run_lock: Mutex::new(()),
                };
                (c.name.clone(), slot)
            })
            .collect();

        Arc::new(Self {
            orchestrator,
            categories,
            health,
        })
    }

    pub fn category_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.categories.keys().cloned().collect();
        names.sort();
        names
    }

    fn slot(&self, category: &str) -> Result<&CategorySlot> {
        self.categories
            .get(category)
            .ok_or_else(|| AppError::UnknownCategory(category.to_string()))
    }

    /// Manual run for `category`. `expiry` overrides the configured target
    /// expiry for this run only.
    ///
    /// A second manual trigger while a run for the same category is in flight
    /// is rejected with `ScanInProgress`. A failed journal write is logged and
    /// the result is still returned.
    pub async fn trigger(&self, category: &str, expiry: Option<&str>) -> Result<ScanResult> {
        let slot = self.slot(category)?;
        let expiry = resolve_expiry(slot, expiry)?;
        let _running = slot
            .run_lock
            .try_lock()
            .map_err(|_| AppError::ScanInProgress(category.to_string()))?;
        self.scan_and_record(slot, expiry).await
    }

    /// Scheduled run for `category` at its configured expiry. Waits for any
    /// in-flight run of the same category instead of being dropped, so every
    /// trigger minute leaves its own journal entry.
    pub async fn run_scheduled(&self, category: &str) -> Result<ScanResult> {
        let slot = self.slot(category)?;
        let expiry = resolve_expiry(slot, None)?;
        let _running = slot.run_lock.lock().await;
        self.scan_and_record(slot, expiry).await
    }

    async fn scan_and_record(&self, slot: &CategorySlot, expiry: &str) -> Result<ScanResult> {
        let category = slot.config.name.as_str();

        self.health.scan_started();
        let outcome = self.orchestrator.run(category, expiry).await;
        self.health.scan_finished(outcome.is_ok());
        let result = outcome?;

        if let Err(e) = slot.journal.append(&result).await {
            error!(category = %category, id = %result.id, "Failed to persist scan result: {e}");
        } else {
            info!(category = %category, id = %result.id, "Scan result recorded");
        }

        Ok(result)
    }

    pub async fn list(&self, category: &str) -> Result<Vec<ScanResult>> {
        Ok(self.slot(category)?.journal.load().await)
    }

    pub async fn latest(&self, category: &str) -> Result<Option<ScanResult>> {
        Ok(self.slot(category)?.journal.latest().await)
    }

    pub async fn get(&self, category: &str, id: &str) -> Result<Option<ScanResult>> {
        Ok(self.slot(category)?.journal.get(id).await)
    }
}

/// Override if non-blank, else the configured expiry. A blank target would
/// match nothing, so it is refused before any upstream call.
fn resolve_expiry<'a>(slot: &'a CategorySlot, requested: Option<&'a str>) -> Result<&'a str> {
    requested
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .or_else(|| Some(slot.config.expiry.trim()).filter(|e| !e.is_empty()))
        .ok_or_else(|| AppError::MissingExpiry(slot.config.name.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::latency::LatencyStats;
    use crate::config::TriggerTime;
    use crate::fetcher::MarketDataSource;
    use crate::scanner::gate::ConcurrencyGate;
    use crate::testing::{future, FakeSource};
    use chrono::FixedOffset;
    use tokio::sync::Notify;

    const EXP: &str = "28-Oct-2026";

    fn category(name: &str) -> CategoryConfig {
        CategoryConfig {
            name: name.to_string(),
            triggers: vec![TriggerTime { hour: 9, minute: 20 }],
            expiry: EXP.to_string(),
        }
    }

    fn service(source: Arc<dyn MarketDataSource>, dir: &Path) -> Arc<ScanService> {
        service_with(source, dir, &[category("opening"), category("closing")])
    }

    fn service_with(source: Arc<dyn MarketDataSource>, dir: &Path, categories: &[CategoryConfig]) -> Arc<ScanService> {
        let orchestrator = ScanOrchestrator::new(
            source,
            ConcurrencyGate::new(10),
            Arc::new(LatencyStats::new()),
            FixedOffset::east_opt(330 * 60).unwrap(),
        );
        ScanService::new(orchestrator, categories, dir, Arc::new(HealthState::new()))
    }

    #[tokio::test]
    async fn trigger_records_result_in_journal() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeSource::new(&["AAA"]).with("AAA", vec![future(EXP, 100.0, 100.0)]);
        let svc = service(Arc::new(source), dir.path());

        let result = svc.trigger("opening", None).await.unwrap();
        assert_eq!(result.qualified, 1);

        assert_eq!(svc.list("opening").await.unwrap(), vec![result.clone()]);
        assert_eq!(svc.latest("opening").await.unwrap(), Some(result.clone()));
        assert_eq!(svc.get("opening", &result.id).await.unwrap(), Some(result));
        assert!(svc.list("closing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn expiry_override_applies_to_one_run() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeSource::new(&["AAA"]).with("AAA", vec![future("25-Nov-2026", 100.0, 100.0)]);
        let svc = service(Arc::new(source), dir.path());

        let default_run = svc.trigger("opening", None).await.unwrap();
        assert_eq!(default_run.qualified, 0);

        let override_run = svc.trigger("opening", Some("25-Nov-2026")).await.unwrap();
        assert_eq!(override_run.qualified, 1);
        assert_eq!(override_run.expiry, "25-Nov-2026");
    }

    #[tokio::test]
    async fn universe_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(Arc::new(FakeSource::failing_universe("HTTP 403")), dir.path());

        let err = svc.trigger("opening", None).await.unwrap_err();
        assert!(matches!(err, AppError::UniverseFetch(_)));
        assert!(svc.list("opening").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_category_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(Arc::new(FakeSource::new(&[])), dir.path());
        assert!(matches!(svc.trigger("nope", None).await, Err(AppError::UnknownCategory(_))));
        assert!(matches!(svc.list("nope").await, Err(AppError::UnknownCategory(_))));
        assert!(matches!(svc.get("nope", "1").await, Err(AppError::UnknownCategory(_))));
    }

    #[tokio::test]
    async fn concurrent_trigger_for_same_category_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let hold = Arc::new(Notify::new());
        let source = Arc::new(FakeSource::new(&["AAA"]).held_by(hold.clone()));
        let svc = service(source.clone(), dir.path());

        let first = {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move { svc.trigger("opening", None).await })
        };
        while source.calls().is_empty() {
            tokio::task::yield_now().await;
        }

        let second = svc.trigger("opening", None).await;
        assert!(matches!(second, Err(AppError::ScanInProgress(_))));

        hold.notify_one();
        let first = first.await.unwrap().unwrap();
        assert_eq!(svc.list("opening").await.unwrap(), vec![first]);
    }

    #[tokio::test]
    async fn scheduled_run_waits_behind_manual_run_and_records_its_own_entry() {
        let dir = tempfile::tempdir().unwrap();
        let hold = Arc::new(Notify::new());
        let source = Arc::new(
            FakeSource::new(&["AAA"])
                .with("AAA", vec![future(EXP, 100.0, 100.0)])
                .held_by(hold.clone()),
        );
        let svc = service(source.clone(), dir.path());

        let manual = {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move { svc.trigger("opening", None).await })
        };
        while source.calls().is_empty() {
            tokio::task::yield_now().await;
        }

        let scheduled = {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move { svc.run_scheduled("opening").await })
        };
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        // Still queued on the run lock: no second upstream call yet.
        assert_eq!(source.calls().len(), 1);

        hold.notify_one();
        let manual = manual.await.unwrap().unwrap();
        while source.calls().len() < 2 {
            tokio::task::yield_now().await;
        }
        hold.notify_one();
        let scheduled = scheduled.await.unwrap().unwrap();

        assert_eq!(manual.qualified, 1);
        assert_eq!(scheduled.qualified, 1);
        assert_eq!(svc.list("opening").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn blank_expiry_is_rejected_before_scanning() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(FakeSource::new(&["AAA"]).with("AAA", vec![future("", 100.0, 100.0)]));
        let mut blank = category("opening");
        blank.expiry = String::new();
        let svc = service_with(source.clone(), dir.path(), &[blank]);

        assert!(matches!(svc.trigger("opening", None).await, Err(AppError::MissingExpiry(_))));
        assert!(matches!(svc.trigger("opening", Some("  ")).await, Err(AppError::MissingExpiry(_))));
        assert!(matches!(svc.run_scheduled("opening").await, Err(AppError::MissingExpiry(_))));
        assert!(source.calls().is_empty());
        assert!(svc.list("opening").await.unwrap().is_empty());

        // A real override still works against a blank configured expiry.
        let run = svc.trigger("opening", Some(EXP)).await.unwrap();
        assert_eq!(run.qualified, 0);
    }

    #[tokio::test]
    async fn different_categories_run_independently() {
        let dir = tempfile::tempdir().unwrap();
        let hold = Arc::new(Notify::new());
        let source = Arc::new(FakeSource::new(&["AAA"]).held_by(hold.clone()));
        let svc = service(source.clone(), dir.path());

        let opening = {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move { svc.trigger("opening", None).await })
        };
        let closing = {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move { svc.trigger("closing", None).await })
        };
        while source.calls().len() < 2 {
            tokio::task::yield_now().await;
        }

        hold.notify_one();
        hold.notify_one();
        assert!(opening.await.unwrap().is_ok());
        assert!(closing.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn persistence_failure_still_returns_result() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the journal directory should be.
        let blocker = dir.path().join("journals");
        std::fs::write(&blocker, b"").unwrap();
        let source = FakeSource::new(&["AAA"]).with("AAA", vec![future(EXP, 100.0, 100.0)]);
        let svc = service(Arc::new(source), &blocker);

        let result = svc.trigger("opening", None).await.unwrap();
        assert_eq!(result.qualified, 1);
        assert!(svc.list("opening").await.unwrap().is_empty());
    }
}
