use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Timelike, Utc, Weekday};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::api::health::HealthState;
use crate::config::{CategoryConfig, SCHEDULER_POLL_SECS};
use crate::error::Result;
use crate::scanner::ScanService;
use crate::types::ScanResult;

/// A scan fired by the scheduler. The handle resolves to the run's outcome.
pub struct ScheduledRun {
    pub category: String,
    pub handle: JoinHandle<Result<ScanResult>>,
}

/// Fires category scans at fixed local times of day on weekdays.
///
/// Matching is exact to the minute with one poll per minute, so a minute the
/// process was not running for is simply skipped.
pub struct Scheduler {
    service: Arc<ScanService>,
    categories: Vec<CategoryConfig>,
    utc_offset: FixedOffset,
    health: Arc<HealthState>,
    /// category → local (date, hour, minute) it last fired for
    last_fired: HashMap<String, (NaiveDate, u32, u32)>,
}

impl Scheduler {
    pub fn new(
        service: Arc<ScanService>,
        categories: Vec<CategoryConfig>,
        utc_offset: FixedOffset,
        health: Arc<HealthState>,
    ) -> Self {
        Self {
            service,
            categories,
            utc_offset,
            health,
            last_fired: HashMap::new(),
        }
    }

    pub async fn run(mut self) {
        self.health.set_scheduler_running(true);
        for c in &self.categories {
            let times: Vec<String> = c.triggers.iter().map(|t| t.to_string()).collect();
            info!(category = %c.name, "Scheduled on weekdays at {} (UTC{})", times.join(", "), self.utc_offset);
        }

        loop {
            tokio::time::sleep(until_next_poll(Utc::now())).await;

            for run in self.tick(Utc::now()) {
                tokio::spawn(supervise(run));
            }
        }
    }

    /// Evaluate one poll at `now` and spawn every due scan.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<ScheduledRun> {
        let local = now.with_timezone(&self.utc_offset);
        let minute_key = (local.date_naive(), local.hour(), local.minute());

        let due: Vec<String> = due_categories(&self.categories, &local)
            .into_iter()
            .map(|c| c.name.clone())
            .collect();

        let mut runs = Vec::new();
        for category in due {
            if self.last_fired.get(&category) == Some(&minute_key) {
                continue;
            }
            self.last_fired.insert(category.clone(), minute_key);

            info!(category = %category, local_time = %local.format("%a %H:%M"), "Triggering scheduled scan");
            let service = Arc::clone(&self.service);
            let name = category.clone();
            // Waits behind a manual run of the same category rather than being dropped.
            let handle = tokio::spawn(async move { service.run_scheduled(&name).await });
            runs.push(ScheduledRun { category, handle });
        }
        runs
    }
}

/// Categories whose trigger list contains the local (hour, minute), on Monday–Friday only.
pub fn due_categories<'a>(categories: &'a [CategoryConfig], local: &DateTime<FixedOffset>) -> Vec<&'a CategoryConfig> {
    if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
        return Vec::new();
    }
    let (hour, minute) = (local.hour(), local.minute());
    categories
        .iter()
        .filter(|c| c.triggers.iter().any(|t| t.hour == hour && t.minute == minute))
        .collect()
}

/// Await a fired run and log how it ended. Never propagates.
async fn supervise(run: ScheduledRun) {
    match run.handle.await {
        Ok(Ok(result)) => info!(
            category = %run.category,
            id = %result.id,
            qualified = result.qualified,
            "Scheduled scan finished"
        ),
        Ok(Err(e)) => error!(category = %run.category, "Scheduled scan failed: {e}"),
        Err(e) => error!(category = %run.category, "Scheduled scan task panicked: {e}"),
    }
}

/// Sleep until just past the next minute boundary.
fn until_next_poll(now: DateTime<Utc>) -> Duration {
    let into_minute = now.timestamp().rem_euclid(SCHEDULER_POLL_SECS as i64) as u64;
    Duration::from_secs(SCHEDULER_POLL_SECS - into_minute) + Duration::from_millis(500)
}
