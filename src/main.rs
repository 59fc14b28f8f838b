mod api;
mod config;
mod error;
mod fetcher;
mod journal;
mod scanner;
mod scheduler;
mod types;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use chrono::FixedOffset;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::fetcher::HttpMarketData;
use crate::scanner::{ConcurrencyGate, ScanOrchestrator, ScanService};
use crate::scheduler::Scheduler;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let utc_offset = FixedOffset::east_opt(cfg.utc_offset_minutes * 60).ok_or_else(|| {
        AppError::Config(format!("UTC_OFFSET_MINUTES={} is out of range", cfg.utc_offset_minutes))
    })?;

    // --- Shared state ---
    let health = Arc::new(HealthState::new());
    let latency = Arc::new(LatencyStats::new());
    let gate = ConcurrencyGate::new(cfg.gate_capacity);

    // --- Scan engine ---
    let source = Arc::new(HttpMarketData::new(&cfg)?);
    let orchestrator = ScanOrchestrator::new(source, Arc::clone(&gate), Arc::clone(&latency), utc_offset);
    let service = ScanService::new(orchestrator, &cfg.categories, &cfg.journal_dir, Arc::clone(&health));
    info!(
        "Scanner ready: categories=[{}] upstream={} gate={} journal_dir={}",
        service.category_names().join(", "),
        cfg.upstream_base_url,
        cfg.gate_capacity,
        cfg.journal_dir,
    );

    // Scheduler (background, polls once per minute)
    let scheduler = Scheduler::new(
        Arc::clone(&service),
        cfg.categories.clone(),
        utc_offset,
        Arc::clone(&health),
    );
    tokio::spawn(async move { scheduler.run().await });

    // HTTP API server
    let api_state = ApiState { service, health, latency, gate };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
