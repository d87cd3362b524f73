//! karat-sweeper: maintenance sweep daemon.
//!
//! Periodically closes expired sweepstakes (auto-drawing winners where
//! configured) and activates due ones. Typically deployed as a CronJob
//! or a long-running daemon next to the API service.
//!
//! ## Configuration
//! - KARAT__STORAGE__BACKEND: "memory" or "mongodb"
//! - KARAT__STORAGE__URI / KARAT__STORAGE__DATABASE: MongoDB connection
//! - KARAT__MAINTENANCE__SWEEP_INTERVAL_SECS: seconds between sweeps

use std::time::Duration;

use tracing::info;

use karat::config::Config;
use karat::services::{MaintenanceScheduler, MaintenanceService, SweepstakesService};
use karat::storage::init_storage;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    karat::utils::bootstrap::init_tracing();

    let config_path = karat::utils::bootstrap::parse_config_path();
    let config = Config::load(config_path.as_deref())?;

    info!("Starting karat-sweeper");

    let store = init_storage(&config.storage).await?;
    let sweepstakes = SweepstakesService::new(store.clone());
    let maintenance = MaintenanceService::new(store, sweepstakes);

    let scheduler = MaintenanceScheduler::new(
        maintenance,
        Duration::from_secs(config.maintenance.sweep_interval_secs),
    );
    scheduler.run().await;

    Ok(())
}
