//! Maintenance sweeps over the sweepstakes lifecycle.
//!
//! Two idempotent entry points, invoked by an external scheduler:
//! close expired sweepstakes (auto-drawing winners where configured)
//! and activate due ones. Both filter by current status, so re-running
//! on an overlapping schedule is a no-op, and every transition is a
//! version-checked put that tolerates live entry traffic.

use std::sync::Arc;
use std::time::Duration;

use backon::Retryable;
use chrono::{DateTime, Utc};
use tokio::time::interval;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::required;
use super::sweepstakes::SweepstakesService;
use crate::error::{LoyaltyError, Result};
use crate::interfaces::ledger_store::{LedgerStore, Versioned, WriteOp};
use crate::records::SweepstakesStatus;
use crate::utils::retry::{conflict_backoff, is_retryable};

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepReport {
    /// Records matching the sweep's filter.
    pub examined: usize,
    /// Records whose status actually transitioned.
    pub transitioned: usize,
    /// Winner draws performed (close sweep only).
    pub draws: usize,
    /// Per-record failures, logged and skipped.
    pub failures: usize,
}

/// Maintenance sweep service. Holds no timer state; scheduling belongs
/// to the caller.
#[derive(Clone)]
pub struct MaintenanceService {
    store: Arc<dyn LedgerStore>,
    sweepstakes: SweepstakesService,
}

impl MaintenanceService {
    pub fn new(store: Arc<dyn LedgerStore>, sweepstakes: SweepstakesService) -> Self {
        Self { store, sweepstakes }
    }

    /// End every active sweepstakes whose window has closed; draw
    /// winners immediately for the automatic ones.
    pub async fn close_expired(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let candidates = self
            .store
            .list_sweepstakes(Some(SweepstakesStatus::Active))
            .await?;

        let mut report = SweepReport::default();
        for sweepstakes in candidates.into_iter().filter(|s| s.end_date < now) {
            report.examined += 1;

            let closed = match self.close_one(sweepstakes.id, now).await {
                Ok(closed) => closed,
                Err(e) => {
                    warn!(sweepstakes = %sweepstakes.id, error = %e, "Failed to close sweepstakes");
                    report.failures += 1;
                    continue;
                }
            };
            if !closed {
                continue;
            }
            report.transitioned += 1;

            if sweepstakes.is_automatic {
                match self.sweepstakes.select_winners(sweepstakes.id).await {
                    Ok(winners) => {
                        report.draws += 1;
                        info!(
                            sweepstakes = %sweepstakes.id,
                            winners = winners.len(),
                            "Auto-drew winners for closed sweepstakes"
                        );
                    }
                    // A concurrent sweep got there first; nothing to do.
                    Err(LoyaltyError::AlreadyAnnounced) => {}
                    Err(e) => {
                        warn!(sweepstakes = %sweepstakes.id, error = %e, "Auto-draw failed");
                        report.failures += 1;
                    }
                }
            }
        }

        Ok(report)
    }

    /// Activate every upcoming sweepstakes whose window has opened.
    pub async fn activate_due(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let candidates = self
            .store
            .list_sweepstakes(Some(SweepstakesStatus::Upcoming))
            .await?;

        let mut report = SweepReport::default();
        for sweepstakes in candidates.into_iter().filter(|s| s.start_date <= now) {
            report.examined += 1;
            match self.activate_one(sweepstakes.id, now).await {
                Ok(true) => report.transitioned += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(sweepstakes = %sweepstakes.id, error = %e, "Failed to activate sweepstakes");
                    report.failures += 1;
                }
            }
        }

        Ok(report)
    }

    /// Transition one sweepstakes active -> ended. Returns false if a
    /// concurrent sweep already processed it.
    async fn close_one(&self, sweepstakes_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        (|| self.transition_one(sweepstakes_id, now, SweepstakesStatus::Active, SweepstakesStatus::Ended, true))
            .retry(conflict_backoff())
            .when(is_retryable)
            .await
    }

    /// Transition one sweepstakes upcoming -> active.
    async fn activate_one(&self, sweepstakes_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        (|| self.transition_one(sweepstakes_id, now, SweepstakesStatus::Upcoming, SweepstakesStatus::Active, false))
            .retry(conflict_backoff())
            .when(is_retryable)
            .await
    }

    async fn transition_one(
        &self,
        sweepstakes_id: Uuid,
        now: DateTime<Utc>,
        from: SweepstakesStatus,
        to: SweepstakesStatus,
        expiring: bool,
    ) -> Result<bool> {
        let Versioned {
            record: mut sweepstakes,
            version,
        } = required(
            self.store.get_sweepstakes(sweepstakes_id).await,
            "sweepstakes",
        )?;

        // Re-check under the freshly read version; the listing may be
        // stale or another sweep may have run.
        let due = if expiring {
            sweepstakes.end_date < now
        } else {
            sweepstakes.start_date <= now
        };
        if sweepstakes.status != from || !due {
            return Ok(false);
        }

        sweepstakes.status = to;
        sweepstakes.updated_at = now;
        self.store
            .commit(vec![WriteOp::PutSweepstakes {
                sweepstakes,
                expected_version: version,
            }])
            .await?;

        info!(sweepstakes = %sweepstakes_id, status = %to, "Sweepstakes transitioned");
        Ok(true)
    }
}

/// Reference scheduler: runs both sweeps at a fixed interval.
///
/// The service itself is stateless; this is the loop an external
/// scheduler would otherwise provide.
pub struct MaintenanceScheduler {
    service: MaintenanceService,
    check_interval: Duration,
}

impl MaintenanceScheduler {
    pub fn new(service: MaintenanceService, check_interval: Duration) -> Self {
        Self {
            service,
            check_interval,
        }
    }

    /// Run the sweep loop indefinitely.
    pub async fn run(&self) {
        info!(
            check_interval = ?self.check_interval,
            "Starting maintenance scheduler"
        );

        let mut ticker = interval(self.check_interval);
        loop {
            ticker.tick().await;
            let now = Utc::now();

            match self.service.close_expired(now).await {
                Ok(report) => info!(
                    examined = report.examined,
                    transitioned = report.transitioned,
                    draws = report.draws,
                    failures = report.failures,
                    "Close-expired sweep finished"
                ),
                Err(e) => error!(error = %e, "Close-expired sweep failed"),
            }

            match self.service.activate_due(now).await {
                Ok(report) => info!(
                    examined = report.examined,
                    transitioned = report.transitioned,
                    failures = report.failures,
                    "Activate-due sweep finished"
                ),
                Err(e) => error!(error = %e, "Activate-due sweep failed"),
            }
        }
    }
}
