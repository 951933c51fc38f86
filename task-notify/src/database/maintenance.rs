//! Periodic expiry sweep.
//!
//! Expired rows are already invisible to reads; this scheduler reclaims the
//! space they occupy:
//! - expired state-store entries (idempotency records, stale breaker state)
//! - expired notifications

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::database::repositories::NotificationRepository;
use crate::state_store::StateStore;

/// Configuration for the maintenance scheduler.
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// Interval between sweeps (default: 1 hour).
    pub interval: Duration,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60 * 60),
        }
    }
}

/// Result of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub state_entries_purged: u64,
    pub notifications_purged: u64,
}

/// Database maintenance scheduler.
pub struct MaintenanceScheduler {
    state_store: Arc<dyn StateStore>,
    notifications: Option<Arc<dyn NotificationRepository>>,
    config: MaintenanceConfig,
}

impl MaintenanceScheduler {
    pub fn new(state_store: Arc<dyn StateStore>, config: MaintenanceConfig) -> Self {
        Self {
            state_store,
            notifications: None,
            config,
        }
    }

    /// Also sweep expired notifications.
    pub fn with_notifications(mut self, repo: Arc<dyn NotificationRepository>) -> Self {
        self.notifications = Some(repo);
        self
    }

    /// Start the scheduler; it stops when `cancel` fires.
    pub fn start(self: Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("Maintenance scheduler stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        if let Err(e) = self.run_maintenance().await {
                            tracing::error!(error = %e, "Maintenance error");
                        }
                    }
                }
            }
        })
    }

    /// Run one sweep.
    pub async fn run_maintenance(&self) -> crate::Result<MaintenanceReport> {
        let mut report = MaintenanceReport {
            state_entries_purged: self.state_store.purge_expired().await?,
            ..Default::default()
        };

        if let Some(repo) = &self.notifications {
            report.notifications_purged = repo.purge_expired().await?;
        }

        if report != MaintenanceReport::default() {
            tracing::info!(
                state_entries = report.state_entries_purged,
                notifications = report.notifications_purged,
                "Purged expired records"
            );
        }

        Ok(report)
    }
}
