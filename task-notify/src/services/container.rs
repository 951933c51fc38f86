//! Service container for dependency injection.
//!
//! The ServiceContainer builds every service from one database pool and one
//! [`AppConfig`], and owns the background tasks and their shutdown.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::Result;
use crate::api::AppState;
use crate::config::AppConfig;
use crate::database::MaintenanceScheduler;
use crate::database::repositories::{
    NotificationRepository, SqlxNotificationRepository, SqlxTaskRepository,
};
use crate::notification::{IdempotentReceiver, NotificationInbox, ReceiverConfig};
use crate::resilience::CircuitBreaker;
use crate::state_store::{SqliteStateStore, StateStore};
use crate::task::TaskService;
use crate::utils::{Clock, system_clock};
use crate::webhook::{HttpTransport, WebhookDispatcher, WebhookTransport};

/// Default shutdown timeout.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Service container holding all application services.
pub struct ServiceContainer {
    pub pool: SqlitePool,
    pub state_store: Arc<dyn StateStore>,
    pub notification_repository: Arc<dyn NotificationRepository>,
    pub dispatcher: Arc<WebhookDispatcher>,
    pub receiver: Arc<IdempotentReceiver>,
    pub inbox: Arc<NotificationInbox>,
    pub task_service: Arc<TaskService>,
    maintenance: Arc<MaintenanceScheduler>,
    background: Mutex<Vec<JoinHandle<()>>>,
    cancellation_token: CancellationToken,
}

impl ServiceContainer {
    /// Build all services with the HTTP webhook transport and the system clock.
    pub fn new(pool: SqlitePool, config: &AppConfig) -> Self {
        let transport = Arc::new(HttpTransport::new(config.webhook.transport.clone()));
        Self::with_parts(pool, config, transport, system_clock())
    }

    /// Build all services around a given transport and clock.
    pub fn with_parts(
        pool: SqlitePool,
        config: &AppConfig,
        transport: Arc<dyn WebhookTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        info!(environment = %config.environment, "Initializing service container");
        let cancellation_token = CancellationToken::new();

        let state_store: Arc<dyn StateStore> =
            Arc::new(SqliteStateStore::new(pool.clone(), clock.clone()));
        let notification_repository: Arc<dyn NotificationRepository> = Arc::new(
            SqlxNotificationRepository::with_clock(pool.clone(), clock.clone()),
        );
        let task_repository = Arc::new(SqlxTaskRepository::with_clock(pool.clone(), clock.clone()));

        let breaker = CircuitBreaker::new(state_store.clone(), clock.clone(), config.breaker.clone());
        let dispatcher = Arc::new(
            WebhookDispatcher::new(transport, breaker, config.webhook.secret.clone())
                .with_retry(config.webhook.retry.clone())
                .with_environment(config.environment)
                .with_cancellation(cancellation_token.child_token()),
        );

        let receiver = Arc::new(IdempotentReceiver::new(
            state_store.clone(),
            notification_repository.clone(),
            clock.clone(),
            ReceiverConfig {
                secret: config.webhook.secret.clone(),
                idempotency_ttl: config.idempotency_ttl,
                notification_ttl_days: config.notification_ttl_days,
            },
        ));
        let inbox = Arc::new(NotificationInbox::new(notification_repository.clone()));
        let task_service = Arc::new(TaskService::new(
            task_repository,
            dispatcher.clone(),
            clock,
        ));

        let maintenance = Arc::new(
            MaintenanceScheduler::new(state_store.clone(), config.maintenance.clone())
                .with_notifications(notification_repository.clone()),
        );

        info!("Service container initialized");

        Self {
            pool,
            state_store,
            notification_repository,
            dispatcher,
            receiver,
            inbox,
            task_service,
            maintenance,
            background: Mutex::new(Vec::new()),
            cancellation_token,
        }
    }

    /// Start the periodic maintenance task.
    pub fn start_background_tasks(&self) {
        let handle = self
            .maintenance
            .clone()
            .start(self.cancellation_token.child_token());
        self.background.lock().push(handle);
    }

    /// State for the notification service routes.
    pub fn notification_state(&self) -> AppState {
        AppState::new("task-notification-service")
            .with_state_store(self.state_store.clone())
            .with_receiver(self.receiver.clone())
            .with_inbox(self.inbox.clone())
    }

    /// State for the task API routes.
    pub fn task_api_state(&self) -> AppState {
        AppState::new("task-management-api")
            .with_state_store(self.state_store.clone())
            .with_task_service(self.task_service.clone())
            .with_dispatcher(self.dispatcher.clone())
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Shutdown all services gracefully.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT).await
    }

    /// Cancel background work, wait for it up to `timeout`, then close the pool.
    ///
    /// Webhook deliveries waiting on a backoff end as cancelled.
    pub async fn shutdown_with_timeout(&self, timeout: Duration) -> Result<()> {
        info!("Shutting down services (timeout: {:?})", timeout);
        self.cancellation_token.cancel();

        let handles: Vec<_> = self.background.lock().drain(..).collect();
        let joined = tokio::time::timeout(timeout, async {
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!(error = %e, "Background task ended abnormally");
                }
            }
        })
        .await;
        if joined.is_err() {
            warn!("Shutdown timeout reached, forcing shutdown");
        }

        let stats = self.dispatcher.stats();
        info!(
            delivered = stats.delivered,
            exhausted = stats.exhausted,
            dropped_circuit_open = stats.dropped_circuit_open,
            "Webhook delivery totals"
        );

        info!("Closing database pool...");
        self.pool.close().await;

        info!("Services shut down");
        Ok(())
    }
}
