//! Notification service: receives signed task-completion webhooks and serves
//! the notification inbox.

use anyhow::Context;
use mimalloc::MiMalloc;
use task_notify::api::ApiSurface;
use task_notify::config::{AppConfig, DEFAULT_NOTIFY_PORT};
use task_notify::services::runtime;
use task_notify::{logging, panic_hook};
use tokio_util::sync::CancellationToken;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const LOG_FILE_PREFIX: &str = "task-notify.log";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env(DEFAULT_NOTIFY_PORT).context("loading configuration")?;

    let (logging_config, _guard) = logging::init_logging(&config.log_dir, LOG_FILE_PREFIX)?;
    panic_hook::install(&config.log_dir, LOG_FILE_PREFIX);
    let log_cancel = CancellationToken::new();
    let retention = logging_config.start_retention_cleanup(log_cancel.clone());

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        filter = %logging_config.filter(),
        "Starting task-notification-service"
    );

    runtime::run(config, ApiSurface::Notifications, Some(logging_config.clone())).await?;
    log_cancel.cancel();
    retention.await.ok();

    tracing::info!("task-notification-service stopped");
    Ok(())
}
