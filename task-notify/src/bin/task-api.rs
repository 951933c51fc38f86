//! Task API: task records whose completion is announced to the notification
//! service by signed webhook.

use anyhow::Context;
use mimalloc::MiMalloc;
use task_notify::api::ApiSurface;
use task_notify::config::{AppConfig, DEFAULT_TASK_API_PORT};
use task_notify::services::runtime;
use task_notify::{logging, panic_hook};
use tokio_util::sync::CancellationToken;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const LOG_FILE_PREFIX: &str = "task-api.log";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env(DEFAULT_TASK_API_PORT).context("loading configuration")?;

    let (logging_config, _guard) = logging::init_logging(&config.log_dir, LOG_FILE_PREFIX)?;
    panic_hook::install(&config.log_dir, LOG_FILE_PREFIX);
    let log_cancel = CancellationToken::new();
    let retention = logging_config.start_retention_cleanup(log_cancel.clone());

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        webhook_url = %config.webhook.transport.url,
        filter = %logging_config.filter(),
        "Starting task-management-api"
    );

    runtime::run(config, ApiSurface::Tasks, Some(logging_config.clone())).await?;
    log_cancel.cancel();
    retention.await.ok();

    tracing::info!("task-management-api stopped");
    Ok(())
}
