//! Process lifecycle shared by both binaries.

use std::sync::Arc;

use tokio::signal;
use tracing::{info, warn};

use crate::Result;
use crate::api::{ApiServer, ApiServerConfig, ApiSurface};
use crate::config::AppConfig;
use crate::database;
use crate::logging::LoggingConfig;
use crate::services::ServiceContainer;

/// Resolve on Ctrl+C or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C; shutting down"),
        _ = terminate => info!("Received SIGTERM; shutting down"),
    }
}

/// Open the database, build the services and serve `surface` until a
/// shutdown signal arrives.
///
/// `logging` backs the `/api/logging` routes when given.
pub async fn run(
    config: AppConfig,
    surface: ApiSurface,
    logging: Option<Arc<LoggingConfig>>,
) -> Result<()> {
    let pool = database::init_pool(&config.database_url).await?;
    database::run_migrations(&pool).await?;

    let container = ServiceContainer::new(pool, &config);
    container.start_background_tasks();

    let mut state = match surface {
        ApiSurface::Notifications => container.notification_state(),
        ApiSurface::Tasks => container.task_api_state(),
    };
    if let Some(logging) = logging {
        state = state.with_logging_config(logging);
    }
    let server = ApiServer::new(ApiServerConfig::from(&config), state, surface)
        .with_cancel_token(container.cancellation_token().child_token());

    let cancel = container.cancellation_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        cancel.cancel();
    });

    let served = server.run().await;
    container.shutdown().await?;
    served
}
