//! API server setup and configuration.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::{DefaultBodyLimit, Request};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::api::routes::{self, ApiSurface};
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::logging::LoggingConfig;
use crate::notification::{IdempotentReceiver, NotificationInbox};
use crate::state_store::StateStore;
use crate::task::TaskService;
use crate::webhook::WebhookDispatcher;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub enable_cors: bool,
    /// Request body size limit in bytes
    pub body_limit: usize,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: crate::config::DEFAULT_NOTIFY_PORT,
            enable_cors: true,
            body_limit: 64 * 1024,
        }
    }
}

impl From<&AppConfig> for ApiServerConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            bind_address: config.bind_address.clone(),
            port: config.port,
            ..Self::default()
        }
    }
}

/// Shared application state.
///
/// Each binary fills in the services its routes need. A route whose service
/// is missing answers 503.
#[derive(Clone)]
pub struct AppState {
    /// Server start time for uptime calculation
    pub start_time: Instant,
    /// Name reported by the health endpoint
    pub service_name: &'static str,
    pub state_store: Option<Arc<dyn StateStore>>,
    pub receiver: Option<Arc<IdempotentReceiver>>,
    pub inbox: Option<Arc<NotificationInbox>>,
    pub task_service: Option<Arc<TaskService>>,
    pub dispatcher: Option<Arc<WebhookDispatcher>>,
    pub logging_config: Option<Arc<LoggingConfig>>,
}

impl AppState {
    pub fn new(service_name: &'static str) -> Self {
        Self {
            start_time: Instant::now(),
            service_name,
            state_store: None,
            receiver: None,
            inbox: None,
            task_service: None,
            dispatcher: None,
            logging_config: None,
        }
    }

    pub fn with_state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.state_store = Some(store);
        self
    }

    pub fn with_receiver(mut self, receiver: Arc<IdempotentReceiver>) -> Self {
        self.receiver = Some(receiver);
        self
    }

    pub fn with_inbox(mut self, inbox: Arc<NotificationInbox>) -> Self {
        self.inbox = Some(inbox);
        self
    }

    pub fn with_task_service(mut self, service: Arc<TaskService>) -> Self {
        self.task_service = Some(service);
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<WebhookDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Set the logging configuration.
    pub fn with_logging_config(mut self, config: Arc<LoggingConfig>) -> Self {
        self.logging_config = Some(config);
        self
    }
}

/// API server.
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
    surface: ApiSurface,
    cancel_token: CancellationToken,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, state: AppState, surface: ApiSurface) -> Self {
        Self {
            config,
            state,
            surface,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Stop serving when `token` is cancelled.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Build the router with all middleware and routes.
    pub fn build_router(&self) -> Router {
        let mut router = routes::create_router(self.state.clone(), self.surface)
            .layer(DefaultBodyLimit::max(self.config.body_limit));

        if self.config.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            router = router.layer(cors);
        }

        router.layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    if is_health_check(req) {
                        Span::none()
                    } else {
                        let mut make_span =
                            tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO);
                        use tower_http::trace::MakeSpan;
                        make_span.make_span(req)
                    }
                })
                .on_request(|req: &Request, span: &Span| {
                    if span.is_disabled() || is_health_check(req) {
                        return;
                    }
                    let mut on_request =
                        tower_http::trace::DefaultOnRequest::new().level(tracing::Level::INFO);
                    use tower_http::trace::OnRequest;
                    on_request.on_request(req, span);
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        if span.is_disabled() {
                            return;
                        }
                        let on_response =
                            tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO);
                        use tower_http::trace::OnResponse;
                        on_response.on_response(res, latency, span);
                    },
                )
                .on_failure(
                    |class: tower_http::classify::ServerErrorsFailureClass,
                     latency: Duration,
                     span: &Span| {
                        if span.is_disabled() {
                            return;
                        }
                        let mut on_failure =
                            tower_http::trace::DefaultOnFailure::new().level(tracing::Level::ERROR);
                        use tower_http::trace::OnFailure;
                        on_failure.on_failure(class, latency, span);
                    },
                ),
        )
    }

    /// Bind and serve until the cancel token fires.
    pub async fn run(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| Error::config(format!("Invalid address: {e}")))?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let router = self.build_router();
        tracing::info!(
            service = self.state.service_name,
            "API server listening on http://{}",
            listener.local_addr()?
        );

        let cancel_token = self.cancel_token.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                tracing::info!("API server shutting down...");
            })
            .await?;

        Ok(())
    }

    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

fn is_health_check(req: &Request) -> bool {
    let path = req.uri().path();
    path == "/health" || path.starts_with("/api/health")
}
