//! Webhook dispatcher: signing, circuit breaking and the outer retry loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::payload::WebhookPayload;
use super::transport::{WebhookRequest, WebhookTransport};
use crate::Error;
use crate::config::Environment;
use crate::resilience::{CircuitBreaker, RetryPolicy};

/// Circuit breaker service key for outbound notifications.
pub const WEBHOOK_SERVICE: &str = "webhook-notify";

/// How one delivery ended.
///
/// `attempts` counts requests handed to the transport. A call rejected by an
/// open circuit is not one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { attempts: u32 },
    /// The circuit was open; the payload is dropped without further retries.
    DroppedCircuitOpen { attempts: u32 },
    /// A failed attempt was swallowed outside production.
    Suppressed { attempts: u32, error: String },
    /// Every attempt failed.
    Exhausted { attempts: u32, error: String },
    /// Shutdown interrupted a backoff wait.
    Cancelled { attempts: u32 },
}

impl DeliveryOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Delivered { attempts }
            | Self::DroppedCircuitOpen { attempts }
            | Self::Suppressed { attempts, .. }
            | Self::Exhausted { attempts, .. }
            | Self::Cancelled { attempts } => *attempts,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Alert raised when a delivery exhausts its retries.
#[async_trait]
pub trait DeliveryFailureHook: Send + Sync {
    async fn on_exhausted(&self, payload: &WebhookPayload, error: &Error);
}

/// Default hook: an error-level log line for alerting pipelines to pick up.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFailureHook;

#[async_trait]
impl DeliveryFailureHook for LogFailureHook {
    async fn on_exhausted(&self, payload: &WebhookPayload, error: &Error) {
        error!(
            alert = true,
            task_id = payload.task_id,
            user_id = payload.user_id,
            error = %error,
            "Webhook delivery requires attention"
        );
    }
}

/// Outcome counters.
#[derive(Debug, Default)]
pub struct DispatcherStats {
    attempts: AtomicU64,
    delivered: AtomicU64,
    dropped_circuit_open: AtomicU64,
    suppressed: AtomicU64,
    exhausted: AtomicU64,
    cancelled: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct DispatcherStatsSnapshot {
    pub attempts: u64,
    pub delivered: u64,
    pub dropped_circuit_open: u64,
    pub suppressed: u64,
    pub exhausted: u64,
    pub cancelled: u64,
}

impl DispatcherStats {
    fn record(&self, outcome: &DeliveryOutcome) {
        self.attempts
            .fetch_add(u64::from(outcome.attempts()), Ordering::Relaxed);
        let counter = match outcome {
            DeliveryOutcome::Delivered { .. } => &self.delivered,
            DeliveryOutcome::DroppedCircuitOpen { .. } => &self.dropped_circuit_open,
            DeliveryOutcome::Suppressed { .. } => &self.suppressed,
            DeliveryOutcome::Exhausted { .. } => &self.exhausted,
            DeliveryOutcome::Cancelled { .. } => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped_circuit_open: self.dropped_circuit_open.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}

/// Delivers signed task-completion webhooks.
pub struct WebhookDispatcher {
    transport: Arc<dyn WebhookTransport>,
    breaker: CircuitBreaker,
    secret: String,
    retry: RetryPolicy,
    environment: Environment,
    failure_hook: Arc<dyn DeliveryFailureHook>,
    cancel: CancellationToken,
    stats: DispatcherStats,
}

impl WebhookDispatcher {
    pub fn new(
        transport: Arc<dyn WebhookTransport>,
        breaker: CircuitBreaker,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            breaker,
            secret: secret.into(),
            retry: RetryPolicy::default(),
            environment: Environment::Production,
            failure_hook: Arc::new(LogFailureHook),
            cancel: CancellationToken::new(),
            stats: DispatcherStats::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_failure_hook(mut self, hook: Arc<dyn DeliveryFailureHook>) -> Self {
        self.failure_hook = hook;
        self
    }

    /// Backoff waits end early, with [`DeliveryOutcome::Cancelled`], once this token fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }

    /// Deliver in a background task. The caller never waits on the network.
    pub fn enqueue(self: &Arc<Self>, payload: WebhookPayload) -> JoinHandle<DeliveryOutcome> {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move { dispatcher.deliver(&payload).await })
    }

    /// Deliver inline, running the full retry schedule.
    pub async fn deliver(&self, payload: &WebhookPayload) -> DeliveryOutcome {
        let outcome = self.run(payload).await;
        self.stats.record(&outcome);
        outcome
    }

    async fn run(&self, payload: &WebhookPayload) -> DeliveryOutcome {
        let signed = payload.canonical_body().and_then(|body| {
            let signature = webhook_signature::sign_bytes(&self.secret, body.as_bytes())?;
            Ok((body, signature))
        });
        let (body, signature) = match signed {
            Ok(signed) => signed,
            Err(e) => {
                let error = Error::Other(format!("failed to sign webhook payload: {e}"));
                error!(task_id = payload.task_id, error = %error, "Webhook not sent");
                self.failure_hook.on_exhausted(payload, &error).await;
                return DeliveryOutcome::Exhausted {
                    attempts: 0,
                    error: error.to_string(),
                };
            }
        };

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let request = WebhookRequest {
                body: body.clone(),
                signature: signature.clone(),
                attempt,
            };

            let result = self
                .breaker
                .call(WEBHOOK_SERVICE, || self.transport.send(&request))
                .await;

            let error = match result {
                Ok(()) => {
                    info!(
                        task_id = payload.task_id,
                        user_id = payload.user_id,
                        attempt,
                        "Webhook sent successfully"
                    );
                    return DeliveryOutcome::Delivered { attempts: attempt };
                }
                Err(Error::CircuitOpen { .. }) => {
                    warn!(
                        task_id = payload.task_id,
                        user_id = payload.user_id,
                        attempt,
                        "Circuit breaker is open, skipping webhook"
                    );
                    return DeliveryOutcome::DroppedCircuitOpen {
                        attempts: attempt - 1,
                    };
                }
                Err(e) => e,
            };

            if !self.environment.is_production() {
                warn!(
                    task_id = payload.task_id,
                    environment = %self.environment,
                    error = %error,
                    "Webhook failed; skipping retry outside production"
                );
                return DeliveryOutcome::Suppressed {
                    attempts: attempt,
                    error: error.to_string(),
                };
            }

            if !self.retry.should_retry(attempt) {
                let exhausted = Error::DeliveryExhausted {
                    attempts: attempt,
                    last_error: error.to_string(),
                };
                error!(
                    task_id = payload.task_id,
                    user_id = payload.user_id,
                    attempts = attempt,
                    error = %error,
                    "Webhook permanently failed after all retries"
                );
                self.failure_hook.on_exhausted(payload, &exhausted).await;
                return DeliveryOutcome::Exhausted {
                    attempts: attempt,
                    error: error.to_string(),
                };
            }

            let delay = self.retry.delay_after_attempt(attempt);
            warn!(
                task_id = payload.task_id,
                attempt,
                retry_in_ms = delay.as_millis() as u64,
                error = %error,
                "Webhook attempt failed, will retry"
            );

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!(task_id = payload.task_id, attempt, "Webhook retry cancelled by shutdown");
                    return DeliveryOutcome::Cancelled { attempts: attempt };
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
