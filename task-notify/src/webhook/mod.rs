//! Outbound task-completion webhooks.
//!
//! A completed task becomes a [`WebhookPayload`], which is signed once and
//! delivered by the [`WebhookDispatcher`] through the circuit breaker with a
//! bounded retry schedule. Delivery is best effort: a payload dropped by an
//! open circuit or exhausted retries is logged and reported, never queued.

pub mod dispatcher;
pub mod payload;
pub mod transport;

pub use dispatcher::{
    DeliveryFailureHook, DeliveryOutcome, DispatcherStats, DispatcherStatsSnapshot,
    LogFailureHook, WEBHOOK_SERVICE, WebhookDispatcher,
};
pub use payload::WebhookPayload;
pub use transport::{HttpTransport, HttpTransportConfig, WebhookRequest, WebhookTransport};
