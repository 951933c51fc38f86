//! Circuit breaker with state shared through a [`StateStore`].
//!
//! Each service name owns one JSON document under `circuit_breaker:{service}`.
//! Every transition is applied with a compare-and-swap retry loop, so several
//! breaker instances (in one process or many) sharing a store never lose an
//! update. The document carries a TTL that is refreshed on every write; a
//! breaker nobody touched for that long starts over as closed.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::state_store::StateStore;
use crate::utils::Clock;
use crate::{Error, Result};

/// Attempts at applying one transition before giving up on contention.
const MAX_CAS_ATTEMPTS: u32 = 16;

/// State of a circuit breaker.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    utoipa::ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation.
    #[default]
    Closed,
    /// Failing; calls are rejected.
    Open,
    /// Cooldown elapsed; trial calls decide whether to close again.
    HalfOpen,
}

/// Persisted breaker document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerState {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
}

impl CircuitBreakerState {
    /// Decide whether a call may proceed, moving open to half-open once the
    /// cooldown has elapsed.
    fn admit(&mut self, now: DateTime<Utc>, timeout: Duration) -> bool {
        if self.state != CircuitState::Open {
            return true;
        }

        let cooled_down = match self.last_failure_time {
            None => true,
            Some(last) => {
                let timeout = chrono::Duration::from_std(timeout).unwrap_or(chrono::TimeDelta::MAX);
                now.signed_duration_since(last) >= timeout
            }
        };

        if cooled_down {
            self.state = CircuitState::HalfOpen;
            self.success_count = 0;
        }
        cooled_down
    }

    fn on_success(&mut self, config: &BreakerConfig) {
        match self.state {
            CircuitState::Closed => {
                self.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                self.success_count += 1;
                if self.success_count >= config.success_threshold {
                    *self = Self::default();
                }
            }
            // Reopened by another instance while this call was in flight.
            CircuitState::Open => {}
        }
    }

    fn on_failure(&mut self, config: &BreakerConfig, now: DateTime<Utc>) {
        match self.state {
            CircuitState::Closed => {
                self.failure_count += 1;
                if self.failure_count >= config.failure_threshold {
                    self.trip(now);
                }
            }
            CircuitState::HalfOpen => {
                self.failure_count += 1;
                self.trip(now);
            }
            CircuitState::Open => {
                self.last_failure_time = Some(now);
            }
        }
    }

    fn trip(&mut self, now: DateTime<Utc>) {
        self.state = CircuitState::Open;
        self.success_count = 0;
        self.last_failure_time = Some(now);
    }
}

/// Thresholds and timings of a breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive failures in closed state that open the circuit.
    pub failure_threshold: u32,
    /// Consecutive successes in half-open state that close it.
    pub success_threshold: u32,
    /// Cooldown before an open circuit admits a trial call.
    pub timeout: Duration,
    /// Lifetime of the persisted document, refreshed on every write.
    pub state_ttl: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(60),
            state_ttl: Duration::from_secs(60 * 60),
        }
    }
}

/// Circuit breaker for protecting against cascading failures.
#[derive(Clone)]
pub struct CircuitBreaker {
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    config: BreakerConfig,
}

impl CircuitBreaker {
    pub fn new(store: Arc<dyn StateStore>, clock: Arc<dyn Clock>, config: BreakerConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Run `operation` under the breaker of `service`.
    ///
    /// Returns [`Error::CircuitOpen`] without invoking the operation while the
    /// circuit is open. Otherwise the operation's own result is returned
    /// unchanged after its outcome has been recorded.
    pub async fn call<T, F, Fut>(&self, service: &str, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let now = self.clock.now();
        let timeout = self.config.timeout;
        let (state, admitted) = self.update(service, |s| s.admit(now, timeout)).await?;

        if !admitted {
            debug!(service, "Circuit open, rejecting call");
            return Err(Error::CircuitOpen {
                service: service.to_string(),
            });
        }
        if state.state == CircuitState::HalfOpen {
            debug!(service, success_count = state.success_count, "Trial call in half-open state");
        }

        let result = operation().await;

        let recorded = match &result {
            Ok(_) => self.record_success(service).await,
            Err(_) => self.record_failure(service).await,
        };
        if let Err(e) = recorded {
            warn!(service, error = %e, "Failed to record circuit breaker outcome");
        }

        result
    }

    /// Record a successful call.
    pub async fn record_success(&self, service: &str) -> Result<()> {
        let config = self.config.clone();
        let (state, previous) = self
            .update(service, |s| {
                let previous = s.state;
                s.on_success(&config);
                previous
            })
            .await?;

        if previous == CircuitState::HalfOpen && state.state == CircuitState::Closed {
            info!(service, "Circuit breaker closed after successful recovery");
        }
        Ok(())
    }

    /// Record a failed call.
    pub async fn record_failure(&self, service: &str) -> Result<()> {
        let config = self.config.clone();
        let now = self.clock.now();
        let (state, previous) = self
            .update(service, |s| {
                let previous = s.state;
                s.on_failure(&config, now);
                previous
            })
            .await?;

        match (previous, state.state) {
            (CircuitState::Closed, CircuitState::Open) => warn!(
                service,
                failures = state.failure_count,
                "Circuit breaker opened after consecutive failures"
            ),
            (CircuitState::HalfOpen, CircuitState::Open) => {
                warn!(service, "Circuit breaker reopened after failed trial call")
            }
            _ => {}
        }
        Ok(())
    }

    /// Current persisted state of `service`.
    pub async fn status(&self, service: &str) -> Result<CircuitBreakerState> {
        let raw = self.store.get(&state_key(service)).await?;
        Ok(decode(service, raw.as_deref()))
    }

    /// Force the breaker closed and clear its counters.
    pub async fn reset(&self, service: &str) -> Result<()> {
        let json = serde_json::to_string(&CircuitBreakerState::default())?;
        self.store
            .set(&state_key(service), &json, Some(self.config.state_ttl))
            .await?;
        info!(service, "Circuit breaker reset to closed state");
        Ok(())
    }

    /// Apply `transition` atomically, retrying on concurrent modification.
    ///
    /// Nothing is written when the transition leaves the state unchanged.
    async fn update<R>(
        &self,
        service: &str,
        mut transition: impl FnMut(&mut CircuitBreakerState) -> R,
    ) -> Result<(CircuitBreakerState, R)> {
        let key = state_key(service);

        for _ in 0..MAX_CAS_ATTEMPTS {
            let raw = self.store.get(&key).await?;
            let current = decode(service, raw.as_deref());

            let mut next = current.clone();
            let output = transition(&mut next);
            if next == current {
                return Ok((next, output));
            }

            let json = serde_json::to_string(&next)?;
            if self
                .store
                .compare_and_swap(&key, raw.as_deref(), &json, Some(self.config.state_ttl))
                .await?
            {
                return Ok((next, output));
            }
            debug!(service, "Circuit breaker state changed concurrently, retrying");
        }

        Err(Error::Other(format!(
            "circuit breaker state for '{service}' is too contended to update"
        )))
    }
}

fn state_key(service: &str) -> String {
    format!("circuit_breaker:{service}")
}

fn decode(service: &str, raw: Option<&str>) -> CircuitBreakerState {
    match raw {
        None => CircuitBreakerState::default(),
        Some(raw) => serde_json::from_str(raw).unwrap_or_else(|e| {
            warn!(service, error = %e, "Discarding unreadable circuit breaker state");
            CircuitBreakerState::default()
        }),
    }
}
