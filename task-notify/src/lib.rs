//! task-notify library crate.
//!
//! Task-completion webhooks between a task API and a notification service:
//! HMAC-signed delivery through a shared circuit breaker with bounded
//! retries, idempotent intake, and a per-user notification inbox.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod notification;
pub mod panic_hook;
pub mod resilience;
pub mod services;
pub mod state_store;
pub mod task;
pub mod utils;
pub mod webhook;

pub use error::{Error, FieldError, Result};
