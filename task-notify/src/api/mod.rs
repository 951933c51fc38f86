//! REST API server module.
//!
//! Provides the HTTP surfaces of both binaries: webhook intake and the
//! notification inbox, and the task API with webhook administration.

pub mod error;
pub mod identity;
pub mod openapi;
pub mod routes;
pub mod server;

pub use routes::ApiSurface;
pub use server::{ApiServer, ApiServerConfig, AppState};
