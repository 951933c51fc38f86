//! Service layer module.
//!
//! Wires repositories, the shared state store and the webhook pipeline into
//! the services both binaries serve.

pub mod container;
pub mod runtime;

pub use container::ServiceContainer;
