//! Repository layer for database access.

pub mod notification;
pub mod task;

pub use notification::*;
pub use task::*;
