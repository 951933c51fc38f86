//! Database row models.
//!
//! These map one-to-one onto table rows. Timestamps are epoch milliseconds.

pub mod notification;
pub mod task;

pub use notification::*;
pub use task::*;
