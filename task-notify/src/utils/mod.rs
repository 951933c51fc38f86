//! Shared helpers.

pub mod clock;
pub mod fs;
pub mod http_client;

pub use clock::{Clock, ManualClock, SystemClock, system_clock};
