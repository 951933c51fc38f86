//! Outbound HTTP client construction.

use std::time::Duration;

use tracing::warn;

/// User agent sent on outbound webhook calls.
pub const USER_AGENT: &str = concat!("task-notify/", env!("CARGO_PKG_VERSION"));

/// Build the shared client for outbound webhook calls.
///
/// `timeout` bounds the whole request, connect included.
pub fn build_client(timeout: Duration) -> reqwest::Client {
    match reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .user_agent(USER_AGENT)
        .build()
    {
        Ok(client) => client,
        Err(error) => {
            warn!(
                error = %error,
                "Failed to build configured HTTP client; falling back to reqwest defaults"
            );
            reqwest::Client::new()
        }
    }
}
