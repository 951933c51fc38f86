//! Sign and send one task-completion webhook to a running notification service.
//!
//! Run:
//!   WEBHOOK_SECRET=dev-secret cargo run -p task-notify --example send_webhook
//!
//! Optional env:
//! - WEBHOOK_URL=http://127.0.0.1:3001/notify
//! - USER_ID=1, TASK_ID=42, TASK_TITLE="Write report"

use anyhow::Context;
use chrono::Utc;
use task_notify::webhook::{
    HttpTransport, HttpTransportConfig, WebhookPayload, WebhookRequest, WebhookTransport,
};
use tracing::info;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,task_notify=debug".into()),
        )
        .init();

    let secret = std::env::var("WEBHOOK_SECRET").context("WEBHOOK_SECRET must be set")?;
    let url = env_or("WEBHOOK_URL", "http://127.0.0.1:3001/notify");
    let user_id: i64 = env_or("USER_ID", "1").parse().context("USER_ID")?;
    let task_id: i64 = env_or("TASK_ID", "42").parse().context("TASK_ID")?;
    let title = env_or("TASK_TITLE", "Write report");

    let payload = WebhookPayload::task_completed(user_id, task_id, &title, Utc::now());
    let body = payload.canonical_body()?;
    let signature = webhook_signature::sign_bytes(&secret, body.as_bytes())?;
    info!(%url, %body, %signature, "sending webhook");

    let transport = HttpTransport::new(HttpTransportConfig::new(url));
    transport
        .send(&WebhookRequest {
            body,
            signature,
            attempt: 1,
        })
        .await?;

    info!("webhook accepted");
    Ok(())
}
