//! Idempotent webhook receiver.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::database::models::NotificationDbModel;
use crate::database::repositories::NotificationRepository;
use crate::database::time::{add_days_ms, datetime_to_ms};
use crate::state_store::StateStore;
use crate::utils::Clock;
use crate::webhook::WebhookPayload;
use crate::{Error, FieldError, Result};

/// Shared counter notification ids are allocated from.
pub const NOTIFICATION_ID_COUNTER: &str = "notification:id:counter";

const IDEMPOTENCY_PREFIX: &str = "idempotency:";

/// Rounds of get / set-if-absent before giving up on a contended key.
const CLAIM_ATTEMPTS: usize = 3;

/// Longest accepted notification message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 500;

/// Settings of the receiver.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    pub secret: String,
    /// How long a replay of the same event is recognized.
    pub idempotency_ttl: Duration,
    /// Lifetime of a stored notification.
    pub notification_ttl_days: u32,
}

impl ReceiverConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            idempotency_ttl: Duration::from_secs(600),
            notification_ttl_days: 30,
        }
    }
}

/// Result of accepting a webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub notification_id: i64,
    /// `false` when this delivery replayed an event already stored.
    pub created: bool,
}

/// Accepts signed task-completion webhooks exactly once per event.
///
/// An event is identified by `(userId, taskId, timestamp)`. Replays within the
/// idempotency window return the id allocated on first sight.
pub struct IdempotentReceiver {
    store: Arc<dyn StateStore>,
    notifications: Arc<dyn NotificationRepository>,
    clock: Arc<dyn Clock>,
    config: ReceiverConfig,
}

impl IdempotentReceiver {
    pub fn new(
        store: Arc<dyn StateStore>,
        notifications: Arc<dyn NotificationRepository>,
        clock: Arc<dyn Clock>,
        config: ReceiverConfig,
    ) -> Self {
        Self {
            store,
            notifications,
            clock,
            config,
        }
    }

    /// Verify, deduplicate and store one webhook delivery.
    ///
    /// The signature is checked against the raw body before anything else, so
    /// an unsigned or tampered request never touches shared state.
    pub async fn receive(&self, signature: Option<&str>, body: &[u8]) -> Result<Receipt> {
        let signature = signature.ok_or(Error::SignatureInvalid)?;
        if !webhook_signature::verify_bytes(signature, &self.config.secret, body) {
            warn!("Rejected webhook with invalid signature");
            return Err(Error::SignatureInvalid);
        }

        let payload = parse_payload(body)?;
        let key = idempotency_key(&payload);

        let notification_id = match self.claim(&key).await? {
            Claim::Existing(notification_id) => {
                debug!(notification_id, "Duplicate webhook delivery");
                return Ok(Receipt {
                    notification_id,
                    created: false,
                });
            }
            Claim::Won(notification_id) => notification_id,
        };

        let received_at = datetime_to_ms(self.clock.now());
        let row = NotificationDbModel::new_unread(
            notification_id,
            payload.user_id,
            payload.task_id,
            payload.message,
            payload.timestamp,
            received_at,
            add_days_ms(received_at, self.config.notification_ttl_days),
        );

        if let Err(e) = self.notifications.save(&row).await {
            if let Err(cleanup) = self.store.delete(&key).await {
                warn!(error = %cleanup, "Failed to release idempotency record");
            }
            return Err(e);
        }

        info!(
            notification_id,
            user_id = row.user_id,
            task_id = row.task_id,
            "Notification received"
        );
        Ok(Receipt {
            notification_id,
            created: true,
        })
    }

    /// Claim `key` for a freshly allocated id, or return the id already
    /// recorded under it.
    ///
    /// A lost `set_if_absent` race normally leaves the winner's record behind.
    /// If the winner failed to persist and released the key in between, the
    /// claim is retried with the id already allocated.
    async fn claim(&self, key: &str) -> Result<Claim> {
        let mut allocated = None;
        for _ in 0..CLAIM_ATTEMPTS {
            if let Some(existing) = self.store.get(key).await? {
                if let Some(discarded_id) = allocated {
                    debug!(discarded_id, "Concurrent duplicate webhook delivery");
                }
                return Ok(Claim::Existing(parse_id(&existing)?));
            }

            let id = match allocated {
                Some(id) => id,
                None => self.store.increment(NOTIFICATION_ID_COUNTER).await?,
            };
            if self
                .store
                .set_if_absent(key, &id.to_string(), Some(self.config.idempotency_ttl))
                .await?
            {
                return Ok(Claim::Won(id));
            }
            allocated = Some(id);
        }

        Err(Error::Other(format!(
            "idempotency record '{key}' kept changing under concurrent deliveries"
        )))
    }
}

enum Claim {
    /// This delivery owns the key with the given id.
    Won(i64),
    /// Another delivery already recorded this id.
    Existing(i64),
}

/// `idempotency:{sha256("userId:taskId:timestamp")}`
pub fn idempotency_key(payload: &WebhookPayload) -> String {
    let digest = Sha256::digest(format!(
        "{}:{}:{}",
        payload.user_id, payload.task_id, payload.timestamp
    ));
    format!("{IDEMPOTENCY_PREFIX}{}", hex::encode(digest))
}

fn parse_id(raw: &str) -> Result<i64> {
    raw.parse()
        .map_err(|_| Error::Other(format!("corrupt idempotency record '{raw}'")))
}

/// Validate the webhook body field by field, collecting every problem.
fn parse_payload(body: &[u8]) -> Result<WebhookPayload> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        Error::malformed(
            "Request body is not valid JSON",
            vec![FieldError::new("body", e.to_string())],
        )
    })?;
    let Value::Object(fields) = value else {
        return Err(Error::malformed(
            "Invalid request payload",
            vec![FieldError::new("body", "body must be a JSON object")],
        ));
    };

    let mut details = Vec::new();
    let user_id = positive_id(&fields, "userId", &mut details);
    let task_id = positive_id(&fields, "taskId", &mut details);

    let message = match fields.get("message") {
        None | Some(Value::Null) => {
            details.push(FieldError::new("message", "message is required"));
            None
        }
        Some(Value::String(s)) if s.is_empty() => {
            details.push(FieldError::new("message", "message cannot be empty"));
            None
        }
        Some(Value::String(s)) if s.chars().count() > MAX_MESSAGE_CHARS => {
            details.push(FieldError::new(
                "message",
                format!("message cannot exceed {MAX_MESSAGE_CHARS} characters"),
            ));
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            details.push(FieldError::new("message", "message must be a string"));
            None
        }
    };

    let timestamp = match fields.get("timestamp") {
        None | Some(Value::Null) => {
            details.push(FieldError::new("timestamp", "timestamp is required"));
            None
        }
        Some(Value::String(s)) if chrono::DateTime::parse_from_rfc3339(s).is_ok() => {
            Some(s.clone())
        }
        Some(Value::String(_)) => {
            details.push(FieldError::new(
                "timestamp",
                "timestamp must be a valid ISO 8601 date",
            ));
            None
        }
        Some(_) => {
            details.push(FieldError::new("timestamp", "timestamp must be a string"));
            None
        }
    };

    match (user_id, task_id, message, timestamp) {
        (Some(user_id), Some(task_id), Some(message), Some(timestamp)) => Ok(WebhookPayload {
            user_id,
            task_id,
            message,
            timestamp,
        }),
        _ => Err(Error::malformed("Invalid request payload", details)),
    }
}

fn positive_id(
    fields: &Map<String, Value>,
    name: &str,
    details: &mut Vec<FieldError>,
) -> Option<i64> {
    match fields.get(name) {
        None | Some(Value::Null) => {
            details.push(FieldError::new(name, format!("{name} is required")));
            None
        }
        Some(Value::Number(n)) => match n.as_i64() {
            Some(id) if id > 0 => Some(id),
            Some(_) => {
                details.push(FieldError::new(name, format!("{name} must be positive")));
                None
            }
            None => {
                details.push(FieldError::new(name, format!("{name} must be an integer")));
                None
            }
        },
        Some(_) => {
            details.push(FieldError::new(name, format!("{name} must be a number")));
            None
        }
    }
}
