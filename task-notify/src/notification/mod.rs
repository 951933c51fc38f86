//! Notification service domain.
//!
//! Signed webhooks enter through the [`IdempotentReceiver`], which verifies the
//! signature, collapses replays of the same event and stores one notification
//! per event. Users read and manage their notifications through the
//! [`NotificationInbox`], which enforces ownership.
//!
//! # Example
//!
//! ```ignore
//! let receiver = IdempotentReceiver::new(store, repo.clone(), clock, ReceiverConfig::new(secret));
//! let receipt = receiver.receive(Some(signature), &body).await?;
//! let page = NotificationInbox::new(repo).list(user_id, &ListQuery::default()).await?;
//! ```

pub mod inbox;
pub mod model;
pub mod receiver;

pub use inbox::{ListQuery, NotificationInbox};
pub use model::{Notification, NotificationPage};
pub use receiver::{IdempotentReceiver, Receipt, ReceiverConfig};
