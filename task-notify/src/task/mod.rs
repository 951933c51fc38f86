//! Task API domain: task records and the completion flow that emits webhooks.

pub mod service;

pub use service::{Completion, Task, TaskService};
