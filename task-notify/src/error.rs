//! Application-wide error types.

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, utoipa::ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid webhook signature")]
    SignatureInvalid,

    #[error("Malformed payload: {message}")]
    PayloadMalformed {
        message: String,
        details: Vec<FieldError>,
    },

    #[error("Circuit breaker is open for {service}")]
    CircuitOpen { service: String },

    #[error("Downstream failure{}: {message}", http_suffix(.status))]
    DownstreamFailure { status: Option<u16>, message: String },

    #[error("Delivery exhausted after {attempts} attempts: {last_error}")]
    DeliveryExhausted { attempts: u32, last_error: String },

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Access to {entity_type} {id} is forbidden")]
    Forbidden { entity_type: String, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    DatabaseSqlx(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

fn http_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl Error {
    pub fn not_found(entity_type: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    pub fn forbidden(entity_type: impl Into<String>, id: impl ToString) -> Self {
        Self::Forbidden {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    pub fn malformed(message: impl Into<String>, details: Vec<FieldError>) -> Self {
        Self::PayloadMalformed {
            message: message.into(),
            details,
        }
    }

    pub fn downstream(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::DownstreamFailure {
            status,
            message: message.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Whether the error means the breaker rejected the call without running it.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downstream_display() {
        let err = Error::downstream(Some(503), "unavailable");
        assert_eq!(err.to_string(), "Downstream failure (HTTP 503): unavailable");

        let err = Error::downstream(None, "connection refused");
        assert_eq!(err.to_string(), "Downstream failure: connection refused");
    }

    #[test]
    fn test_circuit_open_is_distinct() {
        let open = Error::CircuitOpen {
            service: "webhook-notify".to_string(),
        };
        assert!(open.is_circuit_open());
        assert!(!Error::downstream(Some(500), "boom").is_circuit_open());
    }
}
