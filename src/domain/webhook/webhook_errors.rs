//! Webhook error types for Stripe webhook handling.
//!
//! Every failure during verification maps to a 400 with no state mutation.
//! Every failure after the event has been recorded maps to a 500 so that
//! Stripe redelivers it.

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::foundation::DomainError;

/// Errors that occur during webhook processing.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// No `Stripe-Signature` header on the request.
    #[error("Missing signature header")]
    MissingSignature,

    /// Webhook signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Signed timestamp is older than the configured tolerance.
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Signed timestamp is in the future beyond clock skew tolerance.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    /// Failed to parse the signature header or the JSON payload.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// `data.object` did not have the shape its event type requires.
    #[error("Invalid {event_type} object: {reason}")]
    InvalidObject { event_type: String, reason: String },

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),
}

impl WebhookError {
    /// Returns true if the request must be rejected as untrusted.
    ///
    /// These errors are raised before the event store is touched.
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            WebhookError::MissingSignature
                | WebhookError::InvalidSignature
                | WebhookError::TimestampOutOfRange
                | WebhookError::InvalidTimestamp
                | WebhookError::ParseError(_)
        )
    }

    /// Returns true if Stripe should retry delivering this webhook.
    pub fn is_retryable(&self) -> bool {
        !self.is_verification_failure()
    }

    /// Maps the error to an appropriate HTTP status code.
    ///
    /// - 4xx: untrusted input, Stripe does not retry
    /// - 5xx: event recorded but not processed, Stripe retries
    pub fn status_code(&self) -> StatusCode {
        if self.is_verification_failure() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Converts DomainError to WebhookError for repository operations.
impl From<DomainError> for WebhookError {
    fn from(err: DomainError) -> Self {
        WebhookError::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ErrorCode;

    fn verification_errors() -> Vec<WebhookError> {
        vec![
            WebhookError::MissingSignature,
            WebhookError::InvalidSignature,
            WebhookError::TimestampOutOfRange,
            WebhookError::InvalidTimestamp,
            WebhookError::ParseError("bad json".to_string()),
        ]
    }

    fn processing_errors() -> Vec<WebhookError> {
        vec![
            WebhookError::InvalidObject {
                event_type: "invoice.payment_succeeded".to_string(),
                reason: "missing field `customer`".to_string(),
            },
            WebhookError::Database("connection lost".to_string()),
        ]
    }

    #[test]
    fn invalid_signature_displays_correctly() {
        assert_eq!(WebhookError::InvalidSignature.to_string(), "Invalid signature");
    }

    #[test]
    fn invalid_object_names_event_type() {
        let err = WebhookError::InvalidObject {
            event_type: "invoice.payment_failed".to_string(),
            reason: "missing field `id`".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid invoice.payment_failed object: missing field `id`"
        );
    }

    #[test]
    fn verification_failures_are_bad_requests_and_not_retryable() {
        for err in verification_errors() {
            assert!(err.is_verification_failure(), "{:?}", err);
            assert!(!err.is_retryable(), "{:?}", err);
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST, "{:?}", err);
        }
    }

    #[test]
    fn processing_failures_are_server_errors_and_retryable() {
        for err in processing_errors() {
            assert!(!err.is_verification_failure(), "{:?}", err);
            assert!(err.is_retryable(), "{:?}", err);
            assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR, "{:?}", err);
        }
    }

    #[test]
    fn domain_error_becomes_database_error() {
        let err: WebhookError = DomainError::new(ErrorCode::DatabaseError, "timeout").into();
        assert!(matches!(err, WebhookError::Database(msg) if msg.contains("timeout")));
    }
}
