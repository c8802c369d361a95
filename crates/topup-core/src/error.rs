//! # Top-up Error Types
//!
//! Typed error handling for the top-up engine.
//! All fallible operations return `Result<T, TopupError>`.

use thiserror::Error;

/// Core error type for all top-up operations
#[derive(Debug, Error)]
pub enum TopupError {
    /// Configuration errors (missing credentials, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid request data (non-positive amount, missing ids)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Record lookup failed (topup or wallet missing)
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Completion or failure attempted on a topup outside the expected state
    #[error("Topup {topup_id} is in state '{status}', operation not allowed")]
    InvalidState { topup_id: String, status: String },

    /// Currency not supported
    #[error("Unsupported currency: {currency}")]
    UnsupportedCurrency { currency: String },

    /// Payment provider API error
    #[error("Gateway error [{provider}]: {message}")]
    GatewayError { provider: String, message: String },

    /// Network/HTTP error communicating with an external collaborator
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Webhook signature verification failed
    #[error("Webhook verification failed: {0}")]
    VerificationFailed(String),

    /// Webhook payload parsing error
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Relational store error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TopupError {
    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TopupError::NetworkError(_)
                | TopupError::GatewayError { .. }
                | TopupError::Storage(_)
        )
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            TopupError::Configuration(_) => 500,
            TopupError::InvalidRequest(_) => 400,
            TopupError::NotFound { .. } => 404,
            TopupError::InvalidState { .. } => 409,
            TopupError::UnsupportedCurrency { .. } => 400,
            TopupError::GatewayError { .. } => 502,
            TopupError::NetworkError(_) => 503,
            TopupError::VerificationFailed(_) => 401,
            TopupError::WebhookParse(_) => 400,
            TopupError::Storage(_) => 500,
            TopupError::Serialization(_) => 500,
            TopupError::Internal(_) => 500,
        }
    }

    /// Stable classification string for API error envelopes
    pub fn kind(&self) -> &'static str {
        match self {
            TopupError::Configuration(_) => "configuration",
            TopupError::InvalidRequest(_) => "invalid_request",
            TopupError::NotFound { .. } => "not_found",
            TopupError::InvalidState { .. } => "invalid_state",
            TopupError::UnsupportedCurrency { .. } => "unsupported_currency",
            TopupError::GatewayError { .. } => "gateway_error",
            TopupError::NetworkError(_) => "network_error",
            TopupError::VerificationFailed(_) => "verification_failed",
            TopupError::WebhookParse(_) => "webhook_parse",
            TopupError::Storage(_) => "storage",
            TopupError::Serialization(_) => "serialization",
            TopupError::Internal(_) => "internal",
        }
    }
}

/// Result type alias for top-up operations
pub type TopupResult<T> = Result<T, TopupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(TopupError::NetworkError("timeout".into()).is_retryable());
        assert!(TopupError::GatewayError {
            provider: "stripe".into(),
            message: "503".into()
        }
        .is_retryable());
        assert!(!TopupError::InvalidRequest("bad data".into()).is_retryable());
        assert!(!TopupError::VerificationFailed("bad sig".into()).is_retryable());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            TopupError::InvalidRequest("test".into()).status_code(),
            400
        );
        assert_eq!(
            TopupError::NotFound {
                entity: "topup",
                id: "x".into()
            }
            .status_code(),
            404
        );
        assert_eq!(
            TopupError::InvalidState {
                topup_id: "x".into(),
                status: "completed".into()
            }
            .status_code(),
            409
        );
        assert_eq!(
            TopupError::VerificationFailed("mismatch".into()).status_code(),
            401
        );
    }

    #[test]
    fn test_error_kinds_are_stable() {
        assert_eq!(
            TopupError::VerificationFailed("x".into()).kind(),
            "verification_failed"
        );
        assert_eq!(
            TopupError::InvalidState {
                topup_id: "t".into(),
                status: "failed".into()
            }
            .kind(),
            "invalid_state"
        );
    }
}
