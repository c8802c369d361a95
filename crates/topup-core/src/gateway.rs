//! # Payment Gateway Trait
//!
//! Provider seam for external checkout sessions and webhook verification.
//! Implementations: Stripe (see `topup-stripe`).
//!
//! The gateway is the only component allowed to talk to the payment
//! provider; the orchestrator depends on this trait so providers can be
//! swapped without touching the state machine.

use crate::currency::Currency;
use crate::error::TopupResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Request for a new hosted checkout session.
///
/// `correlation_id` is the Topup id; the provider must echo it back in
/// webhook events so the inbound event can be linked to the outbound
/// session.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub correlation_id: Uuid,
    pub amount: Decimal,
    pub currency: Currency,
    pub success_url: String,
    pub cancel_url: String,
}

/// A checkout session handle returned by a payment provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySession {
    /// Provider's session ID
    pub session_id: String,

    /// URL to redirect the user to for payment
    pub redirect_url: String,

    /// Provider name (e.g., "stripe")
    pub provider: String,

    /// When the session expires, if the provider reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Webhook event kinds the orchestrator reacts to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayEventKind {
    /// Checkout session completed: the payment went through
    SessionCompleted,
    /// Checkout session expired or was cancelled by the user
    SessionExpired,
    /// Anything else; acknowledged without state mutation
    Unknown(String),
}

/// A verified, parsed webhook event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayEvent {
    /// Event ID from the provider
    pub event_id: String,

    /// Event kind
    pub kind: GatewayEventKind,

    /// Provider name
    pub provider: String,

    /// Correlated Topup id, echoed back from session metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,

    /// Provider's payment reference (e.g., a payment intent id)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_ref: Option<String>,

    /// Provider-reported event time
    pub timestamp: DateTime<Utc>,
}

/// Core trait for payment provider implementations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted checkout session for a top-up.
    ///
    /// The implementation must tag the session with
    /// `request.correlation_id` so the provider echoes it back in webhook
    /// events.
    async fn create_session(&self, request: &SessionRequest) -> TopupResult<GatewaySession>;

    /// Verify a webhook signature against the shared secret and parse the
    /// event.
    ///
    /// Returns `VerificationFailed` on any signature mismatch, stale
    /// timestamp, or malformed signature header; the caller must not mutate
    /// state in that case.
    fn verify_event(&self, payload: &[u8], signature: &str) -> TopupResult<GatewayEvent>;

    /// Provider name (for logging and the Topup record)
    fn provider_name(&self) -> &'static str;
}

/// Type alias for a shared gateway (dynamic dispatch)
pub type BoxedPaymentGateway = Arc<dyn PaymentGateway>;

/// Redirect URLs used when creating checkout sessions
#[derive(Debug, Clone)]
pub struct CallbackUrls {
    /// Base URL of the application (e.g., "https://pay.example.com")
    pub base_url: String,
    /// Success page path
    pub success_path: String,
    /// Cancel page path
    pub cancel_path: String,
}

impl CallbackUrls {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            success_path: "/payments/success".to_string(),
            cancel_path: "/payments/cancel".to_string(),
        }
    }

    pub fn success_url(&self) -> String {
        format!("{}{}", self.base_url, self.success_path)
    }

    pub fn cancel_url(&self) -> String {
        format!("{}{}", self.base_url, self.cancel_path)
    }
}

impl Default for CallbackUrls {
    fn default() -> Self {
        Self::new("http://localhost:8080")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_urls() {
        let urls = CallbackUrls::new("https://pay.example.com");

        assert_eq!(urls.success_url(), "https://pay.example.com/payments/success");
        assert_eq!(urls.cancel_url(), "https://pay.example.com/payments/cancel");
    }
}
