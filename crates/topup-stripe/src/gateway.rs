//! # Stripe Gateway
//!
//! Stripe Checkout Sessions implementation of `PaymentGateway`.
//! Creates hosted checkout sessions for top-ups and verifies inbound
//! webhook signatures.

use crate::config::StripeConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use topup_core::{
    GatewayEvent, GatewayEventKind, GatewaySession, PaymentGateway, SessionRequest, TopupError,
    TopupResult,
};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

/// Maximum age of a webhook signature timestamp (seconds)
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Stripe Checkout Session gateway
///
/// Uses Stripe's hosted checkout page; the Topup id rides along as
/// `client_reference_id` and `metadata[topup_id]` so completion events can
/// be correlated back to the originating top-up.
pub struct StripeGateway {
    config: StripeConfig,
    client: Client,
}

impl StripeGateway {
    /// Create a new Stripe gateway
    pub fn new(config: StripeConfig) -> TopupResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| TopupError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> TopupResult<Self> {
        let config = StripeConfig::from_env()?;
        Self::new(config)
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self, request), fields(topup_id = %request.correlation_id))]
    async fn create_session(&self, request: &SessionRequest) -> TopupResult<GatewaySession> {
        let unit_amount = request.currency.to_minor_units(request.amount)?;

        debug!(
            "Creating Stripe checkout session: amount={} {}",
            unit_amount,
            request.currency.as_str()
        );

        let topup_id = request.correlation_id.to_string();
        let form_params: Vec<(&str, String)> = vec![
            ("mode", "payment".to_string()),
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
            ("client_reference_id", topup_id.clone()),
            ("metadata[topup_id]", topup_id.clone()),
            (
                "line_items[0][price_data][currency]",
                request.currency.as_str().to_string(),
            ),
            (
                "line_items[0][price_data][unit_amount]",
                unit_amount.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                "Wallet top-up".to_string(),
            ),
            ("line_items[0][quantity]", "1".to_string()),
        ];

        let url = format!("{}/v1/checkout/sessions", self.config.api_base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .header("Idempotency-Key", &topup_id)
            .form(&form_params)
            .send()
            .await
            .map_err(|e| TopupError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TopupError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            error!("Stripe API error: status={}, body={}", status, body);

            // Parse Stripe error
            if let Ok(error_response) = serde_json::from_str::<StripeErrorResponse>(&body) {
                return Err(TopupError::GatewayError {
                    provider: "stripe".to_string(),
                    message: error_response.error.message,
                });
            }

            return Err(TopupError::GatewayError {
                provider: "stripe".to_string(),
                message: format!("HTTP {}: {}", status, body),
            });
        }

        let session: StripeCheckoutSessionResponse =
            serde_json::from_str(&body).map_err(|e| {
                TopupError::Serialization(format!("Failed to parse Stripe response: {}", e))
            })?;

        info!(
            "Created Stripe checkout session: id={}, url={}",
            session.id, session.url
        );

        let expires_at = session
            .expires_at
            .and_then(|ts| DateTime::from_timestamp(ts, 0));

        Ok(GatewaySession {
            session_id: session.id,
            redirect_url: session.url,
            provider: "stripe".to_string(),
            expires_at,
        })
    }

    #[instrument(skip(self, payload, signature))]
    fn verify_event(&self, payload: &[u8], signature: &str) -> TopupResult<GatewayEvent> {
        // Parse signature header
        let sig_parts = parse_signature_header(signature)?;

        // Verify timestamp is within tolerance
        let now = Utc::now().timestamp();
        if (now - sig_parts.timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
            return Err(TopupError::VerificationFailed(
                "Timestamp outside tolerance".to_string(),
            ));
        }

        // Compute expected signature
        let signed_payload = format!(
            "{}.{}",
            sig_parts.timestamp,
            String::from_utf8_lossy(payload)
        );
        let expected_sig = compute_hmac_sha256(&self.config.webhook_secret, &signed_payload);

        // Compare signatures (constant-time)
        let valid = sig_parts
            .signatures
            .iter()
            .any(|sig| constant_time_compare(sig, &expected_sig));

        if !valid {
            return Err(TopupError::VerificationFailed(
                "Signature mismatch".to_string(),
            ));
        }

        // Parse the event
        let event: StripeWebhookEvent = serde_json::from_slice(payload).map_err(|e| {
            TopupError::WebhookParse(format!("Failed to parse webhook: {}", e))
        })?;

        debug!("Verified Stripe webhook: type={}", event.event_type);

        let kind = match event.event_type.as_str() {
            "checkout.session.completed" => GatewayEventKind::SessionCompleted,
            "checkout.session.expired" => GatewayEventKind::SessionExpired,
            other => GatewayEventKind::Unknown(other.to_string()),
        };

        // Correlation id lives in session metadata; fall back to
        // client_reference_id for sessions created outside this service.
        let correlation_id = event
            .data
            .object
            .get("metadata")
            .and_then(|m| m.get("topup_id"))
            .and_then(|v| v.as_str())
            .or_else(|| {
                event
                    .data
                    .object
                    .get("client_reference_id")
                    .and_then(|v| v.as_str())
            })
            .and_then(|s| Uuid::parse_str(s).ok());

        let provider_ref = event
            .data
            .object
            .get("payment_intent")
            .and_then(|v| v.as_str())
            .map(String::from);

        Ok(GatewayEvent {
            event_id: event.id,
            kind,
            provider: "stripe".to_string(),
            correlation_id,
            provider_ref,
            timestamp: DateTime::from_timestamp(event.created, 0).unwrap_or_else(Utc::now),
        })
    }

    fn provider_name(&self) -> &'static str {
        "stripe"
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeCheckoutSessionResponse {
    id: String,
    url: String,
    #[serde(default)]
    expires_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct StripeWebhookEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    created: i64,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Map<String, serde_json::Value>,
}

// =============================================================================
// Webhook Signature Verification
// =============================================================================

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

fn parse_signature_header(header: &str) -> TopupResult<SignatureHeader> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let kv: Vec<&str> = part.split('=').collect();
        if kv.len() != 2 {
            continue;
        }
        match kv[0] {
            "t" => {
                timestamp = kv[1].parse().ok();
            }
            "v1" => {
                signatures.push(kv[1].to_string());
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        TopupError::VerificationFailed("Missing timestamp in signature".to_string())
    })?;

    if signatures.is_empty() {
        return Err(TopupError::VerificationFailed(
            "No v1 signature found".to_string(),
        ));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

fn compute_hmac_sha256(secret: &str, message: &str) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    let result = mac.finalize();
    hex::encode(result.into_bytes())
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_gateway() -> StripeGateway {
        let config = StripeConfig::new("sk_test_abc", "whsec_test_secret");
        StripeGateway::new(config).unwrap()
    }

    /// Sign a payload the way Stripe does (t=...,v1=...)
    fn sign(secret: &str, timestamp: i64, payload: &str) -> String {
        let sig = compute_hmac_sha256(secret, &format!("{}.{}", timestamp, payload));
        format!("t={},v1={}", timestamp, sig)
    }

    #[test]
    fn test_parse_signature_header() {
        let header = "t=1234567890,v1=abc123,v1=def456";
        let parsed = parse_signature_header(header).unwrap();

        assert_eq!(parsed.timestamp, 1234567890);
        assert_eq!(parsed.signatures.len(), 2);
        assert_eq!(parsed.signatures[0], "abc123");
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc123", "abc123"));
        assert!(!constant_time_compare("abc123", "abc124"));
        assert!(!constant_time_compare("abc", "abcd"));
    }

    #[test]
    fn test_verify_event_valid_signature() {
        let gateway = test_gateway();
        let topup_id = Uuid::new_v4();
        let payload = json!({
            "id": "evt_test_1",
            "type": "checkout.session.completed",
            "created": Utc::now().timestamp(),
            "data": {
                "object": {
                    "id": "cs_test_123",
                    "payment_intent": "pi_123",
                    "client_reference_id": topup_id.to_string(),
                    "metadata": { "topup_id": topup_id.to_string() }
                }
            }
        })
        .to_string();

        let header = sign("whsec_test_secret", Utc::now().timestamp(), &payload);
        let event = gateway.verify_event(payload.as_bytes(), &header).unwrap();

        assert_eq!(event.kind, GatewayEventKind::SessionCompleted);
        assert_eq!(event.correlation_id, Some(topup_id));
        assert_eq!(event.provider_ref, Some("pi_123".to_string()));
    }

    #[test]
    fn test_verify_event_tampered_payload() {
        let gateway = test_gateway();
        let payload = r#"{"id":"evt_1","type":"checkout.session.completed","created":0,"data":{"object":{}}}"#;
        let header = sign("whsec_test_secret", Utc::now().timestamp(), payload);

        let tampered = payload.replace("evt_1", "evt_2");
        let result = gateway.verify_event(tampered.as_bytes(), &header);
        assert!(matches!(result, Err(TopupError::VerificationFailed(_))));
    }

    #[test]
    fn test_verify_event_wrong_secret() {
        let gateway = test_gateway();
        let payload = r#"{"id":"evt_1","type":"checkout.session.completed","created":0,"data":{"object":{}}}"#;
        let header = sign("whsec_other_secret", Utc::now().timestamp(), payload);

        let result = gateway.verify_event(payload.as_bytes(), &header);
        assert!(matches!(result, Err(TopupError::VerificationFailed(_))));
    }

    #[test]
    fn test_verify_event_stale_timestamp() {
        let gateway = test_gateway();
        let payload = r#"{"id":"evt_1","type":"checkout.session.completed","created":0,"data":{"object":{}}}"#;
        let stale = Utc::now().timestamp() - SIGNATURE_TOLERANCE_SECS - 60;
        let header = sign("whsec_test_secret", stale, payload);

        let result = gateway.verify_event(payload.as_bytes(), &header);
        assert!(matches!(result, Err(TopupError::VerificationFailed(_))));
    }

    #[test]
    fn test_verify_event_unknown_kind_passes_through() {
        let gateway = test_gateway();
        let payload = json!({
            "id": "evt_x",
            "type": "invoice.paid",
            "created": Utc::now().timestamp(),
            "data": { "object": {} }
        })
        .to_string();

        let header = sign("whsec_test_secret", Utc::now().timestamp(), &payload);
        let event = gateway.verify_event(payload.as_bytes(), &header).unwrap();

        assert_eq!(
            event.kind,
            GatewayEventKind::Unknown("invoice.paid".to_string())
        );
        assert_eq!(event.correlation_id, None);
    }

    #[test]
    fn test_verify_event_expired_kind() {
        let gateway = test_gateway();
        let payload = json!({
            "id": "evt_x",
            "type": "checkout.session.expired",
            "created": Utc::now().timestamp(),
            "data": { "object": { "id": "cs_x" } }
        })
        .to_string();

        let header = sign("whsec_test_secret", Utc::now().timestamp(), &payload);
        let event = gateway.verify_event(payload.as_bytes(), &header).unwrap();

        assert_eq!(event.kind, GatewayEventKind::SessionExpired);
    }
}
