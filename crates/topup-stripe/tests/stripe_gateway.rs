//! Integration tests for the Stripe gateway against a mocked REST API.

use rust_decimal_macros::dec;
use topup_core::{Currency, PaymentGateway, SessionRequest, TopupError};
use topup_stripe::{StripeConfig, StripeGateway};
use uuid::Uuid;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session_request() -> SessionRequest {
    SessionRequest {
        correlation_id: Uuid::new_v4(),
        amount: dec!(50.00),
        currency: Currency::USD,
        success_url: "https://example.com/success".to_string(),
        cancel_url: "https://example.com/cancel".to_string(),
    }
}

#[tokio::test]
async fn create_session_returns_redirect_handle() {
    let server = MockServer::start().await;
    let request = session_request();

    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .and(header("authorization", "Bearer sk_test_abc"))
        .and(header(
            "idempotency-key",
            request.correlation_id.to_string().as_str(),
        ))
        .and(body_string_contains("mode=payment"))
        .and(body_string_contains("unit_amount%5D=5000"))
        .and(body_string_contains(&format!(
            "topup_id%5D={}",
            request.correlation_id
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "cs_test_123",
            "url": "https://checkout.stripe.com/c/pay/cs_test_123",
            "expires_at": 1893456000
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = StripeConfig::new("sk_test_abc", "whsec_x").with_api_base_url(server.uri());
    let gateway = StripeGateway::new(config).unwrap();

    let session = gateway.create_session(&request).await.unwrap();

    assert_eq!(session.session_id, "cs_test_123");
    assert_eq!(
        session.redirect_url,
        "https://checkout.stripe.com/c/pay/cs_test_123"
    );
    assert_eq!(session.provider, "stripe");
    assert!(session.expires_at.is_some());
}

#[tokio::test]
async fn create_session_surfaces_provider_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .respond_with(ResponseTemplate::new(402).set_body_json(serde_json::json!({
            "error": { "message": "Your card was declined." }
        })))
        .mount(&server)
        .await;

    let config = StripeConfig::new("sk_test_abc", "whsec_x").with_api_base_url(server.uri());
    let gateway = StripeGateway::new(config).unwrap();

    let err = gateway.create_session(&session_request()).await.unwrap_err();
    match err {
        TopupError::GatewayError { provider, message } => {
            assert_eq!(provider, "stripe");
            assert_eq!(message, "Your card was declined.");
        }
        other => panic!("expected GatewayError, got {:?}", other),
    }
}

#[tokio::test]
async fn create_session_rejects_sub_unit_amount_before_calling_out() {
    // No mock mounted: the request must fail before any network call.
    let config =
        StripeConfig::new("sk_test_abc", "whsec_x").with_api_base_url("http://127.0.0.1:1");
    let gateway = StripeGateway::new(config).unwrap();

    let mut request = session_request();
    request.amount = dec!(10.999);

    let err = gateway.create_session(&request).await.unwrap_err();
    assert!(matches!(err, TopupError::InvalidRequest(_)));
}
