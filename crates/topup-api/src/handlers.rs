//! # Request Handlers
//!
//! Axum request handlers for the top-up API. Every non-webhook response is
//! wrapped in the `{success, data|error}` envelope.

use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use topup_core::{Currency, TopupError};
use topup_ledger::{ReconcileOutcome, Topup};
use tracing::{error, info, instrument};
use uuid::Uuid;

// =============================================================================
// Response Envelope
// =============================================================================

/// Standard success envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

/// Standard error envelope
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub success: bool,
    pub error: ApiError,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    /// Stable classification (e.g., "not_found", "verification_failed")
    pub kind: &'static str,
    pub message: String,
}

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
    })
}

fn err(e: TopupError) -> (StatusCode, Json<ApiErrorResponse>) {
    let status =
        StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ApiErrorResponse {
            success: false,
            error: ApiError {
                kind: e.kind(),
                message: e.to_string(),
            },
        }),
    )
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiErrorResponse>)>;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Create top-up session request
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub user_id: Uuid,
    pub wallet_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
}

/// Create top-up session response
#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub topup_id: Uuid,
    pub session_id: String,
    /// Redirect the user here to pay
    pub redirect_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Deserialize)]
pub struct CreateWalletRequest {
    pub user_id: Uuid,
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "topup-engine",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Start a top-up: create the record and a provider checkout session
#[instrument(skip(state, request), fields(user_id = %request.user_id))]
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> ApiResult<CreateSessionResponse> {
    let currency: Currency = request.currency.parse().map_err(err)?;

    let (session, topup) = state
        .orchestrator
        .initiate(request.user_id, request.wallet_id, request.amount, currency)
        .await
        .map_err(|e| {
            error!("Failed to initiate top-up: {}", e);
            err(e)
        })?;

    Ok(ok(CreateSessionResponse {
        topup_id: topup.id,
        session_id: session.session_id,
        redirect_url: session.redirect_url,
        expires_at: session.expires_at.map(|t| t.to_rfc3339()),
    }))
}

/// Handle a provider webhook (raw body + signature header).
///
/// Absorbed outcomes (duplicates, unknown events) still return 200 so the
/// provider stops retrying; verification failures return 401 with no state
/// mutated.
#[instrument(skip(state, headers, body))]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, (StatusCode, Json<ApiErrorResponse>)> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            err(TopupError::VerificationFailed(
                "Missing stripe-signature header".to_string(),
            ))
        })?;

    let outcome = state
        .orchestrator
        .reconcile(&body, signature)
        .await
        .map_err(|e| {
            error!("Webhook reconciliation failed: {}", e);
            err(e)
        })?;

    match outcome {
        ReconcileOutcome::Completed(topup) => {
            info!(topup_id = %topup.id, "Webhook settled top-up");
        }
        ReconcileOutcome::Failed(topup) => {
            info!(topup_id = %topup.id, "Webhook failed top-up");
        }
        ReconcileOutcome::AlreadySettled { topup_id, status } => {
            info!(topup_id = %topup_id, status = %status, "Webhook duplicate absorbed");
        }
        ReconcileOutcome::Ignored { event_type } => {
            info!(event_type = %event_type, "Webhook event ignored");
        }
    }

    Ok(StatusCode::OK)
}

/// Read a single top-up
pub async fn get_topup(
    State(state): State<AppState>,
    Path(topup_id): Path<Uuid>,
) -> ApiResult<Topup> {
    let topup = state.orchestrator.status(topup_id).await.map_err(err)?;
    Ok(ok(topup))
}

/// A user's top-up history, newest first
pub async fn user_history(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Vec<Topup>> {
    let topups = state
        .orchestrator
        .history(user_id, params.limit, params.offset)
        .await
        .map_err(err)?;
    Ok(ok(topups))
}

/// Create a wallet for a user
pub async fn create_wallet(
    State(state): State<AppState>,
    Json(request): Json<CreateWalletRequest>,
) -> ApiResult<topup_ledger::Wallet> {
    let wallet = state
        .orchestrator
        .create_wallet(request.user_id)
        .await
        .map_err(err)?;
    Ok(ok(wallet))
}

/// Read a wallet's current balance
pub async fn get_wallet(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
) -> ApiResult<topup_ledger::Wallet> {
    let wallet = state.orchestrator.wallet(wallet_id).await.map_err(err)?;
    Ok(ok(wallet))
}

/// A wallet's ledger entries, oldest first
pub async fn wallet_ledger(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
) -> ApiResult<Vec<topup_ledger::LedgerEntry>> {
    let entries = state.orchestrator.ledger(wallet_id).await.map_err(err)?;
    Ok(ok(entries))
}

/// Exchange rate lookup (direct, inverse, or unavailable)
pub async fn price_lookup(
    State(state): State<AppState>,
    Path((base, quote)): Path<(String, String)>,
) -> ApiResult<topup_prices::RateLookup> {
    let lookup = state.prices.lookup(&base, &quote).await.map_err(err)?;
    Ok(ok(lookup))
}

/// Post-checkout landing page; the provider appends the session id
pub async fn payment_success(
    Query(params): Query<std::collections::HashMap<String, String>>,
) -> impl IntoResponse {
    let session_id = params
        .get("session_id")
        .map(|s| s.as_str())
        .unwrap_or("unknown");
    axum::response::Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Payment Successful</title></head>
<body style="font-family: system-ui; text-align: center; padding-top: 80px;">
    <h1>Payment received</h1>
    <p>Session: <code>{}</code></p>
    <p>Your wallet will be credited once the payment is confirmed.</p>
</body>
</html>
"#,
        session_id
    ))
}

/// Cancelled-checkout landing page
pub async fn payment_cancel() -> impl IntoResponse {
    axum::response::Html(
        r#"<!DOCTYPE html>
<html>
<head><title>Payment Cancelled</title></head>
<body style="font-family: system-ui; text-align: center; padding-top: 80px;">
    <h1>Payment cancelled</h1>
    <p>No charge was made. You can start a new top-up at any time.</p>
</body>
</html>
"#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_envelope_maps_status() {
        let (status, Json(body)) = err(TopupError::NotFound {
            entity: "topup",
            id: "x".into(),
        });
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(!body.success);
        assert_eq!(body.error.kind, "not_found");
    }

    #[test]
    fn test_verification_failure_is_401() {
        let (status, _) = err(TopupError::VerificationFailed("sig".into()));
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_success_envelope_shape() {
        let Json(body) = ok(serde_json::json!({"x": 1}));
        assert!(body.success);
        let serialized = serde_json::to_value(&body).unwrap();
        assert_eq!(serialized["data"]["x"], 1);
    }
}
