//! # Routes
//!
//! Axum router configuration for the top-up API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - Payments:
///   - POST /payments/create-session - Start a top-up, returns the checkout redirect
///   - POST /payments/webhook - Provider webhook handler (raw body)
///   - GET  /payments/topup/{topup_id} - Top-up status
///   - GET  /payments/user/{user_id} - User's top-up history
///   - GET  /payments/success - Post-checkout landing page
///   - GET  /payments/cancel - Cancelled-checkout landing page
///
/// - Wallets:
///   - POST /wallets - Create a wallet
///   - GET  /wallets/{wallet_id} - Wallet balance
///   - GET  /wallets/{wallet_id}/ledger - Wallet ledger entries
///
/// - Prices:
///   - GET  /prices/{base}/{quote} - Exchange rate lookup
pub fn create_router(state: AppState) -> Router {
    // CORS configuration - allow all origins for now
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let payment_routes = Router::new()
        .route("/create-session", post(handlers::create_session))
        // Webhook must receive the raw body for signature verification
        .route("/webhook", post(handlers::webhook))
        .route("/topup/{topup_id}", get(handlers::get_topup))
        .route("/user/{user_id}", get(handlers::user_history))
        // Checkout redirect targets
        .route("/success", get(handlers::payment_success))
        .route("/cancel", get(handlers::payment_cancel));

    let wallet_routes = Router::new()
        .route("/", post(handlers::create_wallet))
        .route("/{wallet_id}", get(handlers::get_wallet))
        .route("/{wallet_id}/ledger", get(handlers::wallet_ledger));

    Router::new()
        // Health check at root
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        // Payments
        .nest("/payments", payment_routes)
        // Wallets
        .nest("/wallets", wallet_routes)
        // Prices
        .route("/prices/{base}/{quote}", get(handlers::price_lookup))
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        // State
        .with_state(state)
}
