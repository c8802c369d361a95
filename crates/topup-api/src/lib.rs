//! # topup-api
//!
//! HTTP API layer for the wallet top-up engine.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - REST endpoints for top-ups, wallets, and price lookups
//! - Webhook handler for payment provider events
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | POST | `/payments/create-session` | Start a top-up (checkout redirect) |
//! | POST | `/payments/webhook` | Payment provider webhook |
//! | GET | `/payments/topup/:id` | Top-up status |
//! | GET | `/payments/user/:id` | User's top-up history |
//! | POST | `/wallets` | Create a wallet |
//! | GET | `/wallets/:id` | Wallet balance |
//! | GET | `/wallets/:id/ledger` | Wallet ledger entries |
//! | GET | `/prices/:base/:quote` | Exchange rate lookup |

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{AppConfig, AppState};
