//! # topup-stripe
//!
//! Stripe implementation of the `PaymentGateway` trait.
//!
//! Wraps the Checkout Sessions REST API for session creation and performs
//! webhook signature verification (HMAC-SHA256 over `t.payload`, with
//! timestamp tolerance and constant-time comparison).
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use topup_stripe::StripeGateway;
//! use topup_core::PaymentGateway;
//!
//! let gateway = StripeGateway::from_env()?;
//! let session = gateway.create_session(&request).await?;
//! // Redirect user to session.redirect_url
//! ```

pub mod config;
pub mod gateway;

// Re-exports
pub use config::StripeConfig;
pub use gateway::StripeGateway;
