//! # topup-core
//!
//! Core types and traits for the wallet top-up engine.
//!
//! This crate provides:
//! - `PaymentGateway` trait for implementing payment providers
//! - `GatewaySession` and `GatewayEvent` for the checkout/webhook flow
//! - `Currency` with minor-unit conversion for provider boundaries
//! - `TopupError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use topup_core::{Currency, PaymentGateway, SessionRequest};
//! use rust_decimal_macros::dec;
//! use uuid::Uuid;
//!
//! let request = SessionRequest {
//!     correlation_id: Uuid::new_v4(),
//!     amount: dec!(50.00),
//!     currency: Currency::USD,
//!     success_url: "https://example.com/success".into(),
//!     cancel_url: "https://example.com/cancel".into(),
//! };
//!
//! let session = gateway.create_session(&request).await?;
//! // Redirect user to session.redirect_url
//! ```

pub mod currency;
pub mod error;
pub mod gateway;

// Re-exports for convenience
pub use currency::Currency;
pub use error::{TopupError, TopupResult};
pub use gateway::{
    BoxedPaymentGateway, CallbackUrls, GatewayEvent, GatewayEventKind, GatewaySession,
    PaymentGateway, SessionRequest,
};
