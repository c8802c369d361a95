//! # topup-ledger
//!
//! The core of the top-up engine: relational models, migrations, and the
//! `TopupOrchestrator` state machine.
//!
//! The store is the single shared mutable resource. Each operation runs in
//! its own transaction; wallet credits hold a `SELECT ... FOR UPDATE` row
//! lock for the whole read-modify-write, and completion uses a
//! state-filtered update so racing or duplicate webhook deliveries settle
//! a topup exactly once.

pub mod models;
pub mod orchestrator;

// Re-exports for convenience
pub use models::{LedgerEntry, Topup, TopupStatus, Wallet, WalletTransaction};
pub use orchestrator::{ReconcileOutcome, TopupOrchestrator};

use sqlx::PgPool;

/// Apply embedded schema migrations. Called once at startup.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!().run(pool).await
}
