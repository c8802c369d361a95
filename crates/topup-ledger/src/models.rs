//! # Ledger Models
//!
//! Row types for the relational store: wallets, topups, transactions, and
//! the append-only ledger entries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Top-up lifecycle states.
///
/// Transitions are one-directional: `pending -> processing -> completed`
/// or `pending -> processing -> failed`. Terminal states are never
/// revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "topup_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TopupStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TopupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopupStatus::Pending => "pending",
            TopupStatus::Processing => "processing",
            TopupStatus::Completed => "completed",
            TopupStatus::Failed => "failed",
        }
    }

    /// Terminal states can never be left
    pub fn is_terminal(&self) -> bool {
        matches!(self, TopupStatus::Completed | TopupStatus::Failed)
    }
}

impl std::fmt::Display for TopupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user wallet. The balance is mutated only by the orchestrator's credit
/// path, under a row-level lock.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A top-up record tracking one checkout flow end to end
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Topup {
    pub id: Uuid,
    pub user_id: Uuid,
    pub wallet_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub status: TopupStatus,
    /// Payment provider name (e.g., "stripe")
    pub provider: String,
    /// Provider's checkout session id, set once the session is created
    pub provider_session_id: Option<String>,
    /// Provider's payment reference, set on completion
    pub provider_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A wallet transaction. One `topup` transaction per completed top-up;
/// immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub kind: String,
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
    pub external_ref: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// An append-only audit record of a balance change, carrying the
/// before/after balance snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub topup_id: Uuid,
    pub transaction_id: Uuid,
    pub entry_type: String,
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!TopupStatus::Pending.is_terminal());
        assert!(!TopupStatus::Processing.is_terminal());
        assert!(TopupStatus::Completed.is_terminal());
        assert!(TopupStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_serde_matches_db_labels() {
        assert_eq!(
            serde_json::to_string(&TopupStatus::Processing).unwrap(),
            "\"processing\""
        );
        assert_eq!(TopupStatus::Completed.as_str(), "completed");
    }
}
