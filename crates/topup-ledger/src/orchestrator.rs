//! # Top-up Orchestrator
//!
//! Owns the top-up state machine: initiation, provider handoff, webhook
//! reconciliation, wallet crediting, and failure handling.
//!
//! All coordination is delegated to row-level locking in Postgres; the
//! orchestrator holds no in-process mutable wallet state. Every multi-step
//! mutation runs in a single transaction and rolls back wholesale on any
//! step failure.

use crate::models::{LedgerEntry, Topup, TopupStatus, Wallet, WalletTransaction};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use topup_core::{
    BoxedPaymentGateway, CallbackUrls, Currency, GatewayEventKind, GatewaySession,
    SessionRequest, TopupError, TopupResult,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Outcome of reconciling an inbound provider event
#[derive(Debug, Clone)]
pub enum ReconcileOutcome {
    /// The correlated topup was completed and the wallet credited
    Completed(Topup),
    /// The correlated topup was marked failed
    Failed(Topup),
    /// Duplicate or late delivery: the topup had already reached a terminal
    /// state, nothing was mutated
    AlreadySettled { topup_id: Uuid, status: TopupStatus },
    /// Event acknowledged without mutation (unknown type, or no usable
    /// correlation id)
    Ignored { event_type: String },
}

/// The top-up state machine over a Postgres store and a payment gateway.
///
/// Constructed explicitly and injected where needed; there are no
/// process-wide singletons.
pub struct TopupOrchestrator {
    pool: PgPool,
    gateway: BoxedPaymentGateway,
    urls: CallbackUrls,
}

fn db_err(e: sqlx::Error) -> TopupError {
    TopupError::Storage(e.to_string())
}

impl TopupOrchestrator {
    pub fn new(pool: PgPool, gateway: BoxedPaymentGateway, urls: CallbackUrls) -> Self {
        Self {
            pool,
            gateway,
            urls,
        }
    }

    /// Begin a top-up: create the record, obtain a checkout session from
    /// the provider, and move the record to `processing`.
    ///
    /// Runs as one atomic unit: if the gateway call or any write fails, the
    /// transaction rolls back and no partial Topup survives.
    ///
    /// Note: there is no idempotency key on this path. A caller retrying
    /// after a network timeout creates a second pending Topup for the same
    /// intent; this mirrors the upstream behavior and is a documented gap.
    #[instrument(skip(self), fields(user_id = %user_id, wallet_id = %wallet_id))]
    pub async fn initiate(
        &self,
        user_id: Uuid,
        wallet_id: Uuid,
        amount: Decimal,
        currency: Currency,
    ) -> TopupResult<(GatewaySession, Topup)> {
        if amount <= Decimal::ZERO {
            return Err(TopupError::InvalidRequest(format!(
                "amount must be positive, got {}",
                amount
            )));
        }

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // The wallet must exist and belong to the requesting user.
        let wallet = sqlx::query_as::<_, Wallet>(
            "SELECT id, user_id, balance, created_at, updated_at
             FROM wallets WHERE id = $1 AND user_id = $2",
        )
        .bind(wallet_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?
        .ok_or_else(|| TopupError::NotFound {
            entity: "wallet",
            id: wallet_id.to_string(),
        })?;

        let topup_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO topups (id, user_id, wallet_id, amount, currency, status, provider)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(topup_id)
        .bind(user_id)
        .bind(wallet.id)
        .bind(amount)
        .bind(currency.as_str())
        .bind(TopupStatus::Pending)
        .bind(self.gateway.provider_name())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        // Hand off to the provider. On failure the `?` drops the
        // transaction, rolling back the pending row.
        let session = self
            .gateway
            .create_session(&SessionRequest {
                correlation_id: topup_id,
                amount,
                currency,
                success_url: self.urls.success_url(),
                cancel_url: self.urls.cancel_url(),
            })
            .await?;

        let topup = sqlx::query_as::<_, Topup>(
            "UPDATE topups
             SET status = $2, provider_session_id = $3, updated_at = NOW()
             WHERE id = $1
             RETURNING id, user_id, wallet_id, amount, currency, status, provider,
                       provider_session_id, provider_payment_id, created_at, updated_at",
        )
        .bind(topup_id)
        .bind(TopupStatus::Processing)
        .bind(&session.session_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        info!(
            topup_id = %topup.id,
            session_id = %session.session_id,
            "Top-up initiated"
        );

        Ok((session, topup))
    }

    /// Reconcile an inbound provider event.
    ///
    /// The payload and signature are verified by the gateway first; on
    /// verification failure the call is rejected with no state mutation.
    /// Duplicate completion deliveries are absorbed (`AlreadySettled`), and
    /// unknown event types are acknowledged without mutation so at-least-once
    /// webhook delivery never errors the provider.
    #[instrument(skip(self, payload, signature))]
    pub async fn reconcile(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> TopupResult<ReconcileOutcome> {
        let event = self.gateway.verify_event(payload, signature)?;

        info!(event_id = %event.event_id, kind = ?event.kind, "Reconciling provider event");

        match event.kind {
            GatewayEventKind::SessionCompleted => {
                let Some(topup_id) = event.correlation_id else {
                    warn!(event_id = %event.event_id, "Completed event without correlation id");
                    return Ok(ReconcileOutcome::Ignored {
                        event_type: "session_completed".to_string(),
                    });
                };

                match self.complete(topup_id, event.provider_ref.as_deref()).await {
                    Ok(topup) => Ok(ReconcileOutcome::Completed(topup)),
                    Err(TopupError::InvalidState { status, .. }) => {
                        // Duplicate delivery: the first one already settled
                        // this topup. Absorb, don't re-credit.
                        info!(topup_id = %topup_id, status = %status, "Duplicate completion absorbed");
                        let status = self.status(topup_id).await?.status;
                        Ok(ReconcileOutcome::AlreadySettled { topup_id, status })
                    }
                    Err(e) => Err(e),
                }
            }
            GatewayEventKind::SessionExpired => {
                let Some(topup_id) = event.correlation_id else {
                    return Ok(ReconcileOutcome::Ignored {
                        event_type: "session_expired".to_string(),
                    });
                };

                let topup = self.fail(topup_id).await?;
                if topup.status == TopupStatus::Failed {
                    Ok(ReconcileOutcome::Failed(topup))
                } else {
                    Ok(ReconcileOutcome::AlreadySettled {
                        topup_id,
                        status: topup.status,
                    })
                }
            }
            GatewayEventKind::Unknown(event_type) => {
                Ok(ReconcileOutcome::Ignored { event_type })
            }
        }
    }

    /// Credit the wallet for a topup currently in `processing`.
    ///
    /// The `processing` precondition is the idempotency guard: a second
    /// delivery finds the topup already `completed` and fails with
    /// `InvalidState` without re-crediting. The wallet row lock is held for
    /// the whole read-modify-write so a concurrent credit for the same
    /// wallet cannot read a stale balance.
    #[instrument(skip(self, provider_ref), fields(topup_id = %topup_id))]
    pub async fn complete(
        &self,
        topup_id: Uuid,
        provider_ref: Option<&str>,
    ) -> TopupResult<Topup> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let topup = lock_topup(&mut tx, topup_id).await?;

        if topup.status != TopupStatus::Processing {
            return Err(TopupError::InvalidState {
                topup_id: topup_id.to_string(),
                status: topup.status.to_string(),
            });
        }

        let wallet = sqlx::query_as::<_, Wallet>(
            "SELECT id, user_id, balance, created_at, updated_at
             FROM wallets WHERE id = $1 FOR UPDATE",
        )
        .bind(topup.wallet_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?
        .ok_or_else(|| TopupError::NotFound {
            entity: "wallet",
            id: topup.wallet_id.to_string(),
        })?;

        let balance_before = wallet.balance;
        let balance_after = balance_before + topup.amount;

        sqlx::query("UPDATE wallets SET balance = $2, updated_at = NOW() WHERE id = $1")
            .bind(wallet.id)
            .bind(balance_after)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let description = format!("Wallet top-up {}", topup.id);
        let transaction = sqlx::query_as::<_, WalletTransaction>(
            "INSERT INTO transactions
                 (wallet_id, kind, amount, currency, description, external_ref, status)
             VALUES ($1, 'topup', $2, $3, $4, $5, 'completed')
             RETURNING id, wallet_id, kind, amount, currency, description,
                       external_ref, status, created_at",
        )
        .bind(wallet.id)
        .bind(topup.amount)
        .bind(&topup.currency)
        .bind(&description)
        .bind(provider_ref)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "INSERT INTO ledger_entries
                 (wallet_id, topup_id, transaction_id, entry_type, amount,
                  balance_before, balance_after, description)
             VALUES ($1, $2, $3, 'credit', $4, $5, $6, $7)",
        )
        .bind(wallet.id)
        .bind(topup.id)
        .bind(transaction.id)
        .bind(topup.amount)
        .bind(balance_before)
        .bind(balance_after)
        .bind(&description)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        // State-filtered update: zero rows means a racing completion won.
        let completed = sqlx::query_as::<_, Topup>(
            "UPDATE topups
             SET status = $2, provider_payment_id = $3, updated_at = NOW()
             WHERE id = $1 AND status = $4
             RETURNING id, user_id, wallet_id, amount, currency, status, provider,
                       provider_session_id, provider_payment_id, created_at, updated_at",
        )
        .bind(topup.id)
        .bind(TopupStatus::Completed)
        .bind(provider_ref)
        .bind(TopupStatus::Processing)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?
        .ok_or_else(|| TopupError::InvalidState {
            topup_id: topup.id.to_string(),
            status: topup.status.to_string(),
        })?;

        tx.commit().await.map_err(db_err)?;

        info!(
            topup_id = %completed.id,
            wallet_id = %wallet.id,
            amount = %topup.amount,
            balance_after = %balance_after,
            "Top-up completed, wallet credited"
        );

        Ok(completed)
    }

    /// Mark a topup failed unless it already reached a terminal state.
    /// Terminal topups are returned unchanged (no-op). No wallet mutation.
    #[instrument(skip(self), fields(topup_id = %topup_id))]
    pub async fn fail(&self, topup_id: Uuid) -> TopupResult<Topup> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let topup = lock_topup(&mut tx, topup_id).await?;

        if topup.status.is_terminal() {
            return Ok(topup);
        }

        let failed = sqlx::query_as::<_, Topup>(
            "UPDATE topups SET status = $2, updated_at = NOW()
             WHERE id = $1
             RETURNING id, user_id, wallet_id, amount, currency, status, provider,
                       provider_session_id, provider_payment_id, created_at, updated_at",
        )
        .bind(topup.id)
        .bind(TopupStatus::Failed)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        info!(topup_id = %failed.id, "Top-up marked failed");

        Ok(failed)
    }

    /// Read-only projection of a single topup
    pub async fn status(&self, topup_id: Uuid) -> TopupResult<Topup> {
        sqlx::query_as::<_, Topup>(
            "SELECT id, user_id, wallet_id, amount, currency, status, provider,
                    provider_session_id, provider_payment_id, created_at, updated_at
             FROM topups WHERE id = $1",
        )
        .bind(topup_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or_else(|| TopupError::NotFound {
            entity: "topup",
            id: topup_id.to_string(),
        })
    }

    /// A user's topups, newest first
    pub async fn history(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> TopupResult<Vec<Topup>> {
        let limit = limit.clamp(1, 100);
        let offset = offset.max(0);

        sqlx::query_as::<_, Topup>(
            "SELECT id, user_id, wallet_id, amount, currency, status, provider,
                    provider_session_id, provider_payment_id, created_at, updated_at
             FROM topups
             WHERE user_id = $1
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    /// Create a wallet for a user (zero balance)
    pub async fn create_wallet(&self, user_id: Uuid) -> TopupResult<Wallet> {
        sqlx::query_as::<_, Wallet>(
            "INSERT INTO wallets (user_id)
             VALUES ($1)
             RETURNING id, user_id, balance, created_at, updated_at",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }

    /// Current wallet state
    pub async fn wallet(&self, wallet_id: Uuid) -> TopupResult<Wallet> {
        sqlx::query_as::<_, Wallet>(
            "SELECT id, user_id, balance, created_at, updated_at
             FROM wallets WHERE id = $1",
        )
        .bind(wallet_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or_else(|| TopupError::NotFound {
            entity: "wallet",
            id: wallet_id.to_string(),
        })
    }

    /// Ledger entries for a wallet, oldest first
    pub async fn ledger(&self, wallet_id: Uuid) -> TopupResult<Vec<LedgerEntry>> {
        sqlx::query_as::<_, LedgerEntry>(
            "SELECT id, wallet_id, topup_id, transaction_id, entry_type, amount,
                    balance_before, balance_after, description, created_at
             FROM ledger_entries
             WHERE wallet_id = $1
             ORDER BY created_at ASC",
        )
        .bind(wallet_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }
}

/// Lock a topup row for the duration of the enclosing transaction
async fn lock_topup(
    tx: &mut Transaction<'_, Postgres>,
    topup_id: Uuid,
) -> TopupResult<Topup> {
    sqlx::query_as::<_, Topup>(
        "SELECT id, user_id, wallet_id, amount, currency, status, provider,
                provider_session_id, provider_payment_id, created_at, updated_at
         FROM topups WHERE id = $1 FOR UPDATE",
    )
    .bind(topup_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(db_err)?
    .ok_or_else(|| TopupError::NotFound {
        entity: "topup",
        id: topup_id.to_string(),
    })
}
