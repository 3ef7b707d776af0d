use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::domain::{Amount, IntegrityReport, UserId, Wallet, build_integrity_report};
use crate::storage::{WalletStore, WithdrawOutcome, Withdrawal};

use super::{AppError, DeadlineExceeded};

/// Default deadline for a single store operation.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(15);

/// Application service providing the ledger operations.
/// This is the primary interface for any client (HTTP API, CLI, tests).
///
/// Holds no balances of its own: every call goes to the store.
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn WalletStore>,
    timeout: Duration,
}

impl LedgerService {
    /// Create a new ledger service backed by the given store.
    pub fn new(store: Arc<dyn WalletStore>) -> Self {
        Self {
            store,
            timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Debit `amount` from the user's wallet and record a withdraw transaction.
    ///
    /// Either both the new balance and the transaction row are stored, or
    /// neither is. The deadline is enforced by the store up to COMMIT; an
    /// error from here means nothing was written.
    pub async fn withdraw(&self, user_id: UserId, amount: Amount) -> Result<Withdrawal, AppError> {
        let outcome = self
            .store
            .withdraw(user_id, amount, self.timeout)
            .await
            .inspect_err(|err| {
                if err.is::<DeadlineExceeded>() {
                    warn!(user_id, timeout = ?self.timeout, "withdrawal timed out before commit");
                }
            })?;

        match outcome {
            WithdrawOutcome::Applied(withdrawal) => {
                info!(
                    user_id,
                    amount,
                    balance = withdrawal.balance_after,
                    transaction_id = withdrawal.transaction.id,
                    "withdrawal applied"
                );
                Ok(withdrawal)
            }
            WithdrawOutcome::WalletNotFound => Err(AppError::WalletNotFound(user_id)),
            WithdrawOutcome::InsufficientBalance { balance } => {
                debug!(user_id, amount, balance, "withdrawal rejected");
                Err(AppError::InsufficientBalance {
                    user_id,
                    balance,
                    required: amount,
                })
            }
        }
    }

    /// Current balance of the user's wallet.
    pub async fn get_balance(&self, user_id: UserId) -> Result<Amount, AppError> {
        self.with_deadline(self.store.get_balance(user_id))
            .await?
            .ok_or(AppError::WalletNotFound(user_id))
    }

    /// The user's wallet record.
    pub async fn get_wallet(&self, user_id: UserId) -> Result<Wallet, AppError> {
        self.with_deadline(self.store.get_wallet_by_user_id(user_id))
            .await?
            .ok_or(AppError::WalletNotFound(user_id))
    }

    /// Verify that every wallet's balance is explained by its transactions.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let totals = self.with_deadline(self.store.ledger_totals()).await?;
        let report = build_integrity_report(&totals);

        for issue in &report.issues {
            warn!(%issue, "ledger integrity issue");
        }
        Ok(report)
    }

    async fn with_deadline<T>(
        &self,
        operation: impl Future<Output = anyhow::Result<T>>,
    ) -> Result<T, AppError> {
        match tokio::time::timeout(self.timeout, operation).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                warn!(timeout = ?self.timeout, "store operation timed out");
                Err(AppError::StoreFailure(
                    DeadlineExceeded(self.timeout).into(),
                ))
            }
        }
    }
}
