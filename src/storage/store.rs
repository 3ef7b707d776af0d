use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Amount, LedgerTotals, Transaction, UserId, Wallet};

/// A withdrawal that was committed by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Withdrawal {
    pub transaction: Transaction,
    pub balance_after: Amount,
}

/// How a withdrawal attempt ended. Only `Applied` leaves a trace in the
/// store; the other outcomes roll back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WithdrawOutcome {
    Applied(Withdrawal),
    WalletNotFound,
    InsufficientBalance { balance: Amount },
}

/// Durable, transactional storage for wallets and their ledger entries.
///
/// Errors returned here are infrastructure failures (connectivity, pool
/// exhaustion, lock timeouts). Domain outcomes are part of the `Ok` value.
#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn get_wallet_by_user_id(&self, user_id: UserId) -> Result<Option<Wallet>>;

    /// Check the balance, debit it and append a `withdraw` transaction as
    /// one atomic unit.
    ///
    /// `timeout` bounds the work up to COMMIT. Expiry before that point rolls
    /// back and fails with [`DeadlineExceeded`]; once COMMIT has been issued
    /// it is awaited to completion, so an error never hides a committed
    /// withdrawal.
    async fn withdraw(
        &self,
        user_id: UserId,
        amount: Amount,
        timeout: Duration,
    ) -> Result<WithdrawOutcome>;

    async fn get_balance(&self, user_id: UserId) -> Result<Option<Amount>>;

    /// Per-wallet totals used by the integrity check.
    async fn ledger_totals(&self) -> Result<LedgerTotals>;
}

/// A store operation did not finish within the configured deadline.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("operation did not complete within {0:?}")]
pub struct DeadlineExceeded(pub Duration);
