use thiserror::Error;

use crate::domain::{Amount, UserId};

pub use crate::storage::DeadlineExceeded;

/// Tag for matching on the kind of failure without caring about its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    WalletNotFound,
    InsufficientBalance,
    StoreFailure,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Wallet not found for user {0}")]
    WalletNotFound(UserId),

    #[error("Insufficient balance for user {user_id}: balance {balance}, required {required}")]
    InsufficientBalance {
        user_id: UserId,
        balance: Amount,
        required: Amount,
    },

    #[error("Store failure: {0:#}")]
    StoreFailure(#[from] anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::WalletNotFound(_) => ErrorKind::WalletNotFound,
            AppError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            AppError::StoreFailure(_) => ErrorKind::StoreFailure,
        }
    }

    /// True when the store rejected or abandoned the work and the same call
    /// may succeed later: pool exhaustion, a busy/locked database or an
    /// expired deadline.
    pub fn is_retryable(&self) -> bool {
        let AppError::StoreFailure(err) = self else {
            return false;
        };

        err.chain().any(|cause| {
            if cause.is::<DeadlineExceeded>() {
                return true;
            }
            match cause.downcast_ref::<sqlx::Error>() {
                Some(sqlx::Error::PoolTimedOut) => true,
                Some(sqlx::Error::Database(db)) => db
                    .code()
                    .and_then(|code| code.parse::<i32>().ok())
                    // SQLITE_BUSY and SQLITE_LOCKED, including extended codes
                    .is_some_and(|code| matches!(code & 0xff, 5 | 6)),
                _ => false,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(AppError::WalletNotFound(9).kind(), ErrorKind::WalletNotFound);
        assert_eq!(
            AppError::InsufficientBalance {
                user_id: 2,
                balance: 500_000,
                required: 600_000,
            }
            .kind(),
            ErrorKind::InsufficientBalance
        );
        assert_eq!(
            AppError::from(anyhow::anyhow!("connection reset")).kind(),
            ErrorKind::StoreFailure
        );
    }

    #[test]
    fn test_domain_errors_are_not_retryable() {
        assert!(!AppError::WalletNotFound(1).is_retryable());
    }

    #[test]
    fn test_pool_timeout_is_retryable() {
        let err = anyhow::Error::new(sqlx::Error::PoolTimedOut).context("Failed to fetch balance");
        assert!(AppError::StoreFailure(err).is_retryable());
    }

    #[test]
    fn test_deadline_is_retryable() {
        let err = anyhow::Error::new(DeadlineExceeded(Duration::from_millis(10)));
        let app_err = AppError::StoreFailure(err);
        assert!(app_err.is_retryable());
        assert!(app_err.to_string().contains("did not complete within"));
    }

    #[test]
    fn test_other_store_errors_are_not_retryable() {
        let err = anyhow::anyhow!("disk I/O error");
        assert!(!AppError::StoreFailure(err).is_retryable());
    }
}
