use std::fmt;

use serde::Serialize;

use super::{Amount, Transaction, UserId};

/// Compute a balance by replaying a user's transactions from zero.
pub fn compute_balance(transactions: &[Transaction]) -> Amount {
    transactions
        .iter()
        .fold(0, |balance, tx| balance + tx.kind.apply(tx.amount))
}

/// Aggregated ledger figures for a single wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletLedger {
    pub user_id: UserId,
    pub balance: Amount,
    pub deposited: Amount,
    pub withdrawn: Amount,
    pub transaction_count: i64,
}

impl WalletLedger {
    /// Balance implied by the transaction history.
    pub fn expected_balance(&self) -> Amount {
        self.deposited - self.withdrawn
    }

    pub fn is_consistent(&self) -> bool {
        self.balance == self.expected_balance()
    }
}

/// Everything the integrity check needs, as read from the store in one pass.
#[derive(Debug, Clone, Default)]
pub struct LedgerTotals {
    pub wallets: Vec<WalletLedger>,
    pub transaction_count: i64,
    /// Transactions whose user has no wallet.
    pub orphan_transactions: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum IntegrityIssue {
    NegativeBalance {
        user_id: UserId,
        balance: Amount,
    },
    BalanceMismatch {
        user_id: UserId,
        balance: Amount,
        expected: Amount,
    },
    OrphanTransactions {
        count: i64,
    },
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityIssue::NegativeBalance { user_id, balance } => {
                write!(f, "wallet of user {} has negative balance {}", user_id, balance)
            }
            IntegrityIssue::BalanceMismatch {
                user_id,
                balance,
                expected,
            } => write!(
                f,
                "wallet of user {} has balance {} but its transactions sum to {}",
                user_id, balance, expected
            ),
            IntegrityIssue::OrphanTransactions { count } => {
                write!(f, "{} transaction(s) reference a user without a wallet", count)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub wallet_count: usize,
    pub transaction_count: i64,
    pub total_balance: Amount,
    pub issues: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

pub fn build_integrity_report(totals: &LedgerTotals) -> IntegrityReport {
    let mut issues = Vec::new();

    for wallet in &totals.wallets {
        if wallet.balance < 0 {
            issues.push(IntegrityIssue::NegativeBalance {
                user_id: wallet.user_id,
                balance: wallet.balance,
            });
        }
        if !wallet.is_consistent() {
            issues.push(IntegrityIssue::BalanceMismatch {
                user_id: wallet.user_id,
                balance: wallet.balance,
                expected: wallet.expected_balance(),
            });
        }
    }

    if totals.orphan_transactions > 0 {
        issues.push(IntegrityIssue::OrphanTransactions {
            count: totals.orphan_transactions,
        });
    }

    IntegrityReport {
        wallet_count: totals.wallets.len(),
        transaction_count: totals.transaction_count,
        total_balance: totals.wallets.iter().map(|w| w.balance).sum(),
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewTransaction;

    fn ledger(user_id: UserId, balance: Amount, deposited: Amount, withdrawn: Amount) -> WalletLedger {
        WalletLedger {
            user_id,
            balance,
            deposited,
            withdrawn,
            transaction_count: 0,
        }
    }

    #[test]
    fn test_compute_balance_empty() {
        assert_eq!(compute_balance(&[]), 0);
    }

    #[test]
    fn test_compute_balance_mixed() {
        let transactions = vec![
            NewTransaction::deposit(3, 1_000_000).into_transaction(1),
            NewTransaction::withdraw(3, 250_000).into_transaction(2),
            NewTransaction::withdraw(3, 50_000).into_transaction(3),
        ];

        assert_eq!(compute_balance(&transactions), 700_000);
    }

    #[test]
    fn test_healthy_report() {
        let totals = LedgerTotals {
            wallets: vec![
                ledger(1, 1_000_000, 1_000_000, 0),
                ledger(3, 750_000, 1_000_000, 250_000),
            ],
            transaction_count: 3,
            orphan_transactions: 0,
        };

        let report = build_integrity_report(&totals);
        assert!(report.is_healthy());
        assert_eq!(report.wallet_count, 2);
        assert_eq!(report.total_balance, 1_750_000);
    }

    #[test]
    fn test_report_flags_mismatch_and_orphans() {
        let totals = LedgerTotals {
            wallets: vec![ledger(2, 400_000, 500_000, 0)],
            transaction_count: 2,
            orphan_transactions: 1,
        };

        let report = build_integrity_report(&totals);
        assert!(!report.is_healthy());
        assert_eq!(
            report.issues,
            vec![
                IntegrityIssue::BalanceMismatch {
                    user_id: 2,
                    balance: 400_000,
                    expected: 500_000,
                },
                IntegrityIssue::OrphanTransactions { count: 1 },
            ]
        );
    }

    #[test]
    fn test_report_flags_negative_balance() {
        let totals = LedgerTotals {
            wallets: vec![ledger(1, -100, 0, 100)],
            ..Default::default()
        };

        let report = build_integrity_report(&totals);
        assert!(matches!(
            report.issues.as_slice(),
            [IntegrityIssue::NegativeBalance { user_id: 1, balance: -100 }]
        ));
    }
}
