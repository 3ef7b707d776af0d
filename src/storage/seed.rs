use chrono::{Duration, Utc};

use crate::domain::{Amount, NewTransaction, User, UserId};

pub(super) struct SeedWallet {
    pub user_id: UserId,
    pub balance: Amount,
}

/// Demo data inserted into an empty database.
pub(super) struct SeedData {
    pub users: Vec<User>,
    pub wallets: Vec<SeedWallet>,
    pub transactions: Vec<NewTransaction>,
}

impl SeedData {
    pub fn demo() -> Self {
        let now = Utc::now();

        Self {
            users: vec![
                User::new(1, "john_doe", "john@example.com"),
                User::new(2, "jane_doe", "jane@example.com"),
                User::new(3, "bob_smith", "bob@example.com"),
            ],
            wallets: vec![
                SeedWallet {
                    user_id: 1,
                    balance: 1_000_000,
                },
                SeedWallet {
                    user_id: 2,
                    balance: 500_000,
                },
                SeedWallet {
                    user_id: 3,
                    balance: 750_000,
                },
            ],
            transactions: vec![
                NewTransaction::deposit(1, 1_000_000).at(now - Duration::hours(24)),
                NewTransaction::deposit(2, 500_000).at(now - Duration::hours(12)),
                NewTransaction::deposit(3, 1_000_000).at(now - Duration::hours(6)),
                NewTransaction::withdraw(3, 250_000).at(now - Duration::hours(1)),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TransactionType;

    #[test]
    fn test_demo_balances_match_their_history() {
        let seed = SeedData::demo();

        for wallet in &seed.wallets {
            let replayed: Amount = seed
                .transactions
                .iter()
                .filter(|tx| tx.user_id == wallet.user_id)
                .map(|tx| tx.kind.apply(tx.amount))
                .sum();
            assert_eq!(replayed, wallet.balance, "user {}", wallet.user_id);
        }
    }

    #[test]
    fn test_demo_has_one_withdrawal() {
        let seed = SeedData::demo();
        let withdrawals = seed
            .transactions
            .iter()
            .filter(|tx| tx.kind == TransactionType::Withdraw)
            .count();
        assert_eq!(withdrawals, 1);
    }
}
