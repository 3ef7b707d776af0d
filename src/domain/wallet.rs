use serde::{Deserialize, Serialize};

use super::{Amount, UserId};

pub type WalletId = i64;

/// A user's wallet. There is exactly one per user and it is never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub user_id: UserId,
    /// Balance in the smallest currency unit. Never negative.
    pub balance: Amount,
}
