use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Amount, UserId};

pub type TransactionId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money entering the wallet. Only created by provisioning and seed data.
    Deposit,
    /// Money leaving the wallet through a withdrawal.
    Withdraw,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdraw => "withdraw",
        }
    }

    /// Signed effect of this transaction type on a balance.
    pub fn apply(&self, amount: Amount) -> Amount {
        match self {
            TransactionType::Deposit => amount,
            TransactionType::Withdraw => -amount,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = ParseTransactionTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(TransactionType::Deposit),
            "withdraw" => Ok(TransactionType::Withdraw),
            other => Err(ParseTransactionTypeError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTransactionTypeError(pub String);

impl fmt::Display for ParseTransactionTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown transaction type: {}", self.0)
    }
}

impl std::error::Error for ParseTransactionTypeError {}

/// An append-only ledger entry. Once stored it is never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// Always positive; the direction comes from `kind`.
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
}

/// A transaction that has not been assigned an ID by the store yet.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: UserId,
    pub kind: TransactionType,
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
}

impl NewTransaction {
    pub fn new(user_id: UserId, kind: TransactionType, amount: Amount) -> Self {
        Self {
            user_id,
            kind,
            amount,
            created_at: Utc::now(),
        }
    }

    pub fn withdraw(user_id: UserId, amount: Amount) -> Self {
        Self::new(user_id, TransactionType::Withdraw, amount)
    }

    pub fn deposit(user_id: UserId, amount: Amount) -> Self {
        Self::new(user_id, TransactionType::Deposit, amount)
    }

    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn into_transaction(self, id: TransactionId) -> Transaction {
        Transaction {
            id,
            user_id: self.user_id,
            kind: self.kind,
            amount: self.amount,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_type_parses_stored_names() {
        assert_eq!("deposit".parse(), Ok(TransactionType::Deposit));
        assert_eq!("withdraw".parse(), Ok(TransactionType::Withdraw));
        assert_eq!(TransactionType::Withdraw.to_string(), "withdraw");
    }

    #[test]
    fn test_transaction_type_rejects_unknown() {
        let err = "refund".parse::<TransactionType>().unwrap_err();
        assert_eq!(err.to_string(), "unknown transaction type: refund");
        // Stored values are lowercase only
        assert!("Withdraw".parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_apply_direction() {
        assert_eq!(TransactionType::Deposit.apply(300), 300);
        assert_eq!(TransactionType::Withdraw.apply(300), -300);
    }

    #[test]
    fn test_serializes_kind_as_type() {
        let tx = NewTransaction::withdraw(7, 250).into_transaction(42);
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], "withdraw");
        assert_eq!(json["user_id"], 7);
        assert_eq!(json["amount"], 250);
    }
}
