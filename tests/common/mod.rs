// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;
use wallet_ledger::application::LedgerService;
use wallet_ledger::domain::{Amount, User, UserId};
use wallet_ledger::storage::{Repository, StoreConfig};

/// Helper to create a migrated repository in a temporary database
pub async fn test_repository() -> Result<(Arc<Repository>, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let config = StoreConfig::new(format!("sqlite:{}", db_path.display()));
    let repo = Repository::init(&config).await?;
    Ok((Arc::new(repo), temp_dir))
}

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, Arc<Repository>, TempDir)> {
    let (repo, temp_dir) = test_repository().await?;
    let service = LedgerService::new(repo.clone());
    Ok((service, repo, temp_dir))
}

/// Provision a user and wallet with the given opening balance
pub async fn provision(repo: &Repository, user_id: UserId, balance: Amount) -> Result<()> {
    let user = User::new(
        user_id,
        format!("user_{}", user_id),
        format!("user{}@example.com", user_id),
    );
    repo.provision_wallet(&user, balance).await?;
    Ok(())
}

/// Sum of withdraw transaction amounts recorded for a user
pub async fn withdrawn_total(repo: &Repository, user_id: UserId) -> Result<Amount> {
    let transactions = repo.list_transactions_for_user(user_id).await?;
    Ok(transactions
        .iter()
        .filter(|tx| tx.kind == wallet_ledger::domain::TransactionType::Withdraw)
        .map(|tx| tx.amount)
        .sum())
}
