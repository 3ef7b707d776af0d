use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::domain::{
    Amount, LedgerTotals, NewTransaction, Transaction, TransactionId, TransactionType, User,
    UserId, Wallet, WalletLedger,
};

use super::seed::SeedData;
use super::{DeadlineExceeded, MIGRATION_001_INITIAL, WalletStore, WithdrawOutcome, Withdrawal};

/// Connection settings for the SQLite store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// How long a request waits for a free pooled connection.
    pub acquire_timeout: Duration,
    /// How long a connection waits on SQLite's write lock.
    pub busy_timeout: Duration,
    /// Create the database file when it does not exist yet.
    pub create_if_missing: bool,
}

impl StoreConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 100,
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
            create_if_missing: true,
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn with_create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }
}

/// A withdrawal that has run up to, but not including, COMMIT.
enum StagedWithdrawal {
    Pending(sqlx::Transaction<'static, Sqlite>, Withdrawal),
    Rejected(WithdrawOutcome),
}

/// Repository for persisting and querying users, wallets and transactions.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the SQLite database described by `config`.
    /// Creates the database file if it doesn't exist, unless
    /// `create_if_missing` is off.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)
            .with_context(|| format!("Invalid database URL: {}", config.database_url))?
            .create_if_missing(config.create_if_missing)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.busy_timeout)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        info!(
            max_connections = config.max_connections,
            "connected to wallet database"
        );
        Ok(Self::new(pool))
    }

    /// Run database migrations. Safe to call on an already migrated database.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;

        debug!("schema is up to date");
        Ok(())
    }

    /// Initialize the database (connect + migrate).
    pub async fn init(config: &StoreConfig) -> Result<Self> {
        let repo = Self::connect(config).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ========================
    // Provisioning
    // ========================

    /// Insert the demo users, wallets and transactions if there are no users yet.
    /// Returns true if data was inserted.
    pub async fn seed_if_empty(&self) -> Result<bool> {
        let mut tx = self.pool.begin().await.context("Failed to begin seed")?;

        let user_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM users")
            .fetch_one(&mut *tx)
            .await
            .context("Failed to count users")?
            .get("count");

        if user_count > 0 {
            debug!(user_count, "users present, skipping seed");
            return Ok(false);
        }

        let seed = SeedData::demo();

        for user in &seed.users {
            insert_user(&mut tx, user).await?;
        }

        for wallet in &seed.wallets {
            sqlx::query("INSERT INTO wallets (user_id, balance) VALUES (?, ?)")
                .bind(wallet.user_id)
                .bind(wallet.balance)
                .execute(&mut *tx)
                .await
                .context("Failed to seed wallets")?;
        }

        for transaction in &seed.transactions {
            insert_transaction(&mut tx, transaction).await?;
        }

        tx.commit().await.context("Failed to commit seed")?;

        info!(
            users = seed.users.len(),
            transactions = seed.transactions.len(),
            "seeded demo data"
        );
        Ok(true)
    }

    /// Create a user together with its wallet. A non-zero opening balance is
    /// recorded as a deposit so the wallet's history explains its balance.
    pub async fn provision_wallet(&self, user: &User, opening_balance: Amount) -> Result<Wallet> {
        anyhow::ensure!(
            opening_balance >= 0,
            "Opening balance must not be negative: {}",
            opening_balance
        );

        let mut tx = self.pool.begin().await.context("Failed to begin provisioning")?;

        insert_user(&mut tx, user).await?;

        let wallet_id: i64 =
            sqlx::query("INSERT INTO wallets (user_id, balance) VALUES (?, ?) RETURNING id")
                .bind(user.id)
                .bind(opening_balance)
                .fetch_one(&mut *tx)
                .await
                .context("Failed to create wallet")?
                .get("id");

        if opening_balance > 0 {
            insert_transaction(&mut tx, &NewTransaction::deposit(user.id, opening_balance))
                .await?;
        }

        tx.commit().await.context("Failed to commit provisioning")?;

        Ok(Wallet {
            id: wallet_id,
            user_id: user.id,
            balance: opening_balance,
        })
    }

    // ========================
    // Queries
    // ========================

    pub async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, username, email FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user")?;

        Ok(row.map(|row| User {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
        }))
    }

    /// All transactions of a user, oldest first.
    pub async fn list_transactions_for_user(&self, user_id: UserId) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, type, amount, created_at
            FROM transactions
            WHERE user_id = ?
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transactions")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    /// Debit the wallet and append the withdraw entry without committing.
    ///
    /// Dropping the returned transaction (or this future) rolls everything
    /// back, so every early return leaves the store untouched.
    async fn stage_withdrawal(&self, user_id: UserId, amount: Amount) -> Result<StagedWithdrawal> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin withdrawal")?;

        // The sufficiency check is part of the write itself: SQLite takes the
        // write lock before evaluating the WHERE clause, so concurrent
        // withdrawals on the same wallet serialize here.
        let updated = sqlx::query(
            r#"
            UPDATE wallets
            SET balance = balance - ?
            WHERE user_id = ? AND balance >= ?
            RETURNING balance
            "#,
        )
        .bind(amount)
        .bind(user_id)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to debit wallet")?;

        let Some(row) = updated else {
            let balance: Option<Amount> =
                sqlx::query("SELECT balance FROM wallets WHERE user_id = ?")
                    .bind(user_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .context("Failed to fetch wallet")?
                    .map(|row| row.get("balance"));

            return Ok(StagedWithdrawal::Rejected(match balance {
                Some(balance) => WithdrawOutcome::InsufficientBalance { balance },
                None => WithdrawOutcome::WalletNotFound,
            }));
        };
        let balance_after: Amount = row.get("balance");

        let entry = NewTransaction::withdraw(user_id, amount);
        let id = insert_transaction(&mut tx, &entry).await?;

        Ok(StagedWithdrawal::Pending(
            tx,
            Withdrawal {
                transaction: entry.into_transaction(id),
                balance_after,
            },
        ))
    }

    fn row_to_transaction(row: &SqliteRow) -> Result<Transaction> {
        let kind_str: String = row.get("type");
        let created_at_str: String = row.get("created_at");

        Ok(Transaction {
            id: row.get("id"),
            user_id: row.get("user_id"),
            kind: TransactionType::from_str(&kind_str)?,
            amount: row.get("amount"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    fn row_to_wallet(row: &SqliteRow) -> Wallet {
        Wallet {
            id: row.get("id"),
            user_id: row.get("user_id"),
            balance: row.get("balance"),
        }
    }
}

#[async_trait]
impl WalletStore for Repository {
    async fn get_wallet_by_user_id(&self, user_id: UserId) -> Result<Option<Wallet>> {
        let row = sqlx::query("SELECT id, user_id, balance FROM wallets WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch wallet")?;

        Ok(row.as_ref().map(Self::row_to_wallet))
    }

    async fn withdraw(
        &self,
        user_id: UserId,
        amount: Amount,
        timeout: Duration,
    ) -> Result<WithdrawOutcome> {
        let staged = tokio::time::timeout(timeout, self.stage_withdrawal(user_id, amount))
            .await
            .map_err(|_| DeadlineExceeded(timeout))??;

        let (tx, withdrawal) = match staged {
            StagedWithdrawal::Pending(tx, withdrawal) => (tx, withdrawal),
            StagedWithdrawal::Rejected(outcome) => return Ok(outcome),
        };

        // Past this point the deadline no longer applies: abandoning an
        // in-flight COMMIT would report a failure for a debit that lands.
        tx.commit().await.context("Failed to commit withdrawal")?;

        Ok(WithdrawOutcome::Applied(withdrawal))
    }

    async fn get_balance(&self, user_id: UserId) -> Result<Option<Amount>> {
        let row = sqlx::query("SELECT balance FROM wallets WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch balance")?;

        Ok(row.map(|row| row.get("balance")))
    }

    async fn ledger_totals(&self) -> Result<LedgerTotals> {
        // One read transaction so the three queries see the same snapshot.
        let mut tx = self.pool.begin().await.context("Failed to begin read")?;

        let rows = sqlx::query(
            r#"
            SELECT
                w.user_id as user_id,
                w.balance as balance,
                COALESCE(SUM(CASE WHEN t.type = 'deposit' THEN t.amount ELSE 0 END), 0) as deposited,
                COALESCE(SUM(CASE WHEN t.type = 'withdraw' THEN t.amount ELSE 0 END), 0) as withdrawn,
                COUNT(t.id) as transaction_count
            FROM wallets w
            LEFT JOIN transactions t ON t.user_id = w.user_id
            GROUP BY w.user_id, w.balance
            ORDER BY w.user_id
            "#,
        )
        .fetch_all(&mut *tx)
        .await
        .context("Failed to aggregate wallet ledgers")?;

        let wallets = rows
            .iter()
            .map(|row| WalletLedger {
                user_id: row.get("user_id"),
                balance: row.get("balance"),
                deposited: row.get("deposited"),
                withdrawn: row.get("withdrawn"),
                transaction_count: row.get("transaction_count"),
            })
            .collect();

        let transaction_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM transactions")
            .fetch_one(&mut *tx)
            .await
            .context("Failed to count transactions")?
            .get("count");

        let orphan_transactions: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM transactions t
            WHERE NOT EXISTS (SELECT 1 FROM wallets w WHERE w.user_id = t.user_id)
            "#,
        )
        .fetch_one(&mut *tx)
        .await
        .context("Failed to count orphan transactions")?
        .get("count");

        tx.commit().await.context("Failed to finish read")?;

        Ok(LedgerTotals {
            wallets,
            transaction_count,
            orphan_transactions,
        })
    }
}

async fn insert_user(conn: &mut SqliteConnection, user: &User) -> Result<()> {
    sqlx::query("INSERT INTO users (id, username, email) VALUES (?, ?, ?)")
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .execute(conn)
        .await
        .with_context(|| format!("Failed to insert user {}", user.id))?;
    Ok(())
}

async fn insert_transaction(
    conn: &mut SqliteConnection,
    transaction: &NewTransaction,
) -> Result<TransactionId> {
    let row = sqlx::query(
        r#"
        INSERT INTO transactions (user_id, type, amount, created_at)
        VALUES (?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(transaction.user_id)
    .bind(transaction.kind.as_str())
    .bind(transaction.amount)
    .bind(transaction.created_at.to_rfc3339())
    .fetch_one(conn)
    .await
    .context("Failed to append transaction")?;

    Ok(row.get("id"))
}
