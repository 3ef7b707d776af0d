use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::api::{AppState, create_router};
use crate::application::LedgerService;
use crate::storage::{Repository, StoreConfig};

/// Wallet Ledger - balances and atomic withdrawals over HTTP
#[derive(Parser, Debug)]
#[command(name = "wallet-ledger")]
#[command(about = "A minimal wallet ledger service with atomic withdrawals")]
#[command(version)]
pub struct Cli {
    /// Address to bind the HTTP server to
    #[arg(long, env = "APP_HOST", default_value = "0.0.0.0", global = true)]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "APP_PORT", default_value_t = 8080, global = true)]
    pub port: u16,

    /// Deployment environment; production switches logs to JSON
    #[arg(long, env = "ENVIRONMENT", value_enum, default_value_t = Environment::Development, global = true)]
    pub environment: Environment,

    /// SQLite connection URL
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:wallet.db", global = true)]
    pub database_url: String,

    /// Maximum number of pooled database connections
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 100, global = true)]
    pub max_connections: u32,

    /// Seconds to wait for a free database connection
    #[arg(long, env = "DB_ACQUIRE_TIMEOUT_SECS", default_value_t = 5, global = true)]
    pub acquire_timeout_secs: u64,

    /// Deadline in seconds for a single ledger operation
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 15, global = true)]
    pub request_timeout_secs: u64,

    /// Seconds to let in-flight requests finish after a shutdown signal
    #[arg(long, env = "SHUTDOWN_TIMEOUT_SECS", default_value_t = 30, global = true)]
    pub shutdown_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// Do not insert demo data into an empty database
    #[arg(long, env = "NO_SEED", global = true)]
    pub no_seed: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the HTTP server (default)
    Serve,

    /// Create the schema and seed an empty database
    Migrate,

    /// Show a user's wallet balance
    Balance {
        /// User ID
        #[arg(value_parser = clap::value_parser!(i64).range(1..))]
        user_id: i64,
    },

    /// Withdraw from a user's wallet
    Withdraw {
        /// User ID
        #[arg(value_parser = clap::value_parser!(i64).range(1..))]
        user_id: i64,

        /// Amount in the smallest currency unit
        #[arg(value_parser = clap::value_parser!(i64).range(1..))]
        amount: i64,
    },

    /// Verify that every balance matches its transaction history
    Check,
}

impl Cli {
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(&self.database_url)
            .with_max_connections(self.max_connections)
            .with_acquire_timeout(Duration::from_secs(self.acquire_timeout_secs))
    }

    fn ledger(&self, repo: Arc<Repository>) -> LedgerService {
        LedgerService::new(repo).with_timeout(Duration::from_secs(self.request_timeout_secs))
    }

    /// Install the global tracing subscriber.
    pub fn init_logging(&self) -> Result<()> {
        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.log_level))
            .with_context(|| format!("Invalid log level: {}", self.log_level))?;

        let registry = tracing_subscriber::registry().with(env_filter);

        match self.environment {
            Environment::Production => registry
                .with(fmt::layer().json().with_target(true))
                .try_init(),
            Environment::Development => registry.with(fmt::layer().with_target(true)).try_init(),
        }
        .context("Failed to install tracing subscriber")?;

        Ok(())
    }

    pub async fn run(self) -> Result<()> {
        let command = self.command.clone().unwrap_or(Commands::Serve);

        match command {
            Commands::Serve => {
                let repo = self.init_store().await?;
                let result = self.serve(repo.clone()).await;
                repo.close().await;
                result?;
            }

            Commands::Migrate => {
                let repo = self.init_store().await?;
                repo.close().await;
                println!("Database ready: {}", self.database_url);
            }

            Commands::Balance { user_id } => {
                let repo = self.open_existing_store().await?;
                let wallet = self.ledger(repo).get_wallet(user_id).await?;
                println!(
                    "User {} (wallet #{}): balance {}",
                    wallet.user_id, wallet.id, wallet.balance
                );
            }

            Commands::Withdraw { user_id, amount } => {
                let repo = self.open_existing_store().await?;
                let withdrawal = self.ledger(repo).withdraw(user_id, amount).await?;
                println!(
                    "Withdrew {} from user {} (transaction #{}), new balance {}",
                    amount, user_id, withdrawal.transaction.id, withdrawal.balance_after
                );
            }

            Commands::Check => {
                let repo = self.open_existing_store().await?;
                run_check_command(&self.ledger(repo)).await?;
            }
        }

        Ok(())
    }

    /// Connect, migrate and (unless disabled) seed.
    async fn init_store(&self) -> Result<Arc<Repository>> {
        let repo = Repository::init(&self.store_config()).await?;
        if !self.no_seed {
            repo.seed_if_empty().await?;
        }
        Ok(Arc::new(repo))
    }

    /// Open a database that must already exist, bringing its schema up to
    /// date. One-shot commands never create an empty database file.
    async fn open_existing_store(&self) -> Result<Arc<Repository>> {
        let config = self.store_config().with_create_if_missing(false);
        let repo = Repository::init(&config)
            .await
            .with_context(|| format!("Cannot open database {}", self.database_url))?;
        Ok(Arc::new(repo))
    }

    async fn serve(&self, repo: Arc<Repository>) -> Result<()> {
        let state = Arc::new(AppState::new(self.ledger(repo)));
        let app = create_router(state);

        let listener = TcpListener::bind((self.host.as_str(), self.port))
            .await
            .with_context(|| format!("Failed to bind {}:{}", self.host, self.port))?;

        info!(
            host = %self.host,
            port = self.port,
            environment = ?self.environment,
            "server listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(Duration::from_secs(
                self.shutdown_timeout_secs,
            )))
            .await
            .context("Server error")?;

        info!("server shutdown complete");
        Ok(())
    }
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = service.check_integrity().await?;

    println!("Wallets:      {}", report.wallet_count);
    println!("Transactions: {}", report.transaction_count);
    println!("Total balance: {}", report.total_balance);
    println!();

    if report.is_healthy() {
        println!("Ledger is consistent.");
    } else {
        println!("Issues found:");
        for issue in &report.issues {
            println!("  - {}", issue);
        }
        anyhow::bail!("Ledger integrity check failed");
    }

    Ok(())
}

/// Resolves on SIGINT, SIGTERM, SIGHUP or SIGQUIT. Once resolved, the
/// process is forced down if draining takes longer than `grace`.
async fn shutdown_signal(grace: Duration) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(%err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::SignalKind;

        tokio::select! {
            _ = unix_signal(SignalKind::terminate()) => {}
            _ = unix_signal(SignalKind::hangup()) => {}
            _ = unix_signal(SignalKind::quit()) => {}
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received termination signal, shutting down"),
    }

    info!(grace_secs = grace.as_secs(), "waiting for in-flight requests");

    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        error!("graceful shutdown timed out, forcing exit");
        std::process::exit(1);
    });
}

#[cfg(unix)]
async fn unix_signal(kind: tokio::signal::unix::SignalKind) {
    match tokio::signal::unix::signal(kind) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(err) => {
            error!(%err, "failed to install signal handler");
            std::future::pending::<()>().await;
        }
    }
}
