use anyhow::Result;
use clap::Parser;
use wallet_ledger::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before parsing so its values feed the env-backed flags.
    let env_file = dotenv::dotenv();

    let cli = Cli::parse();
    cli.init_logging()?;

    if let Err(err) = env_file {
        tracing::debug!(%err, ".env not loaded, using process environment");
    }

    cli.run().await
}
