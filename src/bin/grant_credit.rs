use clap::Parser;
use rust_decimal::Decimal;
use std::error::Error;

use subtitle_bot::accounts::AccountResolver;
use subtitle_bot::config;
use subtitle_bot::db;
use subtitle_bot::ledger::Ledger;
use subtitle_bot::utils::MessageFormatter;

#[derive(Parser)]
#[command(name = "grant_credit")]
#[command(about = "Credit a user's balance under a new invoice")]
struct Cli {
    /// telegram id of the user to credit
    telegram_user_id: i64,

    /// amount in tomans
    amount: Decimal,

    #[arg(short, long, default_value = "manual grant")]
    description: String,

    /// Execute mode - actually write the transaction (default is dry run)
    #[arg(long)]
    execute: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    // initialize rustls crypto provider
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    config::load_dotenv();

    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    if cli.amount <= Decimal::ZERO {
        return Err("amount must be positive".into());
    }

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| "DATABASE_URL environment variable is required")?;
    let pool = db::create_pool(&database_url)?;

    // no welcome bonus here; only existing users can be credited
    let accounts = AccountResolver::new(pool.clone(), Decimal::ZERO);
    let account = accounts.find_by_telegram_id(cli.telegram_user_id).await?;
    let ledger = Ledger::new(pool);
    let balance = ledger.get_balance(account.id).await?;

    println!(
        "User {} (id {}, @{}) balance: {}",
        account.telegram_user_id,
        account.id,
        account.username.as_deref().unwrap_or("-"),
        MessageFormatter::format_money(balance)
    );

    if !cli.execute {
        println!(
            "DRY RUN: would grant {} ({}). Use --execute to apply.",
            MessageFormatter::format_money(cli.amount),
            cli.description
        );
        return Ok(());
    }

    let transaction_id = ledger.grant(account.id, cli.amount, &cli.description).await?;
    let balance = ledger.get_balance(account.id).await?;
    println!(
        "Granted {} in transaction {}; new balance: {}",
        MessageFormatter::format_money(cli.amount),
        transaction_id,
        MessageFormatter::format_money(balance)
    );
    Ok(())
}
