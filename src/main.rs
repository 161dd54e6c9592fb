//! Ledger Wallet CLI
//!
//! Command-line interface for managing wallets and sending signed transfers.

use clap::{Parser, Subcommand};
use ledger_wallet::ledger::{LedgerService, TransactionKind};
use ledger_wallet::transfer::TransferAuditLog;
use ledger_wallet::wallet::{format_balance, short_address, FileBackend};
use ledger_wallet::{
    AmountType, BalanceSync, Config, HttpLedgerClient, Result, TransactionLedgerClient,
    TransferCoordinator, Wallet, WalletManager, WalletStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "ledger-wallet")]
#[command(about = "Multi-wallet manager with signed transfers against a remote ledger")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding the wallet collection (overrides config)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Ledger base URL (overrides config)
    #[arg(long, global = true)]
    ledger_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new wallet on the ledger
    Create {
        /// Display name (defaults to "Wallet N")
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Import a wallet from its mnemonic phrase
    Import {
        /// Mnemonic phrase (12-24 words)
        #[arg(short, long, env = "WALLET_MNEMONIC", hide_env_values = true)]
        mnemonic: String,

        /// Display name (keeps the stored name when omitted)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// List stored wallets
    List,

    /// Show one wallet
    Show { address: String },

    /// Rename a wallet
    Rename { address: String, name: String },

    /// Forget a wallet locally
    Delete { address: String },

    /// Refresh and print a wallet balance
    Balance { address: String },

    /// Send funds from a local wallet
    Send {
        /// Sender address (must be a local wallet with its mnemonic)
        #[arg(long)]
        from: String,

        /// Recipient address
        #[arg(long)]
        to: String,

        /// Amount in ETH (or USD with --usd)
        #[arg(long)]
        amount: f64,

        /// Interpret the amount as USD; the ledger converts it
        #[arg(long)]
        usd: bool,

        /// Sign and submit without stopping at the issued terms
        #[arg(short, long)]
        yes: bool,
    },

    /// Show transaction history for an address
    History { address: String },

    /// Check that the ledger is reachable
    Health,

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir;
    }
    if let Some(url) = cli.ledger_url {
        config.ledger.base_url = url;
    }

    let ledger: Arc<dyn LedgerService> = Arc::new(HttpLedgerClient::new(&config.ledger)?);
    let store = WalletStore::open(
        Arc::new(FileBackend::new(&config.storage.data_dir)),
        config.storage.collection_key.clone(),
    )
    .await;
    let manager = WalletManager::new(ledger.clone(), store.clone());

    match cli.command {
        Commands::Create { name } => {
            let wallet = manager.create_wallet(name).await?;
            print_wallet(&wallet);
            if let Some(mnemonic) = wallet.mnemonic() {
                println!();
                println!("Back up this recovery phrase. It is shown only once:");
                println!("  {}", mnemonic.expose());
            }
        }
        Commands::Import { mnemonic, name } => {
            let wallet = manager.import_wallet(&mnemonic, name).await?;
            print_wallet(&wallet);
        }
        Commands::List => {
            let wallets = manager.list().await;
            if wallets.is_empty() {
                println!("No wallets stored in {}", config.storage.data_dir.display());
            }
            for wallet in wallets {
                println!(
                    "{:<16} {}  {:>14} ETH{}",
                    wallet.name(),
                    short_address(wallet.address()),
                    format_balance(wallet.balance()),
                    if wallet.is_view_only() { "  (view-only)" } else { "" }
                );
            }
        }
        Commands::Show { address } => {
            let wallet = manager.select(&address).await?;
            print_wallet(&wallet);
        }
        Commands::Rename { address, name } => {
            let wallet = manager.rename(&address, &name).await?;
            print_wallet(&wallet);
        }
        Commands::Delete { address } => {
            if manager.delete(&address).await? {
                println!("Deleted {}", address);
            } else {
                println!("No wallet {}", address);
            }
        }
        Commands::Balance { address } => {
            let sync = BalanceSync::new(ledger.clone(), store.clone());
            let balance = match sync.refresh(&address).await? {
                Some(balance) => balance,
                None => ledger.balance(&address).await?,
            };
            println!("{} ETH", format_balance(balance));
        }
        Commands::Send {
            from,
            to,
            amount,
            usd,
            yes,
        } => {
            let amount_type = if usd { AmountType::Usd } else { AmountType::Eth };
            let coordinator = TransferCoordinator::new(ledger.clone(), store.clone())
                .with_audit_log(TransferAuditLog::new(config.audit_log()));
            run_send(coordinator, &from, &to, amount, amount_type, yes).await?;
        }
        Commands::History { address } => {
            let client = TransactionLedgerClient::new(ledger.clone());
            let transactions = client.history(&address).await?;
            if transactions.is_empty() {
                println!("No transactions");
            }
            for tx in transactions {
                let (direction, counterparty) = match tx.kind {
                    TransactionKind::Sent => ("sent to", &tx.to_address),
                    TransactionKind::Received => {
                        ("received from", &tx.from_address)
                    }
                };
                println!(
                    "#{:<5} {:<13} {}  {} ETH{}  [{:?}] {}",
                    tx.id,
                    direction,
                    short_address(counterparty),
                    format_balance(tx.amount),
                    tx.amount_usd
                        .map(|usd| format!(" (${:.2})", usd))
                        .unwrap_or_default(),
                    tx.status,
                    tx.created_at
                );
            }
        }
        Commands::Health => {
            let health = ledger.health().await?;
            println!(
                "{} ({})",
                health.status,
                health.timestamp.as_deref().unwrap_or("no timestamp")
            );
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

async fn run_send(
    mut coordinator: TransferCoordinator,
    from: &str,
    to: &str,
    amount: f64,
    amount_type: AmountType,
    confirmed: bool,
) -> Result<()> {
    let pending = coordinator.initiate(from, to, amount, amount_type).await?;

    println!("Transfer terms issued by the ledger:");
    println!("  From:    {}", pending.from_address);
    println!("  To:      {}", pending.to_address);
    match pending.amount_usd {
        Some(usd) => println!("  Amount:  {} ETH (${:.2})", format_balance(pending.amount), usd),
        None => println!("  Amount:  {} ETH", format_balance(pending.amount)),
    }
    if let Some(expires_at) = pending.expires_at {
        println!("  Expires: {}", expires_at.to_rfc3339());
    }
    println!("  Message: {}", pending.message);

    if !confirmed {
        coordinator.cancel().await?;
        println!("Not signed. Re-run with --yes to sign and submit.");
        return Ok(());
    }

    let signature = coordinator.sign().await?;
    let receipt = coordinator.execute(&signature).await?;
    println!(
        "Transfer completed: {} ETH to {} (transaction {})",
        format_balance(receipt.amount),
        receipt.to_address,
        receipt
            .transaction_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "unknown".into())
    );
    Ok(())
}

fn print_wallet(wallet: &Wallet) {
    println!("Name:    {}", wallet.name());
    println!("Address: {}", wallet.address());
    println!("Balance: {} ETH", format_balance(wallet.balance()));
    if wallet.is_view_only() {
        println!("View-only: no recovery phrase stored");
    }
}
