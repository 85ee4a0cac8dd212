//! # slp-bot
//!
//! ## Commands
//! - `run`: start the chat bot (ingress + dispatcher)
//! - `split`: print the payout split of a balance
//! - `address`: convert between `ronin:` and checksummed `0x` forms
//! - `check-config`: resolve every address and percentage in a config file
//!
//! ## Startup (`run`)
//! 1. Load the account config (missing file is fatal)
//! 2. Build chain, ledger and chat clients
//! 3. Start the `/events` ingress and the dispatcher
//! 4. Ctrl-C flips the shutdown signal: pending confirmations cancel, the
//!    ingress drains, the dispatcher finishes commands already past
//!    confirmation and stops

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, Level};

use slp_bot::rpc::{DEFAULT_GAME_API_URL, DEFAULT_RPC_URL, DEFAULT_SIGNER_URL, SLP_CONTRACT};
use slp_bot::sheets::DEFAULT_SHEETS_URL;
use slp_bot::webhook::DEFAULT_CHAT_API_URL;
use slp_bot::{
    build_ingress_router, serve_ingress, BotContext, BotSettings, ConfirmationGate, Dispatcher,
    GoogleSheetsStore, HttpChatTransport, LedgerLogger, RoninRpcClient, RolePermission,
    RpcEndpoints,
};
use slp_common::{compute_split, load_from_file, Address};

#[derive(Parser)]
#[command(version, about = "SLP claim and scholar payout bot")]
struct Cli {
    /// Debug-level logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot.
    Run {
        #[arg(long, env = "SLP_BOT_CONFIG", default_value = "config.json")]
        config: PathBuf,

        #[arg(long, env = "SLP_BOT_LISTEN", default_value = "127.0.0.1:8640")]
        listen: SocketAddr,

        #[arg(long, env = "RONIN_RPC_URL", default_value = DEFAULT_RPC_URL)]
        rpc_url: String,

        #[arg(long, env = "SLP_GAME_API_URL", default_value = DEFAULT_GAME_API_URL)]
        game_api_url: String,

        #[arg(long, env = "SLP_SIGNER_URL", default_value = DEFAULT_SIGNER_URL)]
        signer_url: String,

        #[arg(long, default_value = SLP_CONTRACT)]
        slp_contract: String,

        #[arg(long, env = "SHEETS_API_URL", default_value = DEFAULT_SHEETS_URL)]
        sheets_url: String,

        #[arg(long, env = "SHEETS_ACCESS_TOKEN", hide_env_values = true)]
        sheets_token: String,

        #[arg(long, env = "CHAT_API_URL", default_value = DEFAULT_CHAT_API_URL)]
        chat_api_url: String,

        #[arg(long, env = "CHAT_BOT_TOKEN", hide_env_values = true)]
        chat_token: String,

        #[arg(long, default_value = "!")]
        prefix: String,

        /// Role allowed to run administrative commands.
        #[arg(long, default_value = "Admin")]
        admin_role: String,

        #[arg(long, default_value_t = 60)]
        confirmation_secs: u64,

        #[arg(long, default_value_t = 250)]
        transfer_pause_ms: u64,

        #[arg(long, default_value_t = 30)]
        http_timeout_secs: u64,
    },

    /// Print the fee / scholar / academy split of a balance.
    Split {
        #[arg(long)]
        balance: u64,
        #[arg(long)]
        fee: f64,
        #[arg(long)]
        scholar: f64,
    },

    /// Convert an address between display and canonical form.
    Address { address: String },

    /// Validate a config file.
    CheckConfig {
        #[arg(long, env = "SLP_BOT_CONFIG", default_value = "config.json")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .init();

    match cli.cmd {
        Commands::Run {
            config,
            listen,
            rpc_url,
            game_api_url,
            signer_url,
            slp_contract,
            sheets_url,
            sheets_token,
            chat_api_url,
            chat_token,
            prefix,
            admin_role,
            confirmation_secs,
            transfer_pause_ms,
            http_timeout_secs,
        } => {
            let bot_config = load_from_file(&config)
                .with_context(|| format!("loading config {}", config.display()))?;
            info!(
                scholars = bot_config.accounts.scholars.len(),
                "loaded config from {}",
                config.display()
            );
            for issue in bot_config.validate() {
                error!("config defect: {}", issue);
            }

            let timeout = Duration::from_secs(http_timeout_secs);
            let chain = RoninRpcClient::new(RpcEndpoints {
                rpc_url,
                game_api_url,
                signer_url,
                slp_contract: Address::parse_canonical(&slp_contract).context("--slp-contract")?,
                timeout,
            })?;
            let store = GoogleSheetsStore::new(sheets_url, sheets_token, timeout)?;
            let chat = HttpChatTransport::new(chat_api_url, chat_token, timeout)?;
            let ledger = LedgerLogger::new(Arc::new(store), bot_config.ledger_id.clone());

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let settings = BotSettings {
                prefix,
                confirmation_window: Duration::from_secs(confirmation_secs),
                transfer_pause: Duration::from_millis(transfer_pause_ms),
            };
            let ctx = Arc::new(BotContext::new(
                bot_config,
                Arc::new(chain),
                Arc::new(chat),
                ledger,
                Arc::new(RolePermission::new(admin_role)),
                ConfirmationGate::new(shutdown_rx.clone()),
                settings,
            ));

            let (inbox_tx, inbox_rx) = mpsc::channel(256);
            let ingress = tokio::spawn(serve_ingress(
                listen,
                build_ingress_router(inbox_tx),
                shutdown_rx.clone(),
            ));
            let dispatcher = tokio::spawn(Dispatcher::new(ctx).run(inbox_rx, shutdown_rx));

            tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
            info!("shutdown requested");
            let _ = shutdown_tx.send(true);

            match ingress.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("ingress stopped with error: {}", e),
                Err(e) => error!("ingress task failed: {}", e),
            }
            if let Err(e) = dispatcher.await {
                error!("dispatcher task failed: {}", e);
            }
        }

        Commands::Split { balance, fee, scholar } => {
            let split = compute_split(balance, fee, scholar)?;
            println!("balance: {}", split.balance);
            println!("scholar: {}", split.scholar_amount);
            println!("academy: {}", split.academy_amount);
            println!("fee:     {}", split.fee_amount);
        }

        Commands::Address { address } => {
            let parsed = Address::from_str(&address)?;
            println!("display:   {}", parsed.to_display());
            println!("canonical: {}", parsed.to_canonical());
        }

        Commands::CheckConfig { config } => {
            let bot_config = load_from_file(&config)
                .with_context(|| format!("loading config {}", config.display()))?;
            let issues = bot_config.validate();
            if !issues.is_empty() {
                for issue in &issues {
                    println!("✗ {}", issue);
                }
                bail!("{} config defect(s) in {}", issues.len(), config.display());
            }
            println!(
                "✓ {} scholar(s), ledger {}",
                bot_config.accounts.scholars.len(),
                bot_config.ledger_id
            );
        }
    }

    Ok(())
}
