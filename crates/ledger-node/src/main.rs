// ledger-node/src/main.rs
use clap::{Parser, Subcommand};
use ledger_core::TransactionKind;
use ledger_node::{EngineConfig, LedgerBackend, LedgerEngine};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "bid-ledger")]
#[command(about = "Tamper-evident ledger for bids and document versions", version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "./ledger.toml")]
        output: String,
    },

    /// Record a run of bids, seal them and print the resulting chain state
    Demo {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<String>,

        /// Opportunity the bids are submitted against
        #[arg(short, long, default_value = "OPP-1")]
        reference: String,

        /// Number of bids to record
        #[arg(short = 'n', long, default_value = "5")]
        count: usize,

        /// Override mining difficulty
        #[arg(long)]
        difficulty: Option<usize>,
    },

    /// Print the SHA-256 content digest of a file
    Digest {
        /// File to hash
        path: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "bid_ledger={lvl},ledger_node={lvl},ledger_core={lvl},ledger_storage={lvl}",
                    lvl = log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Init { output } => {
            init_config(&output)?;
        }
        Commands::Demo { config, reference, count, difficulty } => {
            run_demo(config.as_deref(), &reference, count, difficulty).await?;
        }
        Commands::Digest { path } => {
            let contents = std::fs::read(&path)?;
            println!("{}", ledger_crypto::digest(&contents).to_hex());
        }
    }

    Ok(())
}

fn init_config(output: &str) -> anyhow::Result<()> {
    let config = EngineConfig::default();
    config.to_file(output)?;

    tracing::info!("Default configuration written to {}", output);
    Ok(())
}

async fn run_demo(
    config_path: Option<&str>,
    reference: &str,
    count: usize,
    difficulty: Option<usize>,
) -> anyhow::Result<()> {
    let mut config = match config_path {
        Some(path) => {
            tracing::info!("Loading configuration from {}", path);
            EngineConfig::from_file(path)?
        }
        None => EngineConfig::default(),
    };
    if let Some(difficulty) = difficulty {
        config.miner.difficulty = difficulty;
    }

    let engine = LedgerEngine::new(config)?;

    let mut receipts = Vec::with_capacity(count);
    let mut seals = Vec::new();
    for n in 1..=count {
        let payload = format!("{{\"bidder\":\"bidder-{}\",\"amount\":{}}}", n, n * 1_000);
        let submission = engine
            .record(
                TransactionKind::BidSubmission,
                reference,
                &format!("bidder-{}", n),
                payload.as_bytes(),
            )
            .await?;
        receipts.push((submission.receipt, payload));
        seals.extend(submission.sealing);
    }

    for seal in seals {
        seal.wait().await?;
    }
    engine.flush().await?;

    let status = engine.chain_status().await?;
    let trail = engine.audit_trail(reference).await?;
    let report = engine.validate_chain().await?;

    println!("{}", serde_json::to_string_pretty(&status)?);
    println!("{}", serde_json::to_string_pretty(&trail)?);
    println!("{}", serde_json::to_string_pretty(&report)?);

    for (receipt, payload) in &receipts {
        let verification = engine
            .verify_transaction(&receipt.transaction_hash, payload.as_bytes())
            .await?;
        tracing::info!(
            hash = %receipt.transaction_hash,
            verified = verification.verified,
            "{}",
            verification.reason
        );
    }

    engine.shutdown().await;
    Ok(())
}
