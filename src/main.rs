use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use joinpool::arena::{AcceptAllCoins, Arena, ArenaHandle};
use joinpool::client::{redeemable_value, AliceClient, BobClient, Coordinator};
use joinpool::config::RoundConfig;
use joinpool::round::{EndReason, Phase};
use joinpool::rpc::{RpcCoordinator, RpcServer};
use joinpool::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "joinpool")]
#[command(about = "A coinjoin round coordinator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the coordinator
    Coordinator {
        #[arg(long, default_value = "8722")]
        rpc_port: u16,
        /// Scheduling tick interval in milliseconds
        #[arg(long, default_value = "1000")]
        tick_ms: u64,
        /// Optional round configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show the coordinator's active rounds
    Status {
        #[arg(long, default_value = "8722")]
        rpc_port: u16,
    },

    /// Participate in the active round with one coin
    Join {
        #[arg(long, default_value = "8722")]
        rpc_port: u16,
        /// 32-byte signing seed (hex) controlling the coin
        #[arg(long)]
        seed: String,
        /// Funding txid (hex)
        #[arg(long)]
        txid: String,
        #[arg(long, default_value = "0")]
        vout: u32,
        /// Coin value in satoshis
        #[arg(long)]
        value: u64,
        /// Destination script (hex, 32 bytes)
        #[arg(long)]
        dest: String,
        /// Give up waiting for a phase after this many seconds
        #[arg(long, default_value = "600")]
        wait_secs: u64,
    },
}

fn parse_hex32(hex_str: &str, label: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(hex_str).with_context(|| format!("invalid {} hex", label))?;
    <[u8; 32]>::try_from(bytes).map_err(|_| anyhow::anyhow!("{} must be 32 bytes", label))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "joinpool=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Coordinator { rpc_port, tick_ms, config } => {
            run_coordinator(rpc_port, tick_ms, config).await
        }
        Command::Status { rpc_port } => show_status(rpc_port).await,
        Command::Join { rpc_port, seed, txid, vout, value, dest, wait_secs } => {
            join(rpc_port, &seed, &txid, vout, value, &dest, wait_secs).await
        }
    }
}

async fn run_coordinator(rpc_port: u16, tick_ms: u64, config: Option<PathBuf>) -> Result<()> {
    let cfg = match config {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str::<RoundConfig>(&raw).context("parsing round config")?
        }
        None => RoundConfig::default(),
    };

    // Runs open-loop against the chain; a deployment wires a node-backed
    // CoinVerifier here.
    let arena = Arena::new(cfg, Arc::new(AcceptAllCoins))?;
    let handle = ArenaHandle::new(arena);
    handle.spawn_step_loop(Duration::from_millis(tick_ms));

    RpcServer::new(rpc_port).run(handle).await
}

async fn show_status(rpc_port: u16) -> Result<()> {
    let api = RpcCoordinator::new(rpc_port);
    let rounds = api.status().await.context("coordinator unreachable")?;
    if rounds.is_empty() {
        println!("no active rounds");
    }
    for r in rounds {
        println!(
            "round {}  phase={:?}  inputs={}/{}  remaining={}s",
            hex::encode(r.id),
            r.phase,
            r.input_count,
            r.max_input_count,
            r.remaining_secs,
        );
        if let Some(txid) = r.txid {
            println!("  txid {}", hex::encode(txid));
        }
    }
    Ok(())
}

async fn join(
    rpc_port: u16,
    seed: &str,
    txid: &str,
    vout: u32,
    value: u64,
    dest: &str,
    wait_secs: u64,
) -> Result<()> {
    let seed = parse_hex32(seed, "seed")?;
    let txid = parse_hex32(txid, "txid")?;
    let dest = ScriptPubkey(parse_hex32(dest, "dest")?);

    let (sk, script) = keypair_from_seed(&seed);
    let coin = Coin { outpoint: OutPoint { txid, vout }, value, script_pubkey: script };

    let api = RpcCoordinator::new(rpc_port);
    let round = Coordinator::active_round(&api)
        .await
        .context("coordinator unreachable")?
        .context("no round is accepting registrations")?;
    println!("joining round {}", hex::encode(round.id));

    let mut alice = AliceClient::new(&api, sk, coin, round.id).with_timing(
        Duration::from_millis(500),
        Duration::from_secs(wait_secs),
    );

    alice.register().await?;
    println!("input registered, waiting for connection confirmation");
    alice.confirm_connection().await?;
    println!("connection confirmed, credentials received");

    alice.await_phase(Phase::OutputRegistration).await?;
    let (amount, vsize) = alice.credentials();
    let out_value = redeemable_value(amount, round.fee_rate);
    if out_value < round.min_output_amount {
        bail!(
            "coin too small: redeemable value {} is below the round minimum {}",
            out_value,
            round.min_output_amount
        );
    }
    let bob = BobClient::new(&api, round.id);
    bob.register_output(dest, out_value, amount.to_vec(), vsize.to_vec()).await?;
    println!("output registered for {} sats", out_value);

    alice.ready_to_sign().await?;
    alice.sign().await?;
    println!("witness submitted, waiting for the round to close");

    let end = alice.await_phase(Phase::Ended(EndReason::TransactionBroadcast)).await?;
    match end.phase {
        Phase::Ended(EndReason::TransactionBroadcast) => {
            println!("round complete, txid {}", hex::encode(end.txid.unwrap_or_default()));
            Ok(())
        }
        phase => bail!("round failed: {:?}", phase),
    }
}
