//! Ethereum Keyspace Scanner CLI
//!
//! Enumerates candidate private keys, derives their account addresses, and
//! polls a remote node for non-zero balances.

use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eth_keyspace_scanner::{
    DispatchEngine, FindingsLog, HttpLedger, KeyMode, ProgressCounter, ScanConfig,
};

#[derive(Parser)]
#[command(name = "eth-keyspace-scanner")]
#[command(about = "Exhaustive balance scanner for the Ethereum keyspace")]
#[command(version)]
struct Cli {
    /// Start private key for sequential scanning (64 hex characters)
    #[arg(long, value_name = "HEX")]
    start_key: Option<String>,

    /// Draw uniformly random private keys instead of counting
    #[arg(long)]
    random: bool,

    /// Password list for brain-wallet scanning (one password per line)
    #[arg(long, value_name = "FILE")]
    passwords: Option<PathBuf>,

    /// Number of checker workers (default: available parallelism)
    #[arg(short, long)]
    threads: Option<usize>,

    /// RPC server host
    #[arg(long, default_value = "127.0.0.1")]
    server: String,

    /// RPC server port
    #[arg(long, default_value_t = 8545)]
    port: u16,

    /// Findings file (created if missing, always appended)
    #[arg(long, default_value = "found.txt")]
    found_file: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    let Some(mode) = select_mode(&cli)? else {
        // No generation mode requested: show usage and exit cleanly.
        Cli::command().print_help()?;
        return Ok(());
    };

    let config = ScanConfig {
        mode,
        threads: cli.threads.unwrap_or_else(default_threads),
        rpc_endpoint: format!("http://{}:{}", cli.server, cli.port),
        found_file: cli.found_file,
    };
    config.validate()?;

    run_scan(config).await
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// Pick the generation mode from the flags. Exactly one may be selected;
/// none means "print usage".
fn select_mode(cli: &Cli) -> Result<Option<KeyMode>> {
    let mut modes = Vec::new();

    if let Some(start_key) = &cli.start_key {
        modes.push(KeyMode::Sequential {
            start_key: start_key.clone(),
        });
    }
    if cli.random {
        modes.push(KeyMode::Random);
    }
    if let Some(path) = &cli.passwords {
        modes.push(KeyMode::Passwords { path: path.clone() });
    }

    if modes.len() > 1 {
        anyhow::bail!("--start-key, --random and --passwords are mutually exclusive");
    }
    Ok(modes.pop())
}

fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

async fn run_scan(config: ScanConfig) -> Result<()> {
    tracing::info!(
        endpoint = %config.rpc_endpoint,
        threads = config.threads,
        "starting keyspace scan"
    );

    // Everything that can fail at startup fails here, before any worker runs.
    let source = config.key_source()?;
    let ledger = HttpLedger::new(&config.rpc_endpoint)?;
    ledger.probe().await?;
    let findings = Arc::new(FindingsLog::open(&config.found_file).await?);
    let checked = Arc::new(ProgressCounter::new());

    let engine = DispatchEngine::new(
        config.threads,
        Arc::new(ledger),
        findings,
        Arc::clone(&checked),
    );

    // An interrupt triggers a coordinated stop; the engine joins its workers
    // and reports the final count before run() returns.
    let shutdown = engine.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received interrupt, shutting down");
            let _ = shutdown.send(());
        }
    });

    let total = engine.run(source).await?;
    tracing::info!(total, "scan finished");

    Ok(())
}
