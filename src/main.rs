//! Gear fixture runner
//!
//! Runs JSON/YAML fixture files against a live Gear node and reports
//! whether the message queue and memory match the expected state.

use std::path::PathBuf;

use clap::Parser;
use gear_fixtures::chain::signer::ExternalSigner;
use gear_fixtures::chain::RpcChain;
use gear_fixtures::common::config::Config;
use gear_fixtures::commands::Commands;
use gear_fixtures::common::logging;
use gear_fixtures::runner::{RunOptions, Runner};
use gear_fixtures::{bindings, Result};

#[derive(Parser)]
#[command(name = "gear-fixtures", about = "Run message-queue fixtures against a Gear node")]
#[command(version, long_about = None, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Fixture files to run, in order
    files: Vec<PathBuf>,

    /// Config file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Node RPC URL, overrides node.url
    #[arg(long)]
    node: Option<String>,

    /// Continue after a failing fixture
    #[arg(long)]
    keep_going: bool,

    /// Print each phase and RPC traffic
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_cli(cli.verbose);

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<bool> {
    let mut config = Config::load(cli.config.as_deref())?;

    if let Some(Commands::Bindings { output }) = cli.command {
        let path = bindings::generate(&config.bindings, output.as_deref()).await?;
        println!("Bindings written to {}", path.display());
        return Ok(true);
    }

    if cli.files.is_empty() {
        eprintln!("No fixture files given");
        return Ok(false);
    }

    if let Some(url) = cli.node {
        config.node.url = url;
    }

    let signer = ExternalSigner::from_config(&config.signer);
    signer.locate()?;
    let chain = RpcChain::new(&config.node, signer, config.storage.clone())?;
    let head = chain.best_block_hash().await?;
    tracing::info!(url = %config.node.url, %head, "Connected to node");

    let options = RunOptions::from_config(&config, cli.keep_going, cli.verbose);
    let mut runner = Runner::new(chain, config, options);
    let summary = runner.run_files(&cli.files).await?;
    Ok(summary.success())
}
