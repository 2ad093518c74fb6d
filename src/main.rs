//! Infragraph CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "infragraph")]
#[command(about = "Build infrastructure dependency graphs from scanned cloud state", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a state snapshot into a graph and write its elements
    Build {
        /// JSON state snapshot
        #[arg(short, long)]
        state: PathBuf,

        /// Configuration file
        #[arg(short, long, default_value = infragraph_core::CONFIG_FILE)]
        config: PathBuf,

        /// Output file for the element list
        #[arg(short, long, default_value = infragraph_core::DEFAULT_OUTPUT)]
        out: PathBuf,

        /// Skip the reducer rules
        #[arg(long)]
        no_reduce: bool,
    },
    /// Evaluate a Service|Function|query selector against a snapshot
    Query {
        #[arg(short, long)]
        state: PathBuf,

        selector: String,

        /// Scope to one account (requires --region)
        #[arg(long, requires = "region")]
        account: Option<String>,

        /// Scope to one region (requires --account)
        #[arg(long, requires = "account")]
        region: Option<String>,
    },
    /// Resolve the parameter objects of a dependent call
    Params {
        #[arg(short, long)]
        state: PathBuf,

        #[arg(long)]
        account: String,

        #[arg(long)]
        region: String,

        /// `key=Service|Function|query` or `key:=<json constant>`
        #[arg(short = 'r', long = "resolver", required = true)]
        resolvers: Vec<String>,
    },
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "infragraph={0},infragraph_core={0},infragraph_state={0},infragraph_entities={0}",
            log_level
        )))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Build {
            state,
            config,
            out,
            no_reduce,
        } => commands::build(state, config, out, no_reduce).await,
        Commands::Query {
            state,
            selector,
            account,
            region,
        } => commands::query(state, selector, account.zip(region)).await,
        Commands::Params {
            state,
            account,
            region,
            resolvers,
        } => commands::params(state, account, region, resolvers).await,
        Commands::Version => {
            println!("infragraph v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
