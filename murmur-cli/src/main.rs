use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

mod client;
mod commands;

#[derive(Parser)]
#[command(name = "murmur", about = "Pluggable userbot framework")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot on the console loopback transport
    Run(commands::run::RunArgs),
    /// Manage plugins
    Plugin(commands::plugin::PluginArgs),
    /// Check plugin update sources and install new builds
    Update(commands::update::UpdateArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    match cli.command {
        Commands::Run(args) => commands::run::run(args).await,
        Commands::Plugin(args) => commands::plugin::run(args).await,
        Commands::Update(args) => commands::update::run(args).await,
    }
}

/// Log to stderr and to a per-session file under the murmur log
/// directory
fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose { "debug" } else { "info" };

    let log_dir = murmur_paths::log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let log_file = std::fs::File::create(log_dir.join(format!("murmur-{stamp}.log")))?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(std::sync::Arc::new(log_file)),
        )
        .init();
    Ok(())
}
