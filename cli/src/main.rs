mod cache_cmd;
mod plans_cmd;
mod qualify_cmd;

use clap::Parser;
use clap::Subcommand;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pilotdeck", version, about = "Skill-plan companion for your pilot roster")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = "pilotdeck.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Refresh the roster from the data API and evaluate every plan.
    Qualify(qualify_cmd::QualifyArgs),
    /// Inspect and check skill plan files.
    Plans(plans_cmd::PlansCli),
    /// Operate on the response-cache snapshot.
    Cache(cache_cmd::CacheCli),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = pilotdeck_core::Config::load_or_default(&cli.config)?;

    match cli.command {
        Command::Qualify(args) => qualify_cmd::run(config, args).await,
        Command::Plans(args) => plans_cmd::run(config, args),
        Command::Cache(args) => cache_cmd::run(config, args),
    }
}
