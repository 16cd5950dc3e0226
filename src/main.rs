//! Binary for Faultline

mod cmd;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = cmd::Cli::parse();
    match cli.command {
        cmd::Commands::Show(a) => a.run(),
        cmd::Commands::Atpg(a) => a.run(),
        cmd::Commands::Simulate(a) => a.run(),
    }
}
