//! Spindrift CLI - command-line entry point.

mod commands;

use clap::Parser;

#[derive(Parser)]
#[command(name = "spindrift")]
#[command(about = "Progressive streaming server for incrementally acquired media")]
struct Cli {
    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    commands::handle_command(cli.command).await
}
