//! ## netsight-cli
//! **Command-line frontend for the traffic monitor**
//!
//! `run` captures until Ctrl-C, `interfaces` lists capture devices and
//! `history` prints stored data points.

use clap::Parser;

mod commands;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;
    commands::init_logging(&config)?;

    match cli.command {
        Commands::Run(args) => commands::run(args, config).await,
        Commands::Interfaces => commands::interfaces(),
        Commands::History(args) => commands::history(args, config).await,
    }
}
