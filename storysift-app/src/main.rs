use anyhow::Result;
use clap::Parser;
use storysift_common::observability::{init_logging, LogConfig};
use storysift_config::SiftConfigLoader;
use storysift_transform::classify;

mod cli;
mod job;
mod roster;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // `classify` is pure and needs neither config nor logging.
    if let Command::Classify { url } = &cli.command {
        println!("{}", classify(url));
        return Ok(());
    }

    let config = SiftConfigLoader::new().with_file(&cli.config).load()?;

    init_logging(LogConfig {
        emit_stderr: true,
        ..LogConfig::default()
    })?;

    match cli.command {
        Command::Run => job::run(config).await,
        Command::Probe { identity } => job::probe(config, &identity).await,
        Command::Classify { .. } => unreachable!("handled before config load"),
    }
}
