use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "storysift", about = "Story-link capture and classification batch")]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = "storysift.yaml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Full batch: roster, capture, transform, export, upload.
    Run,
    /// Capture a single identity with full diagnostics; useful when a
    /// profile misbehaves in a batch.
    Probe { identity: String },
    /// Print the origin category for one URL and exit.
    Classify { url: String },
}
