use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "confab", about = "Meeting capture engine", version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand)]
pub enum CliCommand {
    /// Record a session from real capture devices
    Record(RecordArgs),
    /// List capture devices and flag system audio monitors
    Devices,
    /// Print version
    Version,
}

#[derive(Args)]
pub struct RecordArgs {
    /// Capture source: "mic" or "screen"
    #[arg(short, long, default_value = "mic")]
    pub source: String,

    /// Stop automatically after this many seconds (Ctrl-C otherwise)
    #[arg(short, long)]
    pub duration: Option<u64>,

    /// Output file (defaults to the recordings directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl Default for RecordArgs {
    fn default() -> Self {
        Self {
            source: "mic".to_string(),
            duration: None,
            output: None,
        }
    }
}
