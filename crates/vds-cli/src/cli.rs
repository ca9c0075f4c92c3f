use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "vds",
    about = "Verifiable Data Structures: signed, revisioned log and map roots",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate an Ed25519 tree signing key
    Keygen,
    /// Show the effective service configuration
    Config(ConfigArgs),
    /// Create an in-memory tree, write to it, and print its signed roots
    Demo(DemoArgs),
    /// Verify a root history exported by `vds demo --format json`
    Verify(VerifyArgs),
}

#[derive(Args)]
pub struct ConfigArgs {
    /// TOML file to load instead of the defaults
    #[arg(long)]
    pub path: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum DemoTreeType {
    Log,
    Map,
}

#[derive(Args)]
pub struct DemoArgs {
    #[arg(long, default_value = "log")]
    pub tree_type: DemoTreeType,
    /// Entries written per batch
    #[arg(long, default_value = "4")]
    pub leaves: usize,
    /// Number of write batches
    #[arg(long, default_value = "3")]
    pub batches: usize,
    /// If set, the tree's max_root_duration; the demo then waits for one
    /// idle root from the sequencer
    #[arg(long)]
    pub idle_ms: Option<u64>,
    /// Service config file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct VerifyArgs {
    pub file: PathBuf,
    /// Hex-encoded tree public key
    #[arg(long)]
    pub public_key: String,
}
