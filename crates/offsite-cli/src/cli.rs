use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "offsite",
    version,
    about = "Encrypted, deduplicated directory mirroring to object storage",
    after_help = "\
Configuration file lookup order:
  1. --config <path>    (explicit flag)
  2. $OFFSITE_CONFIG    (environment variable)
  3. ./offsite.yaml     (working directory)

Environment variables:
  OFFSITE_CONFIG    Path to configuration file (overrides default search)"
)]
pub(crate) struct Cli {
    /// Path to configuration file (overrides OFFSITE_CONFIG and default search)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Scan the source tree and upload everything pending (default)
    Run,

    /// Scan the source tree and register new content without uploading
    Scan,

    /// Upload the pending backlog without rescanning
    Upload,

    /// Show index totals: registered, pending, uploaded
    Status,
}
