//! CLI argument definitions using clap.

use clap::{Parser, Subcommand};
use eyre::Result;

#[derive(Debug, Parser)]
#[command(name = "ssnt")]
#[command(about = "SSNT-TTS alignment decoding tools")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Beam search over recorded scores and report the best alignments
    Decode(crate::decode::Args),

    /// Levenshtein distance between pairs of label sequences
    EditDistance(crate::edit_distance::Args),

    /// Expand unit durations into frame-level source indexes
    Upsample(crate::upsample::Args),
}

/// Execute CLI command - separated for testing.
pub fn run(cli: Cli) -> Result<()> {
    tracing::debug!(?cli, "parsed arguments");

    match cli.command {
        Commands::Decode(args) => crate::decode::execute(args.try_into()?),
        Commands::EditDistance(args) => crate::edit_distance::execute(args.try_into()?),
        Commands::Upsample(args) => crate::upsample::execute(args.try_into()?),
    }
}
