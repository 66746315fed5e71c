//! Upsample subcommand - expand unit durations into frame-level source indexes.

use crate::io::{read_json, to_array2, to_array3, write_json};
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use ssnt_core::upsample::upsample_source_indexes;
use std::path::PathBuf;

/// CLI arguments for upsampling.
#[derive(clap::Args, Debug)]
pub struct Args {
    /// Path to the durations (JSON)
    pub path: PathBuf,

    /// Output JSON path (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output width (default: the longest output length)
    #[arg(long)]
    pub max_u: Option<usize>,

    /// Source index written to frames no unit owns
    #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
    pub out_of_range: i32,
}

/// Resolved configuration for upsampling.
#[derive(Debug)]
pub struct Config {
    pub path: PathBuf,
    pub output: Option<PathBuf>,
    pub max_u: Option<usize>,
    pub out_of_range: i32,
}

impl TryFrom<Args> for Config {
    type Error = eyre::Error;

    fn try_from(args: Args) -> Result<Self> {
        Ok(Self {
            path: args.path,
            output: args.output,
            max_u: args.max_u,
            out_of_range: args.out_of_range,
        })
    }
}

/// Durations per `[batch][slot][unit]` and output lengths per `[batch][slot]`.
#[derive(Debug, Deserialize)]
pub struct Durations {
    pub duration: Vec<Vec<Vec<i32>>>,
    pub output_length: Vec<Vec<i32>>,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub source_indexes: Vec<Vec<Vec<i32>>>,
}

pub fn execute(config: Config) -> Result<()> {
    let durations: Durations = read_json(&config.path)?;
    let report = upsample(durations, config.max_u, config.out_of_range)?;

    write_json(&report, config.output.as_deref())
}

pub fn upsample(durations: Durations, max_u: Option<usize>, out_of_range: i32) -> Result<Report> {
    let duration = to_array3("duration", durations.duration)?;
    let output_length = to_array2("output_length", durations.output_length)?;

    let max_u = max_u.unwrap_or_else(|| {
        let longest = output_length.iter().copied().max().unwrap_or(0);
        longest.max(0) as usize
    });

    let upsampled =
        upsample_source_indexes(duration.view(), output_length.view(), max_u, out_of_range)
            .wrap_err("failed to upsample durations")?;

    tracing::info!(shape = ?upsampled.shape(), "upsampled source indexes");

    let source_indexes = upsampled
        .outer_iter()
        .map(|slots| slots.outer_iter().map(|row| row.to_vec()).collect())
        .collect();

    Ok(Report { source_indexes })
}
