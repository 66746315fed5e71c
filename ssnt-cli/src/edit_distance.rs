//! Edit-distance subcommand - batched Levenshtein distance between label sequences.

use crate::io::{pad_sequences, read_json, write_json};
use eyre::{Result, ensure};
use serde::{Deserialize, Serialize};
use ssnt_core::edit_distance::levenshtein_edit_distance;
use std::path::PathBuf;

/// Padding for sequences shorter than the longest one in the batch.
const PAD: i32 = -1;

/// CLI arguments for edit distance.
#[derive(clap::Args, Debug)]
pub struct Args {
    /// Path to the sequence pairs (JSON)
    pub path: PathBuf,

    /// Output JSON path (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Resolved configuration for edit distance.
#[derive(Debug)]
pub struct Config {
    pub path: PathBuf,
    pub output: Option<PathBuf>,
}

impl TryFrom<Args> for Config {
    type Error = eyre::Error;

    fn try_from(args: Args) -> Result<Self> {
        Ok(Self {
            path: args.path,
            output: args.output,
        })
    }
}

/// Two batches of sequences compared pairwise.
#[derive(Debug, Deserialize)]
pub struct Pairs {
    pub a: Vec<Vec<i32>>,
    pub b: Vec<Vec<i32>>,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub distances: Vec<i32>,
}

pub fn execute(config: Config) -> Result<()> {
    let pairs: Pairs = read_json(&config.path)?;
    let report = edit_distance(&pairs)?;

    write_json(&report, config.output.as_deref())
}

pub fn edit_distance(pairs: &Pairs) -> Result<Report> {
    ensure!(
        pairs.a.len() == pairs.b.len(),
        "`a` has {} sequences but `b` has {}",
        pairs.a.len(),
        pairs.b.len()
    );

    let (a, a_lengths) = pad_sequences(&pairs.a, PAD);
    let (b, b_lengths) = pad_sequences(&pairs.b, PAD);

    let distances =
        levenshtein_edit_distance(a.view(), b.view(), a_lengths.view(), b_lengths.view())?;

    tracing::info!(pairs = distances.len(), "computed edit distances");

    Ok(Report {
        distances: distances.to_vec(),
    })
}
