//! Decode subcommand - run beam search over recorded scores.

use crate::io::{read_json, rows, to_array3, write_json};
use color_eyre::Section;
use eyre::{Context, Result};
use ndarray::{Array1, s};
use serde::{Deserialize, Serialize};
use ssnt_core::config::{DecoderConfig, Variant};
use ssnt_core::decoder::Decoder;
use ssnt_core::search::{BeamSearch, ReplayScores};
use ssnt_core::types::Bounds;
use std::path::PathBuf;

/// CLI arguments for decoding.
#[derive(clap::Args, Debug)]
pub struct Args {
    /// Path to the decode job (JSON)
    pub path: PathBuf,

    /// Output JSON path (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Source index written to frames outside the alignment (duration variant)
    #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
    pub out_of_range: i32,

    #[command(flatten)]
    pub decoder_config: DecoderConfig,
}

/// Resolved configuration for decoding.
#[derive(Debug)]
pub struct Config {
    pub path: PathBuf,
    pub output: Option<PathBuf>,
    pub out_of_range: i32,
    pub decoder_config: DecoderConfig,
}

impl TryFrom<Args> for Config {
    type Error = eyre::Error;

    fn try_from(args: Args) -> Result<Self> {
        Ok(Self {
            path: args.path,
            output: args.output,
            out_of_range: args.out_of_range,
            decoder_config: args.decoder_config,
        })
    }
}

/// A decode job: lengths per batch element and one score tensor per step.
#[derive(Debug, Deserialize)]
pub struct Job {
    /// Overrides the command-line decoder options when present
    #[serde(default)]
    pub config: Option<DecoderConfig>,
    pub input_length: Vec<i32>,
    pub output_length: Vec<i32>,
    /// Log-probabilities, `[step][batch][slot][class]`
    pub scores: Vec<Vec<Vec<Vec<f32>>>>,
}

/// Best path of every batch element.
#[derive(Debug, Serialize)]
pub struct Report {
    pub variant: Variant,
    pub steps: usize,
    pub finished: bool,
    pub best_slots: Vec<i32>,
    pub best_scores: Vec<f32>,
    pub branch: Vec<Vec<i32>>,
    pub t: Vec<Vec<i32>>,
    pub predictions: Vec<Vec<i32>>,
    /// Source unit of every output frame (duration variant)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Vec<Vec<i32>>>,
}

pub fn execute(config: Config) -> Result<()> {
    tracing::info!(job = ?config.path.display(), "decoding");

    let job: Job = read_json(&config.path)?;
    let report = decode(job, &config.decoder_config, config.out_of_range)?;

    write_json(&report, config.output.as_deref())
}

/// Run a job and collect the best paths.
pub fn decode(job: Job, default_config: &DecoderConfig, out_of_range: i32) -> Result<Report> {
    let decoder_config = job.config.unwrap_or_else(|| default_config.clone());
    let decoder = Decoder::from_config(&decoder_config).wrap_err("invalid decoder config")?;

    let bounds = Bounds::new(
        Array1::from(job.input_length),
        Array1::from(job.output_length),
    );
    let scores = job
        .scores
        .into_iter()
        .enumerate()
        .map(|(step, h)| to_array3(&format!("scores[{step}]"), h))
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(
        batch_size = bounds.batch_size(),
        recorded_steps = scores.len(),
        "loaded job"
    );

    let search = BeamSearch::new(decoder).with_max_steps(decoder_config.max_steps);
    let output = search
        .run(&mut ReplayScores::new(scores), &bounds)
        .wrap_err("beam search failed")
        .suggestion("record one score tensor per step, or cap the loop with --max-steps")?;

    let finished = output.state.all_finished();
    if !finished {
        tracing::warn!(
            steps = output.steps,
            "step budget ran out before every hypothesis finished"
        );
    }

    let best = output.best_slots();
    let paths = output.best_paths()?;

    let alignment = match search.decoder().duration_transition() {
        Some(transition) => {
            let alignment = output.alignment(transition, &bounds, out_of_range)?;
            let best_rows = best
                .iter()
                .enumerate()
                .map(|(b, &w)| alignment.slice(s![b, w as usize, ..]).to_vec())
                .collect();
            Some(best_rows)
        }
        None => None,
    };

    Ok(Report {
        variant: decoder_config.variant,
        steps: output.steps,
        finished,
        best_slots: best.to_vec(),
        best_scores: output.best_scores().to_vec(),
        branch: rows(&paths.branch),
        t: rows(&paths.t),
        predictions: rows(&output.best_predictions()?),
        alignment,
    })
}
