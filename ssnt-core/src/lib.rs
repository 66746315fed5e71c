//! ssnt-core: Monotonic alignment beam search for SSNT-TTS.
//!
//! This crate decodes the latent alignment between source units and output
//! frames of a segment-to-segment neural transducer, reconstructs paths from
//! the recorded beam branches, and expands unit durations into frame-level
//! alignments.
//!
//! # Architecture
//!
//! The decoder is built around two seams:
//!
//! - [`decoder::Transition`]: how one hypothesis expands per score class
//!   (binary shift/emit, duration classes, tone classes)
//! - [`search::ScoreModel`]: where per-step scores come from
//!
//! [`decoder::BeamStepDecoder`] advances a batch of beams one step;
//! [`search::BeamSearch`] drives it to completion and records the branch
//! trail consumed by [`backtrace`] and [`upsample`].
//!
//! # Quick Start
//!
//! ```ignore
//! use ssnt_core::config::DecoderConfig;
//! use ssnt_core::decoder::Decoder;
//! use ssnt_core::search::{BeamSearch, ReplayScores};
//! use ssnt_core::types::Bounds;
//!
//! let config = DecoderConfig::default();
//! let search = BeamSearch::new(Decoder::from_config(&config)?);
//!
//! let bounds = Bounds::new(input_length, output_length);
//! let output = search.run(&mut ReplayScores::new(recorded), &bounds)?;
//!
//! let paths = output.best_paths()?;
//! println!("{:?}", paths.t);
//! ```

pub mod backtrace;
pub mod config;
pub mod decoder;
pub mod edit_distance;
pub mod error;
pub mod search;
pub mod types;
pub mod upsample;
