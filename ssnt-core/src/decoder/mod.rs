//! One-step beam expansion, ranking and pruning.
//!
//! Every variant shares the same skeleton: finished hypotheses are carried
//! forward unchanged, unfinished ones are expanded by a [`Transition`] into one
//! candidate per class, and the best `beam_width` candidates (stable order on
//! `log_prob`, first-seen wins ties) become the next beam. The parent slot of
//! each survivor is the step's beam branch.

pub mod binary;
pub mod duration;
pub mod tone;

pub use binary::BinaryTransition;
pub use duration::DurationTransition;
pub use tone::ToneTransition;

use crate::config::{DecoderConfig, Variant};
use crate::error::{ConfigError, Error, Result, ensure_shape};
use crate::types::{Beam, BeamState, Bounds, Hypothesis, Limits, StepOutput, rank_score};
use ndarray::{Array2, ArrayView1, ArrayView2, ArrayView3, Axis};
use rayon::prelude::*;
use std::cmp::Ordering;

/// Successor produced by a transition: the new hypothesis and the class that
/// produced it.
pub type Expansion = (Hypothesis, i32);

/// Per-variant transition rule plugged into [`BeamStepDecoder`].
pub trait Transition: Sync {
    /// Number of score classes per beam slot.
    fn class_count(&self) -> usize;

    /// Prediction left in place for a finished hypothesis carried forward.
    fn carry_prediction(&self) -> i32;

    /// Expand an unfinished hypothesis given its score row.
    fn expand(
        &self,
        parent: &Hypothesis,
        scores: ArrayView1<'_, f32>,
        limits: Limits,
        out: &mut Vec<Expansion>,
    ) -> Result<()>;

    /// Steps needed to finish every hypothesis of one batch element.
    fn step_budget(&self, limits: Limits) -> usize;
}

/// A candidate for the next beam.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub hypothesis: Hypothesis,
    /// Class chosen, `None` for a carried finished hypothesis
    pub prediction: Option<i32>,
    /// Slot of the parent in the previous beam
    pub parent: usize,
}

impl Candidate {
    fn carry(hypothesis: Hypothesis, parent: usize) -> Self {
        Self {
            hypothesis,
            prediction: None,
            parent,
        }
    }
}

/// Anything that can advance a batch of beams by one step.
pub trait StepDecoder: Sync {
    fn beam_width(&self) -> usize;

    /// Advance every batch element by one step.
    fn step(&self, state: &BeamState, h: ArrayView3<'_, f32>, bounds: &Bounds)
    -> Result<StepOutput>;

    /// Step budget covering the longest batch element.
    fn step_budget(&self, bounds: &Bounds) -> usize;
}

/// Beam step decoder parameterized by a transition rule.
#[derive(Clone, Debug)]
pub struct BeamStepDecoder<T> {
    transition: T,
    beam_width: usize,
}

impl<T: Transition> BeamStepDecoder<T> {
    pub fn new(transition: T, beam_width: usize) -> Result<Self> {
        if beam_width == 0 {
            return Err(ConfigError::ZeroBeamWidth.into());
        }
        Ok(Self {
            transition,
            beam_width,
        })
    }

    pub fn transition(&self) -> &T {
        &self.transition
    }

    /// Advance one batch element. `h` is shaped `(beam_width, class_count)`.
    pub fn step_beam(
        &self,
        batch: usize,
        beam: &[Hypothesis],
        h: ArrayView2<'_, f32>,
        limits: Limits,
    ) -> Result<Vec<Candidate>> {
        if beam.iter().all(|hyp| hyp.is_finished) {
            return Ok(beam
                .iter()
                .enumerate()
                .map(|(w, hyp)| Candidate::carry(*hyp, w))
                .collect());
        }

        let mut candidates = Vec::with_capacity(beam.len() * self.transition.class_count());
        let mut expansions = Vec::with_capacity(self.transition.class_count());

        for (w, parent) in beam.iter().enumerate() {
            if parent.is_finished {
                candidates.push(Candidate::carry(*parent, w));
                continue;
            }

            expansions.clear();
            self.transition
                .expand(parent, h.row(w), limits, &mut expansions)?;
            candidates.extend(
                expansions
                    .drain(..)
                    .map(|(hypothesis, prediction)| Candidate {
                        hypothesis,
                        prediction: Some(prediction),
                        parent: w,
                    }),
            );
        }

        tracing::trace!(batch, candidates = candidates.len(), "expanded beam");

        select_top_k(candidates, self.beam_width).ok_or(Error::EmptyBeam { batch })
    }

    fn check_inputs(
        &self,
        state: &BeamState,
        h: ArrayView3<'_, f32>,
        bounds: &Bounds,
    ) -> Result<()> {
        state.validate()?;
        let batch_size = state.batch_size();
        ensure_shape(
            "log_prob",
            &[batch_size, self.beam_width],
            state.log_prob.shape(),
        )?;
        ensure_shape(
            "h",
            &[batch_size, self.beam_width, self.transition.class_count()],
            h.shape(),
        )?;
        bounds.validate(batch_size)
    }
}

impl<T: Transition> StepDecoder for BeamStepDecoder<T> {
    fn beam_width(&self) -> usize {
        self.beam_width
    }

    fn step(
        &self,
        state: &BeamState,
        h: ArrayView3<'_, f32>,
        bounds: &Bounds,
    ) -> Result<StepOutput> {
        self.check_inputs(state, h, bounds)?;

        let selected: Vec<Vec<Candidate>> = (0..state.batch_size())
            .into_par_iter()
            .map(|b| {
                let h = h.index_axis(Axis(0), b);
                self.step_beam(b, &state.beam(b), h, bounds.limits(b))
            })
            .collect::<Result<_>>()?;

        Ok(assemble(&selected, self.transition.carry_prediction()))
    }

    fn step_budget(&self, bounds: &Bounds) -> usize {
        (0..bounds.batch_size())
            .map(|b| self.transition.step_budget(bounds.limits(b)))
            .max()
            .unwrap_or(0)
    }
}

/// Rank candidates by `log_prob` descending and keep the first `k`.
///
/// The sort is stable, so equal scores keep their generation order. NaN ranks
/// as `-inf`. A list shorter than `k` is cycled to fill the beam; an empty list
/// yields `None`.
///
/// Equal candidates reached from different parents are all kept. Nothing is
/// deduplicated after sorting, so a beam may hold repeated `(t, u, log_prob)`
/// entries where a deduplicating decoder would hold distinct ones.
pub fn select_top_k(mut candidates: Vec<Candidate>, k: usize) -> Option<Vec<Candidate>> {
    if candidates.is_empty() {
        return None;
    }

    candidates.sort_by(|a, b| {
        rank_score(b.hypothesis.log_prob)
            .partial_cmp(&rank_score(a.hypothesis.log_prob))
            .unwrap_or(Ordering::Equal)
    });

    let n = candidates.len();
    if n < k {
        for i in 0..(k - n) {
            candidates.push(candidates[i % n]);
        }
    }
    candidates.truncate(k);
    Some(candidates)
}

/// Write selected candidates into dense step outputs. Predictions start at the
/// carry sentinel and are overwritten only for expanded candidates.
fn assemble(selected: &[Vec<Candidate>], carry_prediction: i32) -> StepOutput {
    let batch_size = selected.len();
    let beam_width = selected.first().map_or(0, Vec::len);

    let mut prediction = Array2::from_elem((batch_size, beam_width), carry_prediction);
    let mut beam_branch = Array2::zeros((batch_size, beam_width));

    for (b, candidates) in selected.iter().enumerate() {
        for (i, candidate) in candidates.iter().enumerate() {
            if let Some(class) = candidate.prediction {
                prediction[[b, i]] = class;
            }
            beam_branch[[b, i]] = candidate.parent as i32;
        }
    }

    let beams: Vec<Beam> = selected
        .iter()
        .map(|candidates| candidates.iter().map(|c| c.hypothesis).collect())
        .collect();

    StepOutput {
        state: BeamState::from_beams(&beams),
        prediction,
        beam_branch,
    }
}

/// Decoder for any configured variant.
#[derive(Clone, Debug)]
pub enum Decoder {
    Binary(BeamStepDecoder<BinaryTransition>),
    Duration(BeamStepDecoder<DurationTransition>),
    Tone(BeamStepDecoder<ToneTransition>),
}

impl Decoder {
    /// Build the decoder selected by `config.variant`.
    pub fn from_config(config: &DecoderConfig) -> Result<Self> {
        config.validate()?;

        let decoder = match config.variant {
            Variant::Binary => {
                Self::Binary(BeamStepDecoder::new(BinaryTransition, config.beam_width)?)
            }
            Variant::Duration => Self::Duration(BeamStepDecoder::new(
                DurationTransition::from_config(config)?,
                config.beam_width,
            )?),
            Variant::Tone => Self::Tone(BeamStepDecoder::new(
                ToneTransition::new(config.tone_class_size, config.empty_tone_id)?,
                config.beam_width,
            )?),
        };

        tracing::debug!(
            variant = ?config.variant,
            beam_width = config.beam_width,
            "built decoder"
        );

        Ok(decoder)
    }

    /// Number of score classes per slot.
    pub fn class_count(&self) -> usize {
        match self {
            Self::Binary(d) => d.transition().class_count(),
            Self::Duration(d) => d.transition().class_count(),
            Self::Tone(d) => d.transition().class_count(),
        }
    }

    /// Duration transition, when decoding durations.
    pub fn duration_transition(&self) -> Option<&DurationTransition> {
        match self {
            Self::Duration(d) => Some(d.transition()),
            _ => None,
        }
    }
}

impl StepDecoder for Decoder {
    fn beam_width(&self) -> usize {
        match self {
            Self::Binary(d) => d.beam_width(),
            Self::Duration(d) => d.beam_width(),
            Self::Tone(d) => d.beam_width(),
        }
    }

    fn step(
        &self,
        state: &BeamState,
        h: ArrayView3<'_, f32>,
        bounds: &Bounds,
    ) -> Result<StepOutput> {
        match self {
            Self::Binary(d) => d.step(state, h, bounds),
            Self::Duration(d) => d.step(state, h, bounds),
            Self::Tone(d) => d.step(state, h, bounds),
        }
    }

    fn step_budget(&self, bounds: &Bounds) -> usize {
        match self {
            Self::Binary(d) => d.step_budget(bounds),
            Self::Duration(d) => d.step_budget(bounds),
            Self::Tone(d) => d.step_budget(bounds),
        }
    }
}
