//! Decode loop driving a [`StepDecoder`] over a score source.
//!
//! The scoring network lives outside this crate. [`ScoreModel`] is the seam it
//! plugs into: each step it sees the current beam and returns `h` shaped
//! `(batch, beam_width, class_count)`.

use crate::backtrace::{BestPaths, OrderedBranches, extract_best_paths, order_beam_branch};
use crate::decoder::{DurationTransition, StepDecoder};
use crate::error::{Error, Result, ensure_shape};
use crate::types::{BeamState, Bounds, rank_score, stack_steps};
use crate::upsample::upsample_source_indexes;
use ndarray::{Array1, Array2, Array3, Axis};

/// Source of per-step scores.
pub trait ScoreModel {
    fn scores(&mut self, step: usize, state: &BeamState) -> Result<Array3<f32>>;
}

/// Replays score tensors recorded ahead of time, one per step.
#[derive(Clone, Debug, Default)]
pub struct ReplayScores {
    steps: Vec<Array3<f32>>,
}

impl ReplayScores {
    pub fn new(steps: Vec<Array3<f32>>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl ScoreModel for ReplayScores {
    fn scores(&mut self, step: usize, _state: &BeamState) -> Result<Array3<f32>> {
        self.steps.get(step).cloned().ok_or_else(|| {
            Error::value(
                "scores",
                &[step],
                step as i64,
                "no recorded scores for this step",
            )
        })
    }
}

/// Beam search over a step decoder.
#[derive(Clone, Debug)]
pub struct BeamSearch<D> {
    decoder: D,
    max_steps: Option<usize>,
}

impl<D: StepDecoder> BeamSearch<D> {
    pub fn new(decoder: D) -> Self {
        Self {
            decoder,
            max_steps: None,
        }
    }

    /// Cap the number of steps. `None` uses the decoder's own budget.
    pub fn with_max_steps(mut self, max_steps: Option<usize>) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Run from the initial beam: every slot at `(0, 0)`, only slot 0 live.
    pub fn run<M>(&self, model: &mut M, bounds: &Bounds) -> Result<SearchOutput>
    where
        M: ScoreModel + ?Sized,
    {
        let state = BeamState::initial(bounds.batch_size(), self.decoder.beam_width());
        self.run_from(model, state, bounds)
    }

    /// Run from a given beam until every hypothesis finishes or the step
    /// budget runs out.
    pub fn run_from<M>(
        &self,
        model: &mut M,
        mut state: BeamState,
        bounds: &Bounds,
    ) -> Result<SearchOutput>
    where
        M: ScoreModel + ?Sized,
    {
        state.validate()?;
        bounds.validate(state.batch_size())?;

        let batch_size = state.batch_size();
        let beam_width = state.beam_width();
        let budget = self
            .max_steps
            .unwrap_or_else(|| self.decoder.step_budget(bounds));

        let mut branches = Vec::new();
        let mut predictions = Vec::new();
        let mut ts = Vec::new();

        let mut step = 0;
        while step < budget && !state.all_finished() {
            let h = model.scores(step, &state)?;
            let out = self.decoder.step(&state, h.view(), bounds)?;

            tracing::debug!(
                step,
                active = out.state.active_count(),
                best = best_score(&out.state),
                "decoded step"
            );

            branches.push(out.beam_branch);
            predictions.push(out.prediction);
            ts.push(out.state.t.clone());
            state = out.state;
            step += 1;
        }

        tracing::info!(
            steps = step,
            budget,
            finished = state.all_finished(),
            "beam search done"
        );

        Ok(SearchOutput {
            branch_history: stack_steps(&branches, batch_size, beam_width)?,
            prediction_history: stack_steps(&predictions, batch_size, beam_width)?,
            t_history: stack_steps(&ts, batch_size, beam_width)?,
            state,
            steps: step,
        })
    }
}

fn best_score(state: &BeamState) -> f32 {
    state
        .log_prob
        .iter()
        .copied()
        .map(rank_score)
        .fold(f32::NEG_INFINITY, f32::max)
}

/// Final beam and per-step histories of a search; histories are
/// `(batch, steps, beam_width)`.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchOutput {
    pub state: BeamState,
    pub branch_history: Array3<i32>,
    pub prediction_history: Array3<i32>,
    pub t_history: Array3<i32>,
    pub steps: usize,
}

impl SearchOutput {
    /// Winning final slot per batch element.
    pub fn best_slots(&self) -> Array1<i32> {
        self.state.best_slots()
    }

    /// Ancestry of every final slot.
    pub fn ordered_branches(&self) -> Result<OrderedBranches> {
        order_beam_branch(self.best_slots().view(), self.branch_history.view())
    }

    /// Branch and `t` sequence of the winning path of each batch element.
    pub fn best_paths(&self) -> Result<BestPaths> {
        extract_best_paths(
            self.best_slots().view(),
            self.branch_history.view(),
            self.t_history.view(),
        )
    }

    /// Slot each final hypothesis occupied after every step,
    /// `(batch, beam_width, steps)`.
    pub fn lineage_slots(&self) -> Result<Array3<i32>> {
        let ordered = self.ordered_branches()?;
        let (batch_size, beam_width, steps) = ordered.paths.dim();

        // the parent read at step s + 1 is the slot held after step s
        Ok(Array3::from_shape_fn(
            (batch_size, beam_width, steps),
            |(b, w, s)| {
                if s + 1 < steps {
                    ordered.paths[[b, w, s + 1]]
                } else {
                    w as i32
                }
            },
        ))
    }

    /// Class predicted at every step along the winning lineage, `(batch, steps)`.
    pub fn best_predictions(&self) -> Result<Array2<i32>> {
        let slots = self.lineage_slots()?;
        let best = self.best_slots();
        let (batch_size, _, steps) = slots.dim();

        Ok(Array2::from_shape_fn((batch_size, steps), |(b, s)| {
            let slot = slots[[b, best[b] as usize, s]] as usize;
            self.prediction_history[[b, s, slot]]
        }))
    }

    /// Frames assigned at every step along each final slot's lineage,
    /// `(batch, beam_width, steps)`. Carried steps assign none.
    pub fn unit_durations(&self, transition: &DurationTransition) -> Result<Array3<i32>> {
        let slots = self.lineage_slots()?;
        let mut durations = Array3::zeros(slots.dim());

        for ((b, w, s), slot) in slots.indexed_iter() {
            let class = self.prediction_history[[b, s, *slot as usize]];
            durations[[b, w, s]] = transition.frames(class) as i32;
        }

        Ok(durations)
    }

    /// Frame-level source alignment of every final slot,
    /// `(batch, beam_width, max(output_length))`.
    ///
    /// Each slot covers `min(total_duration, output_length)` frames; the rest
    /// holds `out_of_range_source_index`.
    pub fn alignment(
        &self,
        transition: &DurationTransition,
        bounds: &Bounds,
        out_of_range_source_index: i32,
    ) -> Result<Array3<i32>> {
        let durations = self.unit_durations(transition)?;
        let (batch_size, beam_width, _) = durations.dim();
        ensure_shape(
            "output_length",
            &[batch_size],
            bounds.output_length.shape(),
        )?;

        let output_length = Array2::from_shape_fn((batch_size, beam_width), |(b, w)| {
            self.state.total_duration[[b, w]].min(bounds.output_length[b])
        });

        upsample_source_indexes(
            durations.view(),
            output_length.view(),
            bounds.max_output_length(),
            out_of_range_source_index,
        )
    }

    /// Final `log_prob` of the winning slot per batch element.
    pub fn best_scores(&self) -> Array1<f32> {
        let best = self.best_slots();
        self.state
            .log_prob
            .axis_iter(Axis(0))
            .zip(best.iter())
            .map(|(row, &w)| row[w as usize])
            .collect()
    }
}
