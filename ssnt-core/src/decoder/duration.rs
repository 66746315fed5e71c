//! Duration-class transitions with an explicit per-unit duration model.
//!
//! Each step assigns one duration class to the current source unit and moves
//! to the next unit. The class maps to a frame count through the duration
//! table; the zero-duration class always maps to zero frames. Classes that
//! would push `total_duration` past `output_length` are never generated, so the
//! zero-duration class is always open to an unfinished hypothesis.

use crate::config::{DecoderConfig, ExpansionStrategy, check_class_id, check_duration_table};
use crate::decoder::{Expansion, Transition};
use crate::error::Result;
use crate::types::{Hypothesis, Limits, rank_score};
use ndarray::ArrayView1;

/// Duration-class transition rule.
#[derive(Clone, Debug)]
pub struct DurationTransition {
    /// Frames assigned by each class
    table: Vec<usize>,
    zero_duration_id: usize,
    strategy: ExpansionStrategy,
}

impl DurationTransition {
    /// Create a transition over `class_size` classes.
    ///
    /// `table` maps each class to a frame count and defaults to the class index.
    pub fn new(
        class_size: usize,
        zero_duration_id: i32,
        table: Option<&[i32]>,
        strategy: ExpansionStrategy,
    ) -> Result<Self> {
        check_class_id(
            "duration_class_size",
            "zero_duration_id",
            zero_duration_id,
            class_size,
        )?;

        let zero_duration_id = zero_duration_id as usize;
        let table = match table {
            Some(table) => {
                check_duration_table(table, class_size)?;
                table.iter().map(|&d| d as usize).collect()
            }
            None => (0..class_size).collect(),
        };

        Ok(Self {
            table,
            zero_duration_id,
            strategy,
        })
    }

    pub fn from_config(config: &DecoderConfig) -> Result<Self> {
        Self::new(
            config.duration_class_size,
            config.zero_duration_id,
            config.duration_table.as_deref(),
            config.expansion_strategy(),
        )
    }

    pub fn strategy(&self) -> ExpansionStrategy {
        self.strategy
    }

    pub fn zero_duration_id(&self) -> i32 {
        self.zero_duration_id as i32
    }

    /// Frames assigned by a predicted class. Sentinels and out-of-range classes
    /// assign none.
    pub fn frames(&self, class: i32) -> usize {
        if class < 0 || class as usize == self.zero_duration_id {
            return 0;
        }
        self.table.get(class as usize).copied().unwrap_or(0)
    }

    /// Whether `class` keeps `total_duration` within `output_length`.
    fn fits(&self, parent: &Hypothesis, class: usize, limits: Limits) -> bool {
        parent.total_duration + self.frames(class as i32) <= limits.output_length
    }

    fn successor(&self, parent: &Hypothesis, class: usize, score: f32, limits: Limits) -> Expansion {
        let frames = self.frames(class as i32);
        let u = parent.u + 1;
        let total_duration = parent.total_duration + frames;

        let hypothesis = Hypothesis {
            t: parent.t + frames,
            u,
            log_prob: parent.log_prob + score,
            is_finished: u >= limits.input_length || total_duration >= limits.output_length,
            total_duration,
        };

        (hypothesis, class as i32)
    }
}

impl Transition for DurationTransition {
    fn class_count(&self) -> usize {
        self.table.len()
    }

    fn carry_prediction(&self) -> i32 {
        self.zero_duration_id as i32
    }

    fn expand(
        &self,
        parent: &Hypothesis,
        scores: ArrayView1<'_, f32>,
        limits: Limits,
        out: &mut Vec<Expansion>,
    ) -> Result<()> {
        match self.strategy {
            ExpansionStrategy::Exhaustive => {
                out.extend(
                    scores
                        .iter()
                        .enumerate()
                        .filter(|&(class, _)| self.fits(parent, class, limits))
                        .map(|(class, &score)| self.successor(parent, class, score, limits)),
                );
            }
            ExpansionStrategy::Greedy => {
                // first class wins ties, so an all-NaN row picks the first open class
                let best = scores
                    .iter()
                    .enumerate()
                    .filter(|&(class, _)| self.fits(parent, class, limits))
                    .fold(None, |best: Option<(usize, f32)>, (class, &score)| {
                        let score = rank_score(score);
                        match best {
                            Some((_, top)) if score <= top => best,
                            _ => Some((class, score)),
                        }
                    });
                if let Some((class, _)) = best {
                    out.push(self.successor(parent, class, scores[class], limits));
                }
            }
        }
        Ok(())
    }

    fn step_budget(&self, limits: Limits) -> usize {
        limits.input_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{BeamStepDecoder, StepDecoder};
    use crate::error::{ConfigError, Error};
    use crate::types::{BeamState, Bounds};
    use ndarray::{Array2, Array3, Axis, array, s};

    fn transition(strategy: ExpansionStrategy) -> DurationTransition {
        DurationTransition::new(4, 0, None, strategy).unwrap()
    }

    fn scores(rows: &[[f32; 4]]) -> Array3<f32> {
        Array2::from_shape_fn((rows.len(), 4), |(w, c)| rows[w][c].ln()).insert_axis(Axis(0))
    }

    #[test]
    fn default_table_is_class_index() {
        let transition = transition(ExpansionStrategy::Exhaustive);

        assert_eq!(transition.frames(3), 3);
        assert_eq!(transition.frames(0), 0);
        assert_eq!(transition.frames(-1), 0);
        assert_eq!(transition.frames(9), 0);
    }

    #[test]
    fn zero_duration_class_assigns_no_frames() {
        let transition =
            DurationTransition::new(3, 2, Some(&[1, 2, 5]), ExpansionStrategy::Exhaustive).unwrap();

        assert_eq!(transition.frames(0), 1);
        assert_eq!(transition.frames(2), 0);
    }

    #[test]
    fn rejects_negative_table_entry() {
        assert!(matches!(
            DurationTransition::new(2, 0, Some(&[0, -1]), ExpansionStrategy::Exhaustive),
            Err(Error::Config(ConfigError::NegativeDuration { index: 1, value: -1 }))
        ));
    }

    #[test]
    fn exhaustive_ranks_every_class() {
        let decoder = BeamStepDecoder::new(transition(ExpansionStrategy::Exhaustive), 2).unwrap();
        let state = BeamState::initial(1, 2);
        let h = scores(&[[0.1, 0.2, 0.3, 0.4], [0.25, 0.25, 0.25, 0.25]]);
        let bounds = Bounds::new(array![3], array![10]);

        let out = decoder.step(&state, h.view(), &bounds).unwrap();

        assert_eq!(out.prediction, array![[3, 2]]);
        assert_eq!(out.beam_branch, array![[0, 0]]);
        assert_eq!(out.state.t, array![[3, 2]]);
        assert_eq!(out.state.u, array![[1, 1]]);
        assert_eq!(out.state.total_duration, array![[3, 2]]);
    }

    #[test]
    fn greedy_expands_arg_max_per_hypothesis() {
        let decoder = BeamStepDecoder::new(transition(ExpansionStrategy::Greedy), 2).unwrap();
        let state = BeamState {
            t: array![[0, 0]],
            u: array![[0, 0]],
            log_prob: array![[-0.1, -0.2]],
            is_finished: array![[false, false]],
            total_duration: array![[0, 0]],
        };
        let h = scores(&[[0.1, 0.2, 0.3, 0.4], [0.1, 0.7, 0.1, 0.1]]);
        let bounds = Bounds::new(array![3], array![10]);

        let out = decoder.step(&state, h.view(), &bounds).unwrap();

        // one candidate per slot: slot 1 class 1 outscores slot 0 class 3
        assert_eq!(out.beam_branch, array![[1, 0]]);
        assert_eq!(out.prediction, array![[1, 3]]);
        assert_eq!(out.state.total_duration, array![[1, 3]]);
    }

    #[test]
    fn finishes_on_input_or_output_length() {
        let decoder = BeamStepDecoder::new(transition(ExpansionStrategy::Exhaustive), 4).unwrap();
        let state = BeamState {
            t: array![[3, 0, 0, 0]],
            u: array![[1, 0, 0, 0]],
            log_prob: array![[0.0, f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY]],
            is_finished: array![[false, false, false, false]],
            total_duration: array![[3, 0, 0, 0]],
        };
        let h = scores(&[[0.4, 0.3, 0.2, 0.1]; 4]);
        let bounds = Bounds::new(array![4], array![5]);

        let out = decoder.step(&state, h.view(), &bounds).unwrap();

        // class 3 would reach 6 frames and is dropped; slot 1 fills the last place
        assert_eq!(out.beam_branch, array![[0, 0, 0, 1]]);
        assert_eq!(out.prediction, array![[0, 1, 2, 0]]);
        assert_eq!(out.state.total_duration, array![[3, 4, 5, 0]]);
        assert_eq!(out.state.is_finished, array![[false, false, true, false]]);
    }

    #[test]
    fn never_selects_a_class_past_output_length() {
        for strategy in [ExpansionStrategy::Exhaustive, ExpansionStrategy::Greedy] {
            let transition = DurationTransition::new(5, 0, None, strategy).unwrap();
            let decoder = BeamStepDecoder::new(transition, 1).unwrap();
            let state = BeamState::initial(1, 1);
            let h = Array2::from_shape_fn((1, 5), |(_, c)| [0.05f32, 0.1, 0.2, 0.05, 0.6][c].ln())
                .insert_axis(Axis(0));
            let bounds = Bounds::new(array![3], array![2]);

            let out = decoder.step(&state, h.view(), &bounds).unwrap();

            // class 4 scores best but would assign 4 frames to a 2-frame output
            assert_eq!(out.prediction, array![[2]], "{strategy:?}");
            assert_eq!(out.state.total_duration, array![[2]]);
            assert_eq!(out.state.t, array![[2]]);
            assert!(out.state.is_finished[[0, 0]]);
        }
    }

    #[test]
    fn greedy_treats_nan_row_as_neg_infinity() {
        let decoder = BeamStepDecoder::new(transition(ExpansionStrategy::Greedy), 2).unwrap();
        let state = BeamState {
            t: array![[0, 0]],
            u: array![[0, 0]],
            log_prob: array![[-0.1, -0.2]],
            is_finished: array![[false, false]],
            total_duration: array![[0, 0]],
        };
        let mut h = scores(&[[0.1, 0.2, 0.3, 0.4], [0.25; 4]]);
        h.slice_mut(s![0, 1, ..]).fill(f32::NAN);
        let bounds = Bounds::new(array![3], array![10]);

        let out = decoder.step(&state, h.view(), &bounds).unwrap();

        assert_eq!(out.beam_branch, array![[0, 1]]);
        assert_eq!(out.prediction, array![[3, 0]]);
        assert!(out.state.log_prob[[0, 1]].is_nan());
    }

    #[test]
    fn carried_slots_predict_zero_duration() {
        let transition =
            DurationTransition::new(3, 1, None, ExpansionStrategy::Exhaustive).unwrap();
        let decoder = BeamStepDecoder::new(transition, 2).unwrap();
        let state = BeamState {
            t: array![[4, 0]],
            u: array![[2, 0]],
            log_prob: array![[-0.5, -9.0]],
            is_finished: array![[true, false]],
            total_duration: array![[4, 0]],
        };
        let h = Array2::from_elem((2, 3), (1.0f32 / 3.0).ln()).insert_axis(Axis(0));
        let bounds = Bounds::new(array![2], array![4]);

        let out = decoder.step(&state, h.view(), &bounds).unwrap();

        assert_eq!(out.beam_branch, array![[0, 1]]);
        assert_eq!(out.prediction, array![[1, 0]]);
        assert_eq!(out.state.t, array![[4, 0]]);
    }
}
