//! Binary shift/emit transitions.

use crate::decoder::{Expansion, Transition};
use crate::error::Result;
use crate::types::{Hypothesis, Limits};
use ndarray::ArrayView1;

/// Class 0: advance the source unit, keep the frame.
pub const SHIFT: i32 = 0;

/// Class 1: advance the frame, keep the source unit.
pub const EMIT: i32 = 1;

/// Prediction of a carried finished hypothesis.
pub const NO_PREDICTION: i32 = -1;

/// Shift/emit transition rule.
///
/// A candidate finishes once its unit position reaches `input_length` or its
/// frame position reaches `output_length`, evaluated on the successor.
#[derive(Clone, Copy, Debug, Default)]
pub struct BinaryTransition;

impl BinaryTransition {
    fn successor(parent: &Hypothesis, t: usize, u: usize, score: f32, limits: Limits) -> Hypothesis {
        Hypothesis {
            t,
            u,
            log_prob: parent.log_prob + score,
            is_finished: u >= limits.input_length || t >= limits.output_length,
            total_duration: parent.total_duration,
        }
    }
}

impl Transition for BinaryTransition {
    fn class_count(&self) -> usize {
        2
    }

    fn carry_prediction(&self) -> i32 {
        NO_PREDICTION
    }

    fn expand(
        &self,
        parent: &Hypothesis,
        scores: ArrayView1<'_, f32>,
        limits: Limits,
        out: &mut Vec<Expansion>,
    ) -> Result<()> {
        let shift = Self::successor(parent, parent.t, parent.u + 1, scores[0], limits);
        let emit = Self::successor(parent, parent.t + 1, parent.u, scores[1], limits);
        out.push((shift, SHIFT));
        out.push((emit, EMIT));
        Ok(())
    }

    fn step_budget(&self, limits: Limits) -> usize {
        limits.input_length + limits.output_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{BeamStepDecoder, StepDecoder};
    use crate::types::{BeamState, Bounds};
    use ndarray::{Array2, Array3, array};

    fn ln(rows: &[[f32; 2]]) -> Array2<f32> {
        Array2::from_shape_fn((rows.len(), 2), |(w, c)| rows[w][c].ln())
    }

    fn bounds(input_length: i32, output_length: i32) -> Bounds {
        Bounds::new(array![input_length], array![output_length])
    }

    #[test]
    fn width_one_is_greedy() {
        let decoder = BeamStepDecoder::new(BinaryTransition, 1).unwrap();
        let bounds = bounds(10, 10);
        let mut state = BeamState::initial(1, 1);

        for _ in 0..4 {
            let h = ln(&[[0.1, 0.9]]).insert_axis(ndarray::Axis(0));
            let out = decoder.step(&state, h.view(), &bounds).unwrap();

            assert_eq!(out.prediction[[0, 0]], EMIT);
            assert_eq!(out.beam_branch[[0, 0]], 0);
            state = out.state;
        }

        assert_eq!(state.t[[0, 0]], 4);
        assert_eq!(state.u[[0, 0]], 0);
        assert!((state.log_prob[[0, 0]] - 4.0 * 0.9f32.ln()).abs() < 1e-5);
    }

    #[test]
    fn expands_and_records_parents() {
        let decoder = BeamStepDecoder::new(BinaryTransition, 2).unwrap();
        let state = BeamState {
            t: array![[0, 1]],
            u: array![[1, 0]],
            log_prob: array![[-1.0, -0.5]],
            is_finished: array![[false, false]],
            total_duration: Array2::zeros((1, 2)),
        };
        let h = ln(&[[0.5, 0.5], [0.8, 0.2]]).insert_axis(ndarray::Axis(0));

        let out = decoder.step(&state, h.view(), &bounds(5, 5)).unwrap();

        // slot 1 shift: -0.5 + ln 0.8, slot 0 shift/emit: -1.0 + ln 0.5
        assert_eq!(out.beam_branch, array![[1, 0]]);
        assert_eq!(out.prediction, array![[SHIFT, SHIFT]]);
        assert_eq!(out.state.t, array![[1, 0]]);
        assert_eq!(out.state.u, array![[1, 2]]);
    }

    #[test]
    fn finishes_on_successor_bounds() {
        let decoder = BeamStepDecoder::new(BinaryTransition, 2).unwrap();
        let state = BeamState {
            t: array![[0, 0]],
            u: array![[2, 0]],
            log_prob: array![[0.0, f32::NEG_INFINITY]],
            is_finished: array![[false, false]],
            total_duration: Array2::zeros((1, 2)),
        };
        let h = ln(&[[0.6, 0.4], [0.5, 0.5]]).insert_axis(ndarray::Axis(0));

        let out = decoder.step(&state, h.view(), &bounds(3, 4)).unwrap();

        // shift reaches u == input_length, emit stays inside
        assert_eq!(out.prediction, array![[SHIFT, EMIT]]);
        assert_eq!(out.state.is_finished, array![[true, false]]);
    }

    #[test]
    fn finished_slots_are_carried_once() {
        let decoder = BeamStepDecoder::new(BinaryTransition, 3).unwrap();
        let state = BeamState {
            t: array![[2, 1, 0]],
            u: array![[3, 1, 0]],
            log_prob: array![[-0.1, -2.0, -5.0]],
            is_finished: array![[true, false, false]],
            total_duration: Array2::zeros((1, 3)),
        };
        let h = ln(&[[0.5, 0.5], [0.5, 0.5], [0.5, 0.5]]).insert_axis(ndarray::Axis(0));

        let out = decoder.step(&state, h.view(), &bounds(3, 3)).unwrap();

        assert_eq!(out.beam_branch, array![[0, 1, 1]]);
        assert_eq!(out.prediction, array![[NO_PREDICTION, SHIFT, EMIT]]);
        assert_eq!(out.state.log_prob[[0, 0]], -0.1);
        assert!(out.state.is_finished[[0, 0]]);
    }

    #[test]
    fn all_finished_is_identity() {
        let decoder = BeamStepDecoder::new(BinaryTransition, 3).unwrap();
        let state = BeamState {
            t: array![[2, 1, 3]],
            u: array![[3, 3, 3]],
            log_prob: array![[-4.0, -1.0, -2.0]],
            is_finished: array![[true, true, true]],
            total_duration: Array2::zeros((1, 3)),
        };
        let h = Array3::<f32>::zeros((1, 3, 2));

        let out = decoder.step(&state, h.view(), &bounds(3, 3)).unwrap();

        assert_eq!(out.state, state);
        assert_eq!(out.beam_branch, array![[0, 1, 2]]);
        assert_eq!(out.prediction, array![[NO_PREDICTION, NO_PREDICTION, NO_PREDICTION]]);
    }

    #[test]
    fn rejects_wrong_class_count() {
        let decoder = BeamStepDecoder::new(BinaryTransition, 2).unwrap();
        let state = BeamState::initial(1, 2);
        let h = Array3::<f32>::zeros((1, 2, 3));

        assert!(matches!(
            decoder.step(&state, h.view(), &bounds(3, 3)),
            Err(crate::error::Error::InvalidShape { name: "h", .. })
        ));
    }
}
