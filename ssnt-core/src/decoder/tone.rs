//! Tone-latent transitions: one tone label per source unit.

use crate::config::check_class_id;
use crate::decoder::{Expansion, Transition};
use crate::error::Result;
use crate::types::{Hypothesis, Limits};
use ndarray::ArrayView1;

/// Tone-class transition rule.
///
/// The frame position never moves; a hypothesis finishes when its unit
/// position reaches `input_length`.
#[derive(Clone, Copy, Debug)]
pub struct ToneTransition {
    tone_class_size: usize,
    empty_tone_id: i32,
}

impl ToneTransition {
    pub fn new(tone_class_size: usize, empty_tone_id: i32) -> Result<Self> {
        check_class_id("tone_class_size", "empty_tone_id", empty_tone_id, tone_class_size)?;
        Ok(Self {
            tone_class_size,
            empty_tone_id,
        })
    }

    pub fn empty_tone_id(&self) -> i32 {
        self.empty_tone_id
    }
}

impl Transition for ToneTransition {
    fn class_count(&self) -> usize {
        self.tone_class_size
    }

    fn carry_prediction(&self) -> i32 {
        self.empty_tone_id
    }

    fn expand(
        &self,
        parent: &Hypothesis,
        scores: ArrayView1<'_, f32>,
        limits: Limits,
        out: &mut Vec<Expansion>,
    ) -> Result<()> {
        let u = parent.u + 1;
        let is_finished = u >= limits.input_length;

        out.extend(scores.iter().enumerate().map(|(class, &score)| {
            let hypothesis = Hypothesis {
                u,
                log_prob: parent.log_prob + score,
                is_finished,
                ..*parent
            };
            (hypothesis, class as i32)
        }));
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
    use ndarray::{Array2, Axis, array};

    #[test]
    fn rejects_empty_tone_out_of_range() {
        assert!(matches!(
            ToneTransition::new(3, -1),
            Err(Error::Config(ConfigError::ClassIdOutOfRange { id: -1, .. }))
        ));
    }

    #[test]
    fn advances_unit_only() {
        let decoder = BeamStepDecoder::new(ToneTransition::new(3, 0).unwrap(), 3).unwrap();
        let state = BeamState {
            t: array![[7, 7, 7]],
            u: array![[0, 0, 0]],
            log_prob: array![[0.0, f32::NEG_INFINITY, f32::NEG_INFINITY]],
            is_finished: array![[false, false, false]],
            total_duration: Array2::zeros((1, 3)),
        };
        let h = array![[0.2f32, 0.5, 0.3], [0.3, 0.3, 0.4], [0.3, 0.3, 0.4]]
            .mapv(f32::ln)
            .insert_axis(Axis(0));
        let bounds = Bounds::new(array![2], array![0]);

        let out = decoder.step(&state, h.view(), &bounds).unwrap();

        assert_eq!(out.prediction, array![[1, 2, 0]]);
        assert_eq!(out.beam_branch, array![[0, 0, 0]]);
        assert_eq!(out.state.t, array![[7, 7, 7]]);
        assert_eq!(out.state.u, array![[1, 1, 1]]);
        assert_eq!(out.state.is_finished, array![[false, false, false]]);

        let out = decoder.step(&out.state, h.view(), &bounds).unwrap();

        assert_eq!(out.state.u, array![[2, 2, 2]]);
        assert_eq!(out.state.is_finished, array![[true, true, true]]);
    }

    #[test]
    fn finished_beam_keeps_empty_tone() {
        let decoder = BeamStepDecoder::new(ToneTransition::new(2, 1).unwrap(), 2).unwrap();
        let state = BeamState {
            t: array![[0, 0]],
            u: array![[2, 2]],
            log_prob: array![[-1.0, -2.0]],
            is_finished: array![[true, true]],
            total_duration: Array2::zeros((1, 2)),
        };
        let h = Array2::<f32>::zeros((2, 2)).insert_axis(Axis(0));
        let bounds = Bounds::new(array![2], array![0]);

        let out = decoder.step(&state, h.view(), &bounds).unwrap();

        assert_eq!(out.prediction, array![[1, 1]]);
        assert_eq!(out.state, state);
    }
}
