//! Core types for ssnt-core.
//!
//! Beam state crosses the API boundary as dense `(batch, beam_width)` arrays of
//! 32-bit integers, floats and flags. Inside one batch element the decoder works
//! on [`Hypothesis`] values read out of those arrays.

use crate::error::{Result, ensure_non_negative, ensure_shape};
use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView2, Axis};

/// One beam slot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hypothesis {
    /// Output frame position
    pub t: usize,
    /// Source unit position
    pub u: usize,
    /// Cumulative log-probability
    pub log_prob: f32,
    /// Terminal flag, absorbing once set
    pub is_finished: bool,
    /// Frames assigned to source units so far (duration variant)
    pub total_duration: usize,
}

impl Hypothesis {
    /// Fresh hypothesis at `(0, 0)` with the given score.
    pub fn start(log_prob: f32) -> Self {
        Self {
            t: 0,
            u: 0,
            log_prob,
            is_finished: false,
            total_duration: 0,
        }
    }
}

/// Hypotheses of one batch element, ordered by slot.
pub type Beam = Vec<Hypothesis>;

/// Source and output bounds of one batch element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    /// Number of source units
    pub input_length: usize,
    /// Number of output frames
    pub output_length: usize,
}

/// Per-batch-element lengths, each shaped `(batch,)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Bounds {
    pub input_length: Array1<i32>,
    pub output_length: Array1<i32>,
}

impl Bounds {
    pub fn new(input_length: Array1<i32>, output_length: Array1<i32>) -> Self {
        Self {
            input_length,
            output_length,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.input_length.len()
    }

    /// Check both length vectors against the batch size.
    pub fn validate(&self, batch_size: usize) -> Result<()> {
        ensure_shape("input_length", &[batch_size], self.input_length.shape())?;
        ensure_shape("output_length", &[batch_size], self.output_length.shape())?;
        ensure_non_negative("input_length", self.input_length.view())?;
        ensure_non_negative("output_length", self.output_length.view())
    }

    /// Limits of batch element `b`. Call after [`Bounds::validate`].
    pub fn limits(&self, b: usize) -> Limits {
        Limits {
            input_length: self.input_length[b] as usize,
            output_length: self.output_length[b] as usize,
        }
    }

    pub fn max_input_length(&self) -> usize {
        self.input_length.iter().copied().max().unwrap_or(0).max(0) as usize
    }

    pub fn max_output_length(&self) -> usize {
        self.output_length.iter().copied().max().unwrap_or(0).max(0) as usize
    }
}

/// Dense beam state for a batch; every field is shaped `(batch, beam_width)`.
#[derive(Clone, Debug, PartialEq)]
pub struct BeamState {
    pub t: Array2<i32>,
    pub u: Array2<i32>,
    pub log_prob: Array2<f32>,
    pub is_finished: Array2<bool>,
    pub total_duration: Array2<i32>,
}

impl BeamState {
    /// Initial state: slot 0 starts at log-probability 0, the remaining slots at
    /// `-inf` so the first expansion does not fill the beam with copies.
    pub fn initial(batch_size: usize, beam_width: usize) -> Self {
        let log_prob = Array2::from_shape_fn((batch_size, beam_width), |(_, w)| {
            if w == 0 { 0.0 } else { f32::NEG_INFINITY }
        });

        Self {
            t: Array2::zeros((batch_size, beam_width)),
            u: Array2::zeros((batch_size, beam_width)),
            log_prob,
            is_finished: Array2::from_elem((batch_size, beam_width), false),
            total_duration: Array2::zeros((batch_size, beam_width)),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.log_prob.nrows()
    }

    pub fn beam_width(&self) -> usize {
        self.log_prob.ncols()
    }

    /// Check that all fields share one `(batch, beam_width)` shape and that
    /// positions are non-negative.
    pub fn validate(&self) -> Result<()> {
        let shape = self.log_prob.shape();
        ensure_shape("t", shape, self.t.shape())?;
        ensure_shape("u", shape, self.u.shape())?;
        ensure_shape("is_finished", shape, self.is_finished.shape())?;
        ensure_shape("total_duration", shape, self.total_duration.shape())?;
        ensure_non_negative("t", self.t.view())?;
        ensure_non_negative("u", self.u.view())?;
        ensure_non_negative("total_duration", self.total_duration.view())
    }

    /// Read the beam of batch element `b`. Call after [`BeamState::validate`].
    pub fn beam(&self, b: usize) -> Beam {
        (0..self.beam_width())
            .map(|w| Hypothesis {
                t: self.t[[b, w]] as usize,
                u: self.u[[b, w]] as usize,
                log_prob: self.log_prob[[b, w]],
                is_finished: self.is_finished[[b, w]],
                total_duration: self.total_duration[[b, w]] as usize,
            })
            .collect()
    }

    /// Rebuild dense state from per-batch beams of equal width.
    pub fn from_beams(beams: &[Beam]) -> Self {
        let batch_size = beams.len();
        let beam_width = beams.first().map_or(0, Vec::len);
        let at = |f: fn(&Hypothesis) -> i32| {
            Array2::from_shape_fn((batch_size, beam_width), |(b, w)| f(&beams[b][w]))
        };

        Self {
            t: at(|h| h.t as i32),
            u: at(|h| h.u as i32),
            log_prob: Array2::from_shape_fn((batch_size, beam_width), |(b, w)| {
                beams[b][w].log_prob
            }),
            is_finished: Array2::from_shape_fn((batch_size, beam_width), |(b, w)| {
                beams[b][w].is_finished
            }),
            total_duration: at(|h| h.total_duration as i32),
        }
    }

    /// True when every hypothesis of every batch element has finished.
    pub fn all_finished(&self) -> bool {
        self.is_finished.iter().all(|&f| f)
    }

    /// Number of unfinished hypotheses across the batch.
    pub fn active_count(&self) -> usize {
        self.is_finished.iter().filter(|&&f| !f).count()
    }

    /// Per batch element, the slot holding the best hypothesis.
    ///
    /// A finished hypothesis with a finite score outranks everything else;
    /// otherwise the higher `log_prob` wins and the lower slot wins exact ties.
    /// A finished `-inf` slot never beats a finite unfinished one.
    pub fn best_slots(&self) -> Array1<i32> {
        self.log_prob
            .axis_iter(Axis(0))
            .zip(self.is_finished.axis_iter(Axis(0)))
            .map(|(log_prob, is_finished)| best_slot(log_prob, is_finished) as i32)
            .collect()
    }
}

fn best_slot(log_prob: ArrayView1<'_, f32>, is_finished: ArrayView1<'_, bool>) -> usize {
    let key = |w: usize| {
        let score = rank_score(log_prob[w]);
        (is_finished[w] && score.is_finite(), score)
    };
    (0..log_prob.len()).fold(0, |best, w| {
        let (best_finished, best_score) = key(best);
        let (finished, score) = key(w);
        if (finished && !best_finished) || (finished == best_finished && score > best_score) {
            w
        } else {
            best
        }
    })
}

/// Score used for ranking: NaN ranks as `-inf`.
pub fn rank_score(log_prob: f32) -> f32 {
    if log_prob.is_nan() {
        f32::NEG_INFINITY
    } else {
        log_prob
    }
}

/// Output of one decode step for a batch; every array is `(batch, beam_width)`.
#[derive(Clone, Debug, PartialEq)]
pub struct StepOutput {
    /// New beam state
    pub state: BeamState,
    /// Class chosen by each new hypothesis, or the variant's sentinel
    pub prediction: Array2<i32>,
    /// Parent slot of each new hypothesis in the previous beam
    pub beam_branch: Array2<i32>,
}

/// Stack equally-shaped per-batch matrices into one `(batch, rows, cols)` array.
pub(crate) fn stack_batches(
    parts: Vec<Array2<i32>>,
    rows: usize,
    cols: usize,
) -> Result<Array3<i32>> {
    let batch_size = parts.len();
    let data: Vec<i32> = parts.into_iter().flat_map(|part| part.into_iter()).collect();
    Ok(Array3::from_shape_vec((batch_size, rows, cols), data)?)
}

/// Stack per-step `(batch, beam_width)` matrices into `(batch, steps, beam_width)`.
pub(crate) fn stack_steps(
    steps: &[Array2<i32>],
    batch_size: usize,
    beam_width: usize,
) -> Result<Array3<i32>> {
    if steps.is_empty() {
        return Ok(Array3::zeros((batch_size, 0, beam_width)));
    }
    let views: Vec<ArrayView2<'_, i32>> = steps.iter().map(|s| s.view()).collect();
    Ok(ndarray::stack(Axis(1), &views)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use ndarray::array;

    #[test]
    fn initial_state_seeds_only_first_slot() {
        let state = BeamState::initial(2, 3);

        assert_eq!(state.batch_size(), 2);
        assert_eq!(state.beam_width(), 3);
        assert_eq!(state.log_prob[[1, 0]], 0.0);
        assert_eq!(state.log_prob[[1, 2]], f32::NEG_INFINITY);
        assert_eq!(state.active_count(), 6);
        assert!(state.validate().is_ok());
    }

    #[test]
    fn rejects_mismatched_fields() {
        let mut state = BeamState::initial(1, 3);
        state.u = Array2::zeros((1, 2));

        match state.validate() {
            Err(Error::InvalidShape { name: "u", .. }) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_negative_positions() {
        let mut state = BeamState::initial(1, 2);
        state.t[[0, 1]] = -3;

        match state.validate() {
            Err(Error::InvalidValue {
                name: "t",
                index,
                value: -3,
                ..
            }) => assert_eq!(index, vec![0, 1]),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn beams_round_trip_through_dense_state() {
        let state = BeamState {
            t: array![[1, 2]],
            u: array![[3, 4]],
            log_prob: array![[-0.5, -1.5]],
            is_finished: array![[false, true]],
            total_duration: array![[1, 2]],
        };

        let beam = state.beam(0);
        assert_eq!(beam[1].u, 4);
        assert!(beam[1].is_finished);
        assert_eq!(BeamState::from_beams(&[beam]), state);
    }

    #[test]
    fn best_slot_prefers_finished_then_score() {
        let state = BeamState {
            t: Array2::zeros((2, 3)),
            u: Array2::zeros((2, 3)),
            log_prob: array![[-0.1, -2.0, -1.0], [-3.0, f32::NAN, -3.0]],
            is_finished: array![[false, true, true], [false, false, false]],
            total_duration: Array2::zeros((2, 3)),
        };

        assert_eq!(state.best_slots(), array![2, 0]);
    }

    #[test]
    fn finished_neg_infinity_loses_to_finite_score() {
        let state = BeamState {
            t: Array2::zeros((1, 3)),
            u: Array2::zeros((1, 3)),
            log_prob: array![[f32::NEG_INFINITY, -4.0, f32::NAN]],
            is_finished: array![[true, false, true]],
            total_duration: Array2::zeros((1, 3)),
        };

        assert_eq!(state.best_slots(), array![1]);
    }

    #[test]
    fn bounds_reject_wrong_batch() {
        let bounds = Bounds::new(array![3, 4], array![5]);

        assert!(matches!(
            bounds.validate(2),
            Err(Error::InvalidShape {
                name: "output_length",
                ..
            })
        ));
    }
}
