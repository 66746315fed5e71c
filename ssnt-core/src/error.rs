//! Error types for ssnt-core organized by failure kind.

use ndarray::{ArrayView, Dimension, IntoDimension, ShapeError};
use thiserror::Error;

/// Decoding, backtrace and upsampling error variants.
#[derive(Debug, Error)]
pub enum Error {
    /// Input rank or dimension does not match the expected layout
    #[error("invalid shape for {name}: expected {expected:?}, got {got:?}")]
    InvalidShape {
        name: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    /// Scalar input outside its domain
    #[error("invalid value for {name} at {index:?}: {value} ({reason})")]
    InvalidValue {
        name: &'static str,
        index: Vec<usize>,
        value: i64,
        reason: &'static str,
    },

    /// Branch trail points outside the beam
    #[error(
        "corrupt backtrace at batch {batch}, step {step}, slot {slot}: \
         branch {value} not in [0, {beam_width})"
    )]
    CorruptBacktrace {
        batch: usize,
        step: usize,
        slot: usize,
        value: i32,
        beam_width: usize,
    },

    /// A decode step produced no candidates for a batch element
    #[error("no candidates produced for batch {batch}")]
    EmptyBeam { batch: usize },

    /// Decoder configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// ndarray shape error
    #[error(transparent)]
    Array(#[from] ShapeError),
}

/// Decoder configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Beam must hold at least one hypothesis
    #[error("beam width must be at least 1")]
    ZeroBeamWidth,

    /// Score rows must hold at least one class
    #[error("{name} must be at least 1")]
    ZeroClassSize { name: &'static str },

    /// Reserved class id does not index into the class range
    #[error("{name} {id} out of range for {size} classes")]
    ClassIdOutOfRange {
        name: &'static str,
        id: i32,
        size: usize,
    },

    /// Duration table does not cover every duration class
    #[error("duration table has {got} entries, expected {expected}")]
    DurationTableLength { expected: usize, got: usize },

    /// Duration table entry is negative
    #[error("duration table entry {index} is negative: {value}")]
    NegativeDuration { index: usize, value: i32 },
}

/// Result type alias for ssnt-core operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn shape(name: &'static str, expected: &[usize], got: &[usize]) -> Self {
        Error::InvalidShape {
            name,
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    pub(crate) fn value(
        name: &'static str,
        index: &[usize],
        value: impl Into<i64>,
        reason: &'static str,
    ) -> Self {
        Error::InvalidValue {
            name,
            index: index.to_vec(),
            value: value.into(),
            reason,
        }
    }
}

/// Check that `got` equals `expected`, reporting `name` on mismatch.
pub(crate) fn ensure_shape(name: &'static str, expected: &[usize], got: &[usize]) -> Result<()> {
    if expected == got {
        Ok(())
    } else {
        Err(Error::shape(name, expected, got))
    }
}

/// Check that every entry of a length/count tensor is non-negative.
pub(crate) fn ensure_non_negative<D: Dimension>(
    name: &'static str,
    values: ArrayView<'_, i32, D>,
) -> Result<()> {
    match values.indexed_iter().find(|(_, v)| **v < 0) {
        Some((index, v)) => Err(Error::value(
            name,
            index.into_dimension().slice(),
            *v,
            "must be non-negative",
        )),
        None => Ok(()),
    }
}
