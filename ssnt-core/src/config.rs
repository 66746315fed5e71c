//! Decoder configuration.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Default beam width
const DEFAULT_BEAM_WIDTH: usize = 4;

/// Default number of duration classes
const DEFAULT_DURATION_CLASS_SIZE: usize = 5;

/// Default number of tone classes
const DEFAULT_TONE_CLASS_SIZE: usize = 5;

/// Score model variant driving the transition rule.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Two classes: shift (advance unit) and emit (advance frame)
    #[default]
    Binary,
    /// One class per duration bucket assigned to the current unit
    Duration,
    /// One class per tone label assigned to the current unit
    Tone,
}

/// How the duration variant fans out an unfinished hypothesis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpansionStrategy {
    /// One candidate per duration class, all ranked together
    Exhaustive,
    /// Only the arg-max duration class of each hypothesis
    Greedy,
}

impl ExpansionStrategy {
    /// `test_mode` selects greedy fan-out.
    pub fn from_test_mode(test_mode: bool) -> Self {
        if test_mode { Self::Greedy } else { Self::Exhaustive }
    }
}

/// Configuration for beam search decoding.
#[derive(clap::Args, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Number of hypotheses kept per batch element
    #[arg(long, default_value_t = DEFAULT_BEAM_WIDTH)]
    pub beam_width: usize,

    /// Transition model
    #[arg(long, value_enum, default_value_t = Variant::Binary)]
    pub variant: Variant,

    /// Number of duration classes (duration variant)
    #[arg(long, default_value_t = DEFAULT_DURATION_CLASS_SIZE)]
    pub duration_class_size: usize,

    /// Class that assigns zero frames to a unit (duration variant)
    #[arg(long, default_value_t = 0)]
    pub zero_duration_id: i32,

    /// Frames per duration class, comma separated (default: class index)
    #[arg(long, value_delimiter = ',')]
    pub duration_table: Option<Vec<i32>>,

    /// Expand only the arg-max duration class of each hypothesis
    #[arg(long)]
    pub test_mode: bool,

    /// Number of tone classes (tone variant)
    #[arg(long, default_value_t = DEFAULT_TONE_CLASS_SIZE)]
    pub tone_class_size: usize,

    /// Class recorded for units without a tone (tone variant)
    #[arg(long, default_value_t = 0)]
    pub empty_tone_id: i32,

    /// Decode step budget (default: derived from the input and output lengths)
    #[arg(long)]
    pub max_steps: Option<usize>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            beam_width: DEFAULT_BEAM_WIDTH,
            variant: Variant::Binary,
            duration_class_size: DEFAULT_DURATION_CLASS_SIZE,
            zero_duration_id: 0,
            duration_table: None,
            test_mode: false,
            tone_class_size: DEFAULT_TONE_CLASS_SIZE,
            empty_tone_id: 0,
            max_steps: None,
        }
    }
}

impl DecoderConfig {
    pub fn expansion_strategy(&self) -> ExpansionStrategy {
        ExpansionStrategy::from_test_mode(self.test_mode)
    }

    /// Number of score classes per slot for the configured variant.
    pub fn class_count(&self) -> usize {
        match self.variant {
            Variant::Binary => 2,
            Variant::Duration => self.duration_class_size,
            Variant::Tone => self.tone_class_size,
        }
    }

    /// Check the fields used by the configured variant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.beam_width == 0 {
            return Err(ConfigError::ZeroBeamWidth);
        }

        match self.variant {
            Variant::Binary => Ok(()),
            Variant::Duration => {
                check_class_id(
                    "duration_class_size",
                    "zero_duration_id",
                    self.zero_duration_id,
                    self.duration_class_size,
                )?;
                match &self.duration_table {
                    Some(table) => check_duration_table(table, self.duration_class_size),
                    None => Ok(()),
                }
            }
            Variant::Tone => check_class_id(
                "tone_class_size",
                "empty_tone_id",
                self.empty_tone_id,
                self.tone_class_size,
            ),
        }
    }
}

pub(crate) fn check_class_id(
    size_name: &'static str,
    id_name: &'static str,
    id: i32,
    size: usize,
) -> Result<(), ConfigError> {
    if size == 0 {
        return Err(ConfigError::ZeroClassSize { name: size_name });
    }
    if id < 0 || id as usize >= size {
        return Err(ConfigError::ClassIdOutOfRange {
            name: id_name,
            id,
            size,
        });
    }
    Ok(())
}

pub(crate) fn check_duration_table(table: &[i32], class_size: usize) -> Result<(), ConfigError> {
    if table.len() != class_size {
        return Err(ConfigError::DurationTableLength {
            expected: class_size,
            got: table.len(),
        });
    }
    match table.iter().position(|&d| d < 0) {
        Some(index) => Err(ConfigError::NegativeDuration {
            index,
            value: table[index],
        }),
        None => Ok(()),
    }
}
