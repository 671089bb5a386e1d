//! Calibration configuration and bit-width growth accounting
//!
//! `NBits` mirrors the public quantization knob: a single width applied to
//! both inputs and weights, or independent widths for each. The accumulator
//! helpers propagate integer growth through accumulating operations so that
//! calibration can reject graphs that would exceed the compiler ceiling
//! instead of overflowing silently.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Widths allowed for input and weight quantization
///
/// Capped at 24 bits so that squared-distance accumulators always fit an
/// `i64` with headroom for the term-count growth.
pub const MAX_N_BITS: u32 = 24;

/// Bit-width configuration for inputs and weights
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NBits {
    /// One width applied to both inputs and weights
    Single(u32),
    /// Independent widths for operation inputs and learned parameters
    PerOp {
        /// Width for input values
        op_inputs: u32,
        /// Width for learned parameters
        op_weights: u32,
    },
}

impl Default for NBits {
    fn default() -> Self {
        NBits::Single(8)
    }
}

impl NBits {
    /// Width used for input quantization
    pub fn input_bits(&self) -> u32 {
        match *self {
            NBits::Single(n) => n,
            NBits::PerOp { op_inputs, .. } => op_inputs,
        }
    }

    /// Width used for weight quantization
    pub fn weight_bits(&self) -> u32 {
        match *self {
            NBits::Single(n) => n,
            NBits::PerOp { op_weights, .. } => op_weights,
        }
    }

    /// Reject widths outside `1..=MAX_N_BITS`
    pub fn validate(&self) -> Result<()> {
        for (name, bits) in [
            ("op_inputs", self.input_bits()),
            ("op_weights", self.weight_bits()),
        ] {
            if bits < 1 || bits > MAX_N_BITS {
                return Err(Error::InvalidParameter(format!(
                    "n_bits.{name} must be in 1..={MAX_N_BITS}, got {bits}"
                )));
            }
        }
        Ok(())
    }
}

/// Number of bits needed to index `n` values
pub fn ceil_log2(n: usize) -> u32 {
    debug_assert!(n > 0);
    (usize::BITS - (n - 1).leading_zeros()).max(1)
}

/// Worst-case width of a sum of `n_terms` products
///
/// A dot product of `n_terms` values of `value_bits` by `weight_bits` each
/// needs `value_bits + weight_bits` bits per term plus `ceil(log2(n_terms))`
/// for the accumulation, plus a sign bit.
pub fn accumulator_bits(value_bits: u32, weight_bits: u32, n_terms: usize) -> u32 {
    value_bits + weight_bits + ceil_log2(n_terms) + 1
}

/// Worst-case width of a sum of `n_terms` squared differences
///
/// Each difference of two `value_bits` encodings spans `value_bits + 1` bits;
/// its square spans twice that.
pub fn distance_accumulator_bits(value_bits: u32, n_terms: usize) -> u32 {
    2 * (value_bits + 1) + ceil_log2(n_terms)
}

/// Fail with `BitWidthOverflow` when an accumulator exceeds the ceiling
pub fn check_accumulator_width(required: u32, limit: u32) -> Result<()> {
    if required > limit {
        return Err(Error::BitWidthOverflow { required, limit });
    }
    Ok(())
}
