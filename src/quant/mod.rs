//! Quantization: uniform affine quantizers, calibration, growth accounting
//!
//! Maps real-valued tensors to bounded-width integers (and back) and tracks
//! the scale/zero-point metadata that graph operations need to stay faithful
//! to the original floating-point computation.

mod calibration;
mod params;
mod tensor;

pub use calibration::{
    accumulator_bits, ceil_log2, check_accumulator_width, distance_accumulator_bits, NBits,
    MAX_N_BITS,
};
pub use params::{QuantParams, Quantizer, QuantizerRole};
pub use tensor::QuantizedTensor;
