//! Uniform affine quantization parameters and the Quantizer type
//!
//! A `Quantizer` maps real values to bounded-width integers and back:
//! - quantize:   q = round(x / scale) + zero_point, clipped to [qmin, qmax]
//! - dequantize: x = (q - zero_point) * scale
//!
//! Quantizers are created once by calibration and immutable afterwards. Graph
//! nodes reference them through `Arc` rather than copying the parameters.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Role a quantizer plays inside a model
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuantizerRole {
    /// Query/input features
    Input,
    /// Learned parameters (weights, reference sets)
    Weight,
    /// Intermediate computation values
    Intermediate,
    /// Raw integer model output
    Output,
}

/// Parameters of a uniform affine quantization
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuantParams {
    /// Integer width in bits (1..=32)
    pub bit_width: u32,
    /// Positive real scale factor
    pub scale: f64,
    /// Integer the real value 0.0 maps to
    pub zero_point: i64,
    /// Whether the integer range is signed
    pub signed: bool,
    /// Whether the range is symmetric around zero (forces zero_point = 0)
    pub symmetric: bool,
}

impl QuantParams {
    /// Smallest representable integer
    pub fn qmin(&self) -> i64 {
        if !self.signed {
            0
        } else if self.symmetric {
            -self.qmax()
        } else {
            -(1i64 << (self.bit_width - 1))
        }
    }

    /// Largest representable integer
    pub fn qmax(&self) -> i64 {
        if self.signed {
            (1i64 << (self.bit_width - 1)) - 1
        } else {
            (1i64 << self.bit_width) - 1
        }
    }
}

/// Calibrated quantizer: one `QuantParams` plus a role tag
///
/// Clipping during `quantize` is silent (models are expected to calibrate on
/// representative data) but counted, so callers can report how often inputs
/// fell outside the calibrated range.
#[derive(Debug, Serialize, Deserialize)]
pub struct Quantizer {
    params: QuantParams,
    role: QuantizerRole,
    #[serde(skip)]
    clipped: AtomicU64,
}

impl Clone for Quantizer {
    fn clone(&self) -> Self {
        Self {
            params: self.params.clone(),
            role: self.role,
            clipped: AtomicU64::new(self.clipped.load(Ordering::Relaxed)),
        }
    }
}

impl PartialEq for Quantizer {
    fn eq(&self, other: &Self) -> bool {
        // Clip diagnostics are transient state, not identity
        self.params == other.params && self.role == other.role
    }
}

impl Quantizer {
    /// Build a quantizer directly from parameters
    ///
    /// Calibration (`Quantizer::calibrate`) is the normal entry point; this is
    /// used for derived quantizers such as accumulator outputs.
    pub fn from_params(params: QuantParams, role: QuantizerRole) -> Result<Self> {
        if params.bit_width < 1 || params.bit_width > 32 {
            return Err(Error::InvalidParameter(format!(
                "bit_width must be in 1..=32, got {}",
                params.bit_width
            )));
        }
        if !(params.scale > 0.0) || !params.scale.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "scale must be a positive finite number, got {}",
                params.scale
            )));
        }
        if params.symmetric && !params.signed {
            return Err(Error::InvalidParameter(
                "symmetric quantization requires a signed range".to_string(),
            ));
        }
        if params.symmetric && params.zero_point != 0 {
            return Err(Error::InvalidParameter(
                "symmetric quantization requires zero_point = 0".to_string(),
            ));
        }
        Ok(Self {
            params,
            role,
            clipped: AtomicU64::new(0),
        })
    }

    /// Calibrate a quantizer from representative samples
    ///
    /// Computes min/max over the samples and derives scale and zero-point so
    /// that the observed range maps onto the integer range, and 0.0 maps to a
    /// representable integer whenever the distribution straddles zero.
    ///
    /// A degenerate range (all samples identical) falls back to `scale = 1.0`
    /// rather than dividing by zero. Empty or non-finite samples fail with
    /// `Error::Calibration`.
    pub fn calibrate(
        samples: &[f64],
        bit_width: u32,
        role: QuantizerRole,
        signed: bool,
        symmetric: bool,
    ) -> Result<Self> {
        if bit_width < 1 || bit_width > 32 {
            return Err(Error::InvalidParameter(format!(
                "bit_width must be in 1..=32, got {bit_width}"
            )));
        }
        if samples.is_empty() {
            return Err(Error::Calibration(
                "cannot calibrate on an empty sample set".to_string(),
            ));
        }
        if samples.iter().any(|v| !v.is_finite()) {
            return Err(Error::Calibration(
                "calibration samples contain non-finite values".to_string(),
            ));
        }

        let min_val = samples.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_val = samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        let params = if symmetric {
            let qmax = ((1i64 << (bit_width - 1)) - 1) as f64;
            let max_abs = min_val.abs().max(max_val.abs());
            let scale = if max_abs > 0.0 { max_abs / qmax } else { 1.0 };
            QuantParams {
                bit_width,
                scale,
                zero_point: 0,
                signed: true,
                symmetric: true,
            }
        } else {
            let tmp = QuantParams {
                bit_width,
                scale: 1.0,
                zero_point: 0,
                signed,
                symmetric: false,
            };
            let (qmin, qmax) = (tmp.qmin(), tmp.qmax());
            let range = max_val - min_val;
            let scale = if range > 0.0 {
                range / (qmax - qmin) as f64
            } else {
                1.0
            };
            let zero_point = (qmin as f64 - min_val / scale)
                .round()
                .clamp(qmin as f64, qmax as f64) as i64;
            QuantParams {
                bit_width,
                scale,
                zero_point,
                signed,
                symmetric: false,
            }
        };

        Self::from_params(params, role)
    }

    /// Quantize a real value to its integer encoding
    ///
    /// Values outside the calibrated range are clipped to the representable
    /// interval; each clip increments the diagnostic counter.
    pub fn quantize(&self, x: f64) -> i64 {
        let q = (x / self.params.scale).round() as i64 + self.params.zero_point;
        let (qmin, qmax) = (self.params.qmin(), self.params.qmax());
        if q < qmin || q > qmax {
            self.clipped.fetch_add(1, Ordering::Relaxed);
        }
        q.clamp(qmin, qmax)
    }

    /// Dequantize an integer encoding back to a real value
    ///
    /// Exact inverse of `quantize` absent clipping.
    pub fn dequantize(&self, q: i64) -> f64 {
        (q - self.params.zero_point) as f64 * self.params.scale
    }

    /// Quantize a slice of real values
    pub fn quantize_slice(&self, xs: &[f64]) -> Vec<i64> {
        xs.iter().map(|&x| self.quantize(x)).collect()
    }

    /// Dequantize a slice of integer encodings
    pub fn dequantize_slice(&self, qs: &[i64]) -> Vec<f64> {
        qs.iter().map(|&q| self.dequantize(q)).collect()
    }

    /// Quantization parameters
    pub fn params(&self) -> &QuantParams {
        &self.params
    }

    /// Role tag
    pub fn role(&self) -> QuantizerRole {
        self.role
    }

    /// Scale factor
    pub fn scale(&self) -> f64 {
        self.params.scale
    }

    /// Zero point
    pub fn zero_point(&self) -> i64 {
        self.params.zero_point
    }

    /// Bit width
    pub fn bit_width(&self) -> u32 {
        self.params.bit_width
    }

    /// Number of values clipped by `quantize` since the last reset
    pub fn clip_count(&self) -> u64 {
        self.clipped.load(Ordering::Relaxed)
    }

    /// Reset the clip diagnostic counter
    pub fn reset_clip_count(&self) {
        self.clipped.store(0, Ordering::Relaxed);
    }
}
