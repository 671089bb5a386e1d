//! Quantized tensors
//!
//! A `QuantizedTensor` pairs raw integer encodings with the quantizer that
//! produced them. Tensors are never mutated in place; every operation yields
//! a new tensor.

use super::Quantizer;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Two-dimensional array of quantized integers plus its quantizer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuantizedTensor {
    values: Array2<i64>,
    quantizer: Arc<Quantizer>,
}

impl QuantizedTensor {
    /// Quantize a real-valued array
    pub fn quantize(data: &Array2<f64>, quantizer: Arc<Quantizer>) -> Self {
        let values = data.mapv(|x| quantizer.quantize(x));
        Self { values, quantizer }
    }

    /// Wrap already-quantized integers
    pub fn from_raw(values: Array2<i64>, quantizer: Arc<Quantizer>) -> Self {
        Self { values, quantizer }
    }

    /// Reconstruct the approximate real values
    pub fn dequantize(&self) -> Array2<f64> {
        self.values.mapv(|q| self.quantizer.dequantize(q))
    }

    /// Raw integer encodings
    pub fn values(&self) -> &Array2<i64> {
        &self.values
    }

    /// The quantizer that produced this tensor
    pub fn quantizer(&self) -> &Arc<Quantizer> {
        &self.quantizer
    }

    /// One row of encodings
    pub fn row(&self, i: usize) -> ArrayView1<'_, i64> {
        self.values.row(i)
    }

    /// Number of rows
    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    /// Number of columns
    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quant::QuantizerRole;
    use ndarray::array;

    fn input_quantizer(data: &Array2<f64>, bits: u32) -> Arc<Quantizer> {
        let flat: Vec<f64> = data.iter().cloned().collect();
        Arc::new(Quantizer::calibrate(&flat, bits, QuantizerRole::Input, false, false).unwrap())
    }

    #[test]
    fn test_quantize_preserves_shape() {
        let data = array![[0.0, 1.0, 2.0], [3.0, 4.0, 5.0]];
        let q = input_quantizer(&data, 8);
        let t = QuantizedTensor::quantize(&data, q);
        assert_eq!(t.nrows(), 2);
        assert_eq!(t.ncols(), 3);
    }

    #[test]
    fn test_dequantize_close_to_original() {
        let data = array![[-1.0, 0.0], [0.5, 1.0]];
        let q = input_quantizer(&data, 8);
        let t = QuantizedTensor::quantize(&data, Arc::clone(&q));
        let back = t.dequantize();
        for (orig, rec) in data.iter().zip(back.iter()) {
            assert!((orig - rec).abs() <= q.scale());
        }
    }

    #[test]
    fn test_operations_do_not_mutate() {
        let data = array![[0.0, 1.0], [2.0, 3.0]];
        let q = input_quantizer(&data, 8);
        let t = QuantizedTensor::quantize(&data, q);
        let snapshot = t.values().clone();
        let _ = t.dequantize();
        let _ = t.row(0);
        assert_eq!(t.values(), &snapshot);
    }

    #[test]
    fn test_quantizer_is_shared_not_copied() {
        let data = array![[0.0, 1.0]];
        let q = input_quantizer(&data, 8);
        let t = QuantizedTensor::quantize(&data, Arc::clone(&q));
        assert!(Arc::ptr_eq(t.quantizer(), &q));
    }
}
