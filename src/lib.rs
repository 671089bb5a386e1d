//! # Cifrar: Quantized ML Models for Encrypted Inference
//!
//! Cifrar converts conventional machine-learning models (linear regression,
//! logistic classification, k-nearest-neighbors) trained in floating point into
//! fixed-point quantized equivalents whose arithmetic can be executed under
//! fully homomorphic encryption (FHE).
//!
//! ## Architecture
//!
//! - **quant**: Uniform affine quantizers, calibration, bit-width accounting
//! - **graph**: Integer computation graph build and interpretation
//! - **fhe**: Compiler/runtime seam with a reference interpreter backend
//! - **solver**: Cleartext numerical fitting (the external fitting collaborator)
//! - **model**: Lifecycle controller (fit → calibrate → compile → predict)
//! - **io**: Snapshot persistence (JSON, YAML formats)
//!
//! ## Example
//!
//! ```no_run
//! use cifrar::{CompileOptions, Model, NBits, Targets};
//! use ndarray::{Array1, Array2};
//!
//! let x = Array2::zeros((200, 10));
//! let y = Array1::zeros(200);
//!
//! let mut model = Model::linear_regressor(NBits::Single(8));
//! model.fit(&x, &Targets::regression(y)).unwrap();
//! model.compile(&x, &CompileOptions::default()).unwrap();
//!
//! let row = x.slice(ndarray::s![..1, ..]).to_owned();
//! let prediction = model.predict(&row, true).unwrap();
//! assert_eq!(prediction.nrows(), 1);
//! ```

pub mod error;
pub mod fhe;
pub mod graph;
pub mod io;
pub mod model;
pub mod quant;
pub mod solver;

// Re-export commonly used types
pub use error::{Error, Result};
pub use fhe::{CompileOptions, ExecutionMode, FheBackend, InterpreterBackend};
pub use model::{LifecycleState, Model, ModelKind, PostProcessing, Targets};
pub use quant::{NBits, QuantParams, QuantizedTensor, Quantizer, QuantizerRole};
pub use solver::FitReport;
