//! Error types for Cifrar

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Model is not fitted: call fit() before this operation")]
    NotFitted,

    #[error("Model is not compiled: call compile() before encrypted execution")]
    NotCompiled,

    #[error("Calibration error: {0}")]
    Calibration(String),

    #[error("Accumulator needs {required} bits but the compiler ceiling is {limit} bits")]
    BitWidthOverflow { required: u32, limit: u32 },

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("FHE compiler error: {0}")]
    Compiler(String),

    #[error("FHE execution error: {0}")]
    Execution(String),

    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
