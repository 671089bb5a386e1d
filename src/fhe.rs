//! Compiler/runtime seam for encrypted execution
//!
//! The crate treats the FHE compiler and runtime as external collaborators
//! behind the `FheBackend` trait. `InterpreterBackend` is the bundled
//! reference implementation: both execution modes run the same integer
//! interpreter, so simulated and encrypted execution are guaranteed to be
//! bit-identical given identical quantized inputs.

use crate::graph::{self, Graph, OpKind};
use crate::{Error, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// How to execute a compiled circuit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Fast non-encrypted path over the same quantized integers
    Simulate,
    /// Encrypted execution
    Encrypted,
}

/// Options handed to the compiler
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileOptions {
    /// Widest integer accumulator any single operation may produce
    ///
    /// Defaults to 53 bits, the widest accumulator whose dequantized value is
    /// still exact in an `f64`. Callers model a real compiler ceiling
    /// (typically 7-16 bits) by tightening this.
    pub max_accumulator_bits: u32,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            max_accumulator_bits: 53,
        }
    }
}

/// Executable circuit produced by a backend
///
/// Opaque to callers; only the producing backend knows how to execute it.
#[derive(Clone, Debug)]
pub struct Circuit {
    graph: Graph,
    options: CompileOptions,
}

impl Circuit {
    /// The graph this circuit was compiled from
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Options the circuit was compiled with
    pub fn options(&self) -> &CompileOptions {
        &self.options
    }
}

/// External FHE compiler/runtime interface
///
/// Failures surface verbatim as `Error::Compiler` / `Error::Execution` and
/// are never retried internally; cancellation is the caller's responsibility.
pub trait FheBackend {
    /// Lower a computation graph into an executable circuit
    ///
    /// `calibration` holds quantized representative rows the backend may use
    /// to bound intermediate values; it may be empty.
    fn compile(
        &self,
        graph: &Graph,
        calibration: &Array2<i64>,
        options: &CompileOptions,
    ) -> Result<Circuit>;

    /// Execute a circuit on one quantized input row
    fn execute(&self, circuit: &Circuit, input: &[i64], mode: ExecutionMode) -> Result<Vec<i64>>;
}

/// Reference backend: an integer graph interpreter
///
/// Both execution modes evaluate the same graph, which makes the
/// simulate-equals-encrypted property hold by construction and testable
/// against any other backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct InterpreterBackend;

impl FheBackend for InterpreterBackend {
    fn compile(
        &self,
        graph: &Graph,
        _calibration: &Array2<i64>,
        options: &CompileOptions,
    ) -> Result<Circuit> {
        if graph.is_empty() {
            return Err(Error::Compiler("cannot compile an empty graph".to_string()));
        }
        // Enforce the per-operation accumulator ceiling the way a real
        // compiler would reject an over-wide circuit.
        for node in graph.nodes() {
            if let Some(q) = &node.output_quantizer {
                if matches!(
                    node.op,
                    OpKind::Affine { .. } | OpKind::SquaredDistance { .. }
                ) && q.bit_width() > options.max_accumulator_bits
                {
                    return Err(Error::Compiler(format!(
                        "node {} ({}) needs a {}-bit accumulator, ceiling is {}",
                        node.id,
                        node.op.name(),
                        q.bit_width(),
                        options.max_accumulator_bits
                    )));
                }
            }
        }
        Ok(Circuit {
            graph: graph.clone(),
            options: *options,
        })
    }

    fn execute(&self, circuit: &Circuit, input: &[i64], mode: ExecutionMode) -> Result<Vec<i64>> {
        // Identical numeric path for both modes
        let _ = mode;
        graph::evaluate(&circuit.graph, input, circuit.graph.output())
    }
}
