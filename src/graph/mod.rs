//! Quantized computation graphs
//!
//! Builds and evaluates the DAG of integer operations equivalent to a fitted
//! model's decision function. Nodes hold only quantized integer encodings,
//! which keeps every graph representable in the encrypted backend.

mod builder;
mod interpreter;
mod node;

pub use builder::{build_linear, build_neighbors, DecisionHead};
pub use interpreter::evaluate;
pub use node::{Graph, Node, NodeId, OpKind};
