//! Computation graph nodes
//!
//! A `Graph` is a topologically ordered DAG of integer operations equivalent
//! to a model's decision function. Nodes store only quantized integer
//! encodings of model parameters, never cleartext floats, so every graph is
//! representable in the encrypted-execution backend.

use crate::quant::Quantizer;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Index of a node inside its graph
pub type NodeId = usize;

/// One quantized operation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum OpKind {
    /// Placeholder for the quantized query row
    Input,
    /// Weighted sum plus bias over quantized encodings
    ///
    /// Produces `acc_o = sum_j (x_j - input_zero_point) * (w_oj - weight_zero_point) + bias_o`
    /// per output row `o`, carried in a wide integer accumulator.
    Affine {
        /// Quantized weight matrix, one row per output
        weights: Array2<i64>,
        /// Bias folded into accumulator units
        bias: Vec<i64>,
        /// Zero point of the input quantizer
        input_zero_point: i64,
        /// Zero point of the weight quantizer
        weight_zero_point: i64,
    },
    /// Squared Euclidean distance to each reference row
    ///
    /// Input and references share one quantizer, so zero points cancel in the
    /// differences and the integer distances are ordered like the real ones.
    SquaredDistance {
        /// Quantized reference rows
        references: Array2<i64>,
    },
    /// Indices of the k smallest values, ties broken by first occurrence
    TopK {
        /// Number of values to select
        k: usize,
    },
    /// Per-class counts of the labels selected by the input indices
    VoteCount {
        /// Label of each reference row
        labels: Vec<i64>,
        /// Number of classes
        n_classes: usize,
    },
    /// Index of the maximum value, ties broken toward the lowest index
    ArgMax,
    /// 1 when the single input value is non-negative, 0 otherwise
    Sign,
    /// Pass-through
    Identity,
}

impl OpKind {
    /// Short operation name for diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            OpKind::Input => "input",
            OpKind::Affine { .. } => "affine",
            OpKind::SquaredDistance { .. } => "squared_distance",
            OpKind::TopK { .. } => "top_k",
            OpKind::VoteCount { .. } => "vote_count",
            OpKind::ArgMax => "arg_max",
            OpKind::Sign => "sign",
            OpKind::Identity => "identity",
        }
    }
}

/// One node of the computation graph
///
/// Created once during graph build and immutable afterwards. `inputs` refer
/// to earlier nodes only, which keeps the node list a valid topological order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Position inside the graph
    pub id: NodeId,
    /// Operation performed by this node
    pub op: OpKind,
    /// Nodes whose outputs feed this one
    pub inputs: Vec<NodeId>,
    /// Quantizer describing how to reconstruct real values from this node's
    /// output, when the output carries a real-valued meaning
    pub output_quantizer: Option<Arc<Quantizer>>,
}

/// Topologically ordered DAG of quantized operations
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    nodes: Vec<Node>,
    /// Pre-decision node evaluated by probability queries
    scores: NodeId,
    /// Decision head evaluated by label/value queries
    output: NodeId,
}

impl Graph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            scores: 0,
            output: 0,
        }
    }

    /// Append a node; panics if an input refers to a not-yet-added node
    pub fn push(
        &mut self,
        op: OpKind,
        inputs: Vec<NodeId>,
        output_quantizer: Option<Arc<Quantizer>>,
    ) -> NodeId {
        let id = self.nodes.len();
        assert!(
            inputs.iter().all(|&i| i < id),
            "node inputs must reference earlier nodes"
        );
        self.nodes.push(Node {
            id,
            op,
            inputs,
            output_quantizer,
        });
        id
    }

    /// Mark the pre-decision scores node
    pub fn set_scores(&mut self, id: NodeId) {
        assert!(id < self.nodes.len());
        self.scores = id;
    }

    /// Mark the decision head
    pub fn set_output(&mut self, id: NodeId) {
        assert!(id < self.nodes.len());
        self.output = id;
    }

    /// All nodes in topological order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Node by id
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Pre-decision scores node
    pub fn scores(&self) -> NodeId {
        self.scores
    }

    /// Decision head node
    pub fn output(&self) -> NodeId {
        self.output
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}
