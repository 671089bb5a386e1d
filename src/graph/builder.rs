//! Graph construction from fitted cleartext parameters
//!
//! Translates fitted model parameters into a DAG of quantized operations
//! using the quantizers produced by calibration. Building is deterministic:
//! identical fitted parameters and quantizers always yield a structurally
//! identical graph. Model primitives with no quantized equivalent are
//! rejected here rather than silently approximated.

use super::node::{Graph, OpKind};
use crate::quant::{QuantParams, QuantizedTensor, Quantizer, QuantizerRole};
use crate::{Error, Result};
use ndarray::{Array1, Array2};
use std::sync::Arc;

/// Decision applied to the raw scores inside the graph
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecisionHead {
    /// Regression: the dequantized accumulator is the prediction
    Identity,
    /// Binary classification: thresholds the single score at zero
    Sign,
    /// Multiclass classification: argmax across per-class scores
    ArgMax,
}

/// Quantizer describing a wide integer accumulator
///
/// The accumulator itself is carried in an `i64`; the recorded width is
/// capped at 32 bits to stay inside the `QuantParams` contract and is only
/// used for diagnostics and dequantization metadata.
fn accumulator_quantizer(scale: f64, acc_bits: u32) -> Result<Arc<Quantizer>> {
    let q = Quantizer::from_params(
        QuantParams {
            bit_width: acc_bits.min(32),
            scale,
            zero_point: 0,
            signed: true,
            symmetric: true,
        },
        QuantizerRole::Output,
    )?;
    Ok(Arc::new(q))
}

/// Build the graph of a linear-family model
///
/// One affine node (weighted sum plus bias, accumulated at full width)
/// followed by the kind-specific decision head. The bias is folded into
/// accumulator units, so the affine output dequantizes directly through the
/// returned output quantizer (scale `s_input * s_weight`, zero point 0).
pub fn build_linear(
    weights: &Array2<f64>,
    bias: &Array1<f64>,
    input_q: &Arc<Quantizer>,
    weight_q: &Arc<Quantizer>,
    head: DecisionHead,
    acc_bits: u32,
) -> Result<(Graph, Arc<Quantizer>)> {
    if weights.nrows() != bias.len() {
        return Err(Error::ShapeMismatch {
            expected: vec![weights.nrows()],
            got: vec![bias.len()],
        });
    }
    if head == DecisionHead::Sign && weights.nrows() != 1 {
        return Err(Error::UnsupportedOperation(
            "sign decision head requires exactly one output score".to_string(),
        ));
    }

    let acc_scale = input_q.scale() * weight_q.scale();
    let out_q = accumulator_quantizer(acc_scale, acc_bits)?;

    let q_weights = QuantizedTensor::quantize(weights, Arc::clone(weight_q));
    let q_bias: Vec<i64> = bias.iter().map(|&b| (b / acc_scale).round() as i64).collect();

    let mut graph = Graph::new();
    let input = graph.push(OpKind::Input, vec![], None);
    let affine = graph.push(
        OpKind::Affine {
            weights: q_weights.values().clone(),
            bias: q_bias,
            input_zero_point: input_q.zero_point(),
            weight_zero_point: weight_q.zero_point(),
        },
        vec![input],
        Some(Arc::clone(&out_q)),
    );
    let decision = match head {
        DecisionHead::Identity => graph.push(OpKind::Identity, vec![affine], Some(Arc::clone(&out_q))),
        DecisionHead::Sign => graph.push(OpKind::Sign, vec![affine], None),
        DecisionHead::ArgMax => graph.push(OpKind::ArgMax, vec![affine], None),
    };
    graph.set_scores(affine);
    graph.set_output(decision);

    Ok((graph, out_q))
}

/// Build the graph of a neighbor-family classifier
///
/// A batched squared-distance node against the quantized reference set, a
/// top-k selection node, a vote-count aggregation node, and an argmax head.
/// Ties in the selection break by first occurrence in the reference set;
/// vote ties break toward the lowest class index.
#[allow(clippy::too_many_arguments)]
pub fn build_neighbors(
    x_fit: &Array2<f64>,
    labels: &[usize],
    n_classes: usize,
    k: usize,
    input_q: &Arc<Quantizer>,
    acc_bits: u32,
    minkowski_p: f64,
    distance_weighted: bool,
) -> Result<(Graph, Arc<Quantizer>)> {
    if minkowski_p != 2.0 {
        return Err(Error::UnsupportedOperation(format!(
            "minkowski distance with p={minkowski_p} has no quantized equivalent; only p=2 is supported"
        )));
    }
    if distance_weighted {
        return Err(Error::UnsupportedOperation(
            "distance-weighted votes divide by a runtime-dependent value and cannot be quantized"
                .to_string(),
        ));
    }
    if labels.len() != x_fit.nrows() {
        return Err(Error::ShapeMismatch {
            expected: vec![x_fit.nrows()],
            got: vec![labels.len()],
        });
    }
    if k == 0 || k > x_fit.nrows() {
        return Err(Error::InvalidParameter(format!(
            "n_neighbors must be in 1..={}, got {k}",
            x_fit.nrows()
        )));
    }

    // Query and references share the input quantizer, so zero points cancel
    // in the distance differences.
    let dist_scale = input_q.scale() * input_q.scale();
    let dist_q = accumulator_quantizer(dist_scale, acc_bits)?;

    let q_refs = QuantizedTensor::quantize(x_fit, Arc::clone(input_q));

    let mut graph = Graph::new();
    let input = graph.push(OpKind::Input, vec![], None);
    let dist = graph.push(
        OpKind::SquaredDistance {
            references: q_refs.values().clone(),
        },
        vec![input],
        Some(Arc::clone(&dist_q)),
    );
    let topk = graph.push(OpKind::TopK { k }, vec![dist], None);
    let votes = graph.push(
        OpKind::VoteCount {
            labels: labels.iter().map(|&l| l as i64).collect(),
            n_classes,
        },
        vec![topk],
        None,
    );
    let decision = graph.push(OpKind::ArgMax, vec![votes], None);
    graph.set_scores(votes);
    graph.set_output(decision);

    Ok((graph, dist_q))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn quantizers_for(data: &[f64], weights: &[f64]) -> (Arc<Quantizer>, Arc<Quantizer>) {
        let iq =
            Arc::new(Quantizer::calibrate(data, 8, QuantizerRole::Input, false, false).unwrap());
        let wq =
            Arc::new(Quantizer::calibrate(weights, 8, QuantizerRole::Weight, true, true).unwrap());
        (iq, wq)
    }

    #[test]
    fn test_linear_graph_structure() {
        let weights = array![[0.5, -0.25]];
        let bias = array![1.0];
        let (iq, wq) = quantizers_for(&[0.0, 1.0, 2.0], &[0.5, -0.25]);

        let (graph, out_q) =
            build_linear(&weights, &bias, &iq, &wq, DecisionHead::Identity, 21).unwrap();

        assert_eq!(graph.len(), 3);
        assert_eq!(graph.node(1).op.name(), "affine");
        assert_eq!(graph.node(2).op.name(), "identity");
        assert_eq!(graph.scores(), 1);
        assert_eq!(graph.output(), 2);
        assert!((out_q.scale() - iq.scale() * wq.scale()).abs() < 1e-15);
    }

    #[test]
    fn test_linear_graph_is_deterministic() {
        let weights = array![[0.5, -0.25], [1.0, 0.75]];
        let bias = array![1.0, -1.0];
        let (iq, wq) = quantizers_for(&[0.0, 1.0, 2.0], &[0.5, -0.25, 1.0, 0.75]);

        let (a, qa) = build_linear(&weights, &bias, &iq, &wq, DecisionHead::ArgMax, 21).unwrap();
        let (b, qb) = build_linear(&weights, &bias, &iq, &wq, DecisionHead::ArgMax, 21).unwrap();
        assert_eq!(a, b);
        assert_eq!(qa.params(), qb.params());
    }

    #[test]
    fn test_linear_graph_stores_no_floats() {
        // Every affine parameter must be an integer encoding
        let weights = array![[0.37, -0.81]];
        let bias = array![0.12];
        let (iq, wq) = quantizers_for(&[0.0, 1.0], &[0.37, -0.81]);

        let (graph, _) = build_linear(&weights, &bias, &iq, &wq, DecisionHead::Sign, 21).unwrap();
        match &graph.node(1).op {
            OpKind::Affine { weights, bias, .. } => {
                assert_eq!(weights.nrows(), 1);
                assert_eq!(bias.len(), 1);
            }
            other => panic!("expected affine, got {}", other.name()),
        }
    }

    #[test]
    fn test_sign_head_requires_single_output() {
        let weights = array![[0.5, 1.0], [0.1, 0.2]];
        let bias = array![0.0, 0.0];
        let (iq, wq) = quantizers_for(&[0.0, 1.0], &[0.5, 1.0]);
        let err = build_linear(&weights, &bias, &iq, &wq, DecisionHead::Sign, 21).unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation(_)));
    }

    #[test]
    fn test_neighbors_graph_structure() {
        let x_fit = array![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]];
        let labels = vec![0usize, 1, 1];
        let iq = Arc::new(
            Quantizer::calibrate(&[0.0, 1.0, 2.0], 8, QuantizerRole::Input, false, false).unwrap(),
        );

        let (graph, _) =
            build_neighbors(&x_fit, &labels, 2, 2, &iq, 22, 2.0, false).unwrap();

        let names: Vec<_> = graph.nodes().iter().map(|n| n.op.name()).collect();
        assert_eq!(
            names,
            vec!["input", "squared_distance", "top_k", "vote_count", "arg_max"]
        );
        assert_eq!(graph.scores(), 3);
        assert_eq!(graph.output(), 4);
    }

    #[test]
    fn test_neighbors_rejects_non_euclidean() {
        let x_fit = array![[0.0], [1.0]];
        let iq = Arc::new(
            Quantizer::calibrate(&[0.0, 1.0], 8, QuantizerRole::Input, false, false).unwrap(),
        );
        let err = build_neighbors(&x_fit, &[0, 1], 2, 1, &iq, 22, 1.0, false).unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation(_)));
    }

    #[test]
    fn test_neighbors_rejects_distance_weighting() {
        let x_fit = array![[0.0], [1.0]];
        let iq = Arc::new(
            Quantizer::calibrate(&[0.0, 1.0], 8, QuantizerRole::Input, false, false).unwrap(),
        );
        let err = build_neighbors(&x_fit, &[0, 1], 2, 1, &iq, 22, 2.0, true).unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation(_)));
    }

    #[test]
    fn test_neighbors_rejects_bad_k() {
        let x_fit = array![[0.0], [1.0]];
        let iq = Arc::new(
            Quantizer::calibrate(&[0.0, 1.0], 8, QuantizerRole::Input, false, false).unwrap(),
        );
        assert!(build_neighbors(&x_fit, &[0, 1], 2, 0, &iq, 22, 2.0, false).is_err());
        assert!(build_neighbors(&x_fit, &[0, 1], 2, 3, &iq, 22, 2.0, false).is_err());
    }
}
