//! Reference integer interpreter for computation graphs
//!
//! Evaluates a graph over one quantized input row, producing the integer
//! output of any node. This is the numeric ground truth both execution modes
//! of the default backend share.

use super::node::{Graph, NodeId, OpKind};
use crate::{Error, Result};

/// Evaluate `graph` on one quantized input row, up to and including `upto`
pub fn evaluate(graph: &Graph, input: &[i64], upto: NodeId) -> Result<Vec<i64>> {
    if upto >= graph.len() {
        return Err(Error::Execution(format!(
            "node {upto} does not exist in a graph of {} nodes",
            graph.len()
        )));
    }

    let mut values: Vec<Option<Vec<i64>>> = vec![None; upto + 1];

    for node in &graph.nodes()[..=upto] {
        let out = match &node.op {
            OpKind::Input => input.to_vec(),
            OpKind::Affine {
                weights,
                bias,
                input_zero_point,
                weight_zero_point,
            } => {
                let x = fetch(&values, node.inputs[0])?;
                if x.len() != weights.ncols() {
                    return Err(Error::ShapeMismatch {
                        expected: vec![weights.ncols()],
                        got: vec![x.len()],
                    });
                }
                weights
                    .rows()
                    .into_iter()
                    .zip(bias.iter())
                    .map(|(row, &b)| {
                        let acc: i64 = row
                            .iter()
                            .zip(x.iter())
                            .map(|(&w, &q)| (q - input_zero_point) * (w - weight_zero_point))
                            .sum();
                        acc + b
                    })
                    .collect()
            }
            OpKind::SquaredDistance { references } => {
                let x = fetch(&values, node.inputs[0])?;
                if x.len() != references.ncols() {
                    return Err(Error::ShapeMismatch {
                        expected: vec![references.ncols()],
                        got: vec![x.len()],
                    });
                }
                references
                    .rows()
                    .into_iter()
                    .map(|row| {
                        row.iter()
                            .zip(x.iter())
                            .map(|(&r, &q)| {
                                let d = q - r;
                                d * d
                            })
                            .sum()
                    })
                    .collect()
            }
            OpKind::TopK { k } => {
                let dists = fetch(&values, node.inputs[0])?;
                if *k > dists.len() {
                    return Err(Error::Execution(format!(
                        "top-k of {k} requested over {} values",
                        dists.len()
                    )));
                }
                let mut order: Vec<usize> = (0..dists.len()).collect();
                // Stable under ties: equal distances keep dataset order
                order.sort_by_key(|&i| (dists[i], i));
                order[..*k].iter().map(|&i| i as i64).collect()
            }
            OpKind::VoteCount { labels, n_classes } => {
                let picked = fetch(&values, node.inputs[0])?;
                let mut counts = vec![0i64; *n_classes];
                for &idx in picked {
                    let label = labels
                        .get(idx as usize)
                        .copied()
                        .ok_or_else(|| Error::Execution(format!("neighbor index {idx} out of range")))?;
                    counts[label as usize] += 1;
                }
                counts
            }
            OpKind::ArgMax => {
                let scores = fetch(&values, node.inputs[0])?;
                let mut best = 0usize;
                for (i, &v) in scores.iter().enumerate() {
                    if v > scores[best] {
                        best = i;
                    }
                }
                vec![best as i64]
            }
            OpKind::Sign => {
                let v = fetch(&values, node.inputs[0])?;
                vec![if v[0] >= 0 { 1 } else { 0 }]
            }
            OpKind::Identity => fetch(&values, node.inputs[0])?.clone(),
        };
        values[node.id] = Some(out);
    }

    Ok(values[upto].take().expect("node evaluated above"))
}

fn fetch<'a>(values: &'a [Option<Vec<i64>>], id: NodeId) -> Result<&'a Vec<i64>> {
    values
        .get(id)
        .and_then(|v| v.as_ref())
        .ok_or_else(|| Error::Execution(format!("node {id} evaluated before its input")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_affine_accumulation() {
        let mut g = Graph::new();
        let input = g.push(OpKind::Input, vec![], None);
        let affine = g.push(
            OpKind::Affine {
                weights: array![[2, -1], [0, 3]],
                bias: vec![5, -2],
                input_zero_point: 1,
                weight_zero_point: 0,
            },
            vec![input],
            None,
        );
        // x = [4, 2] -> centered [3, 1]
        // out0 = 2*3 + (-1)*1 + 5 = 10; out1 = 0*3 + 3*1 - 2 = 1
        let out = evaluate(&g, &[4, 2], affine).unwrap();
        assert_eq!(out, vec![10, 1]);
    }

    #[test]
    fn test_affine_shape_mismatch() {
        let mut g = Graph::new();
        let input = g.push(OpKind::Input, vec![], None);
        let affine = g.push(
            OpKind::Affine {
                weights: array![[1, 2, 3]],
                bias: vec![0],
                input_zero_point: 0,
                weight_zero_point: 0,
            },
            vec![input],
            None,
        );
        let err = evaluate(&g, &[1, 2], affine).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_squared_distance_zero_for_identical_row() {
        let mut g = Graph::new();
        let input = g.push(OpKind::Input, vec![], None);
        let dist = g.push(
            OpKind::SquaredDistance {
                references: array![[1, 2, 3], [4, 5, 6]],
            },
            vec![input],
            None,
        );
        let out = evaluate(&g, &[4, 5, 6], dist).unwrap();
        assert_eq!(out, vec![27, 0]);
    }

    #[test]
    fn test_top_k_stable_tie_break() {
        let mut g = Graph::new();
        let input = g.push(OpKind::Input, vec![], None);
        let ident = g.push(OpKind::Identity, vec![input], None);
        let topk = g.push(OpKind::TopK { k: 3 }, vec![ident], None);
        // Two zeros tie: the earlier index must win
        let out = evaluate(&g, &[5, 0, 7, 0, 1], topk).unwrap();
        assert_eq!(out, vec![1, 3, 4]);
    }

    #[test]
    fn test_top_k_too_large_fails() {
        let mut g = Graph::new();
        let input = g.push(OpKind::Input, vec![], None);
        let topk = g.push(OpKind::TopK { k: 5 }, vec![input], None);
        assert!(evaluate(&g, &[1, 2], topk).is_err());
    }

    #[test]
    fn test_vote_count() {
        let mut g = Graph::new();
        let input = g.push(OpKind::Input, vec![], None);
        let votes = g.push(
            OpKind::VoteCount {
                labels: vec![0, 2, 1, 2, 2],
                n_classes: 3,
            },
            vec![input],
            None,
        );
        // Neighbors 1, 3, 4 all carry label 2
        let out = evaluate(&g, &[1, 3, 4], votes).unwrap();
        assert_eq!(out, vec![0, 0, 3]);
    }

    #[test]
    fn test_arg_max_tie_breaks_low() {
        let mut g = Graph::new();
        let input = g.push(OpKind::Input, vec![], None);
        let am = g.push(OpKind::ArgMax, vec![input], None);
        assert_eq!(evaluate(&g, &[3, 7, 7, 1], am).unwrap(), vec![1]);
    }

    #[test]
    fn test_sign() {
        let mut g = Graph::new();
        let input = g.push(OpKind::Input, vec![], None);
        let s = g.push(OpKind::Sign, vec![input], None);
        assert_eq!(evaluate(&g, &[-4], s).unwrap(), vec![0]);
        assert_eq!(evaluate(&g, &[0], s).unwrap(), vec![1]);
        assert_eq!(evaluate(&g, &[9], s).unwrap(), vec![1]);
    }

    #[test]
    fn test_evaluate_out_of_range_node() {
        let mut g = Graph::new();
        g.push(OpKind::Input, vec![], None);
        assert!(evaluate(&g, &[1], 7).is_err());
    }
}
