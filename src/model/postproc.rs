//! Post-processing of raw integer model output
//!
//! The final floating-point transform applied after dequantizing the graph's
//! raw output: sigmoid or softmax for classifier probabilities, vote
//! normalization for neighbor models, identity for regression.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Model-kind-specific post-processing parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PostProcessing {
    /// Regression: dequantized output is the prediction
    Identity,
    /// Binary classification: sigmoid over the single score
    Sigmoid,
    /// Multiclass classification: softmax over per-class scores
    Softmax {
        /// Number of classes
        n_classes: usize,
    },
    /// Neighbor classification: vote counts normalized by the neighbor count,
    /// ties broken toward the lowest class index
    NeighborVote {
        /// Number of classes
        n_classes: usize,
        /// Number of neighbors voting
        k: usize,
    },
}

impl PostProcessing {
    /// Number of probability columns produced, when this is a classifier
    pub fn n_classes(&self) -> Option<usize> {
        match *self {
            PostProcessing::Identity => None,
            PostProcessing::Sigmoid => Some(2),
            PostProcessing::Softmax { n_classes } => Some(n_classes),
            PostProcessing::NeighborVote { n_classes, .. } => Some(n_classes),
        }
    }

    /// Turn dequantized raw scores into class probabilities
    pub fn probabilities(&self, scores: &[f64]) -> Result<Vec<f64>> {
        match *self {
            PostProcessing::Identity => Err(Error::InvalidParameter(
                "probabilities are only defined for classifiers".to_string(),
            )),
            PostProcessing::Sigmoid => {
                if scores.len() != 1 {
                    return Err(Error::ShapeMismatch {
                        expected: vec![1],
                        got: vec![scores.len()],
                    });
                }
                let p = 1.0 / (1.0 + (-scores[0]).exp());
                Ok(vec![1.0 - p, p])
            }
            PostProcessing::Softmax { n_classes } => {
                if scores.len() != n_classes {
                    return Err(Error::ShapeMismatch {
                        expected: vec![n_classes],
                        got: vec![scores.len()],
                    });
                }
                let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let exps: Vec<f64> = scores.iter().map(|&s| (s - max).exp()).collect();
                let sum: f64 = exps.iter().sum();
                Ok(exps.into_iter().map(|e| e / sum).collect())
            }
            PostProcessing::NeighborVote { n_classes, k } => {
                if scores.len() != n_classes {
                    return Err(Error::ShapeMismatch {
                        expected: vec![n_classes],
                        got: vec![scores.len()],
                    });
                }
                Ok(scores.iter().map(|&c| c / k as f64).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_identity_has_no_probabilities() {
        assert!(PostProcessing::Identity.probabilities(&[1.0]).is_err());
        assert_eq!(PostProcessing::Identity.n_classes(), None);
    }

    #[test]
    fn test_sigmoid_probabilities() {
        let p = PostProcessing::Sigmoid.probabilities(&[0.0]).unwrap();
        assert_abs_diff_eq!(p[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(p[1], 0.5, epsilon = 1e-12);

        let p = PostProcessing::Sigmoid.probabilities(&[4.0]).unwrap();
        assert!(p[1] > 0.9);
        assert_abs_diff_eq!(p[0] + p[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_softmax_probabilities_sum_to_one() {
        let pp = PostProcessing::Softmax { n_classes: 3 };
        let p = pp.probabilities(&[1.0, 2.0, 3.0]).unwrap();
        assert_abs_diff_eq!(p.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert!(p[2] > p[1] && p[1] > p[0]);
    }

    #[test]
    fn test_softmax_stable_for_large_scores() {
        let pp = PostProcessing::Softmax { n_classes: 2 };
        let p = pp.probabilities(&[1000.0, 999.0]).unwrap();
        assert!(p.iter().all(|v| v.is_finite()));
        assert_abs_diff_eq!(p.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_neighbor_vote_normalization() {
        let pp = PostProcessing::NeighborVote { n_classes: 4, k: 5 };
        let p = pp.probabilities(&[0.0, 3.0, 2.0, 0.0]).unwrap();
        assert_eq!(p, vec![0.0, 0.6, 0.4, 0.0]);
    }

    #[test]
    fn test_shape_checks() {
        assert!(PostProcessing::Sigmoid.probabilities(&[1.0, 2.0]).is_err());
        assert!(PostProcessing::Softmax { n_classes: 3 }
            .probabilities(&[1.0])
            .is_err());
    }
}
