//! Neighbor-family strategy: calibration and graph build
//!
//! The reference dataset is quantized once with a single shared input
//! quantizer; queries reuse the same parameters, so squared Euclidean
//! distances stay pure integer arithmetic (zero points cancel in the
//! differences) and their ordering matches the real ordering up to
//! quantization error. Ties break by first occurrence in the reference set,
//! vote ties toward the lowest class index.

use super::{KnnHyper, PostProcessing, QuantizedArtifacts, VoteWeighting};
use crate::fhe::CompileOptions;
use crate::graph::build_neighbors;
use crate::quant::{check_accumulator_width, distance_accumulator_bits, NBits, Quantizer, QuantizerRole};
use crate::{Error, Result};
use ndarray::Array2;
use std::sync::Arc;

/// Validate the training set and derive the class count
pub(super) fn fit(x: &Array2<f64>, labels: &[usize], hyper: &KnnHyper) -> Result<usize> {
    if labels.len() != x.nrows() {
        return Err(Error::ShapeMismatch {
            expected: vec![x.nrows()],
            got: vec![labels.len()],
        });
    }
    if hyper.n_neighbors == 0 || hyper.n_neighbors > x.nrows() {
        return Err(Error::InvalidParameter(format!(
            "n_neighbors must be in 1..={}, got {}",
            x.nrows(),
            hyper.n_neighbors
        )));
    }
    let n_classes = labels.iter().max().map(|&m| m + 1).unwrap_or(0);
    if n_classes < 2 {
        return Err(Error::InvalidParameter(
            "neighbor classification needs at least 2 classes".to_string(),
        ));
    }
    Ok(n_classes)
}

/// Calibrate the shared input quantizer and build the neighbor graph
pub(super) fn calibrate_and_build(
    x_fit: &Array2<f64>,
    labels: &[usize],
    n_classes: usize,
    hyper: &KnnHyper,
    x_calibration: &Array2<f64>,
    n_bits: NBits,
    options: &CompileOptions,
) -> Result<QuantizedArtifacts> {
    n_bits.validate()?;

    let samples: Vec<f64> = x_calibration.iter().cloned().collect();
    let input_q = Arc::new(Quantizer::calibrate(
        &samples,
        n_bits.input_bits(),
        QuantizerRole::Input,
        false,
        false,
    )?);

    let acc_bits = distance_accumulator_bits(n_bits.input_bits(), x_fit.ncols());
    check_accumulator_width(acc_bits, options.max_accumulator_bits)?;

    let (graph, distance_q) = build_neighbors(
        x_fit,
        labels,
        n_classes,
        hyper.n_neighbors,
        &input_q,
        acc_bits,
        hyper.p,
        hyper.weights == VoteWeighting::Distance,
    )?;

    Ok(QuantizedArtifacts {
        // The reference set shares the input quantizer; recording it under
        // the weight slot mirrors how the reference set is persisted.
        input_quantizers: vec![Arc::clone(&input_q)],
        weight_quantizers: vec![input_q],
        output_quantizers: vec![distance_q],
        graph,
        post_processing: PostProcessing::NeighborVote {
            n_classes,
            k: hyper.n_neighbors,
        },
        options: *options,
    })
}

/// Reference cleartext prediction: brute-force float distances, stable top-k
pub(super) fn predict_clear(
    x_fit: &Array2<f64>,
    labels: &[usize],
    n_classes: usize,
    k: usize,
    x: &Array2<f64>,
) -> Array2<f64> {
    let mut out = Array2::<f64>::zeros((x.nrows(), 1));
    for (i, query) in x.rows().into_iter().enumerate() {
        let mut dists: Vec<(f64, usize)> = x_fit
            .rows()
            .into_iter()
            .enumerate()
            .map(|(j, r)| {
                let d: f64 = r
                    .iter()
                    .zip(query.iter())
                    .map(|(&a, &b)| (a - b) * (a - b))
                    .sum();
                (d, j)
            })
            .collect();
        dists.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut counts = vec![0usize; n_classes];
        for &(_, j) in dists.iter().take(k) {
            counts[labels[j]] += 1;
        }
        let mut best = 0usize;
        for (c, &v) in counts.iter().enumerate() {
            if v > counts[best] {
                best = c;
            }
        }
        out[[i, 0]] = best as f64;
    }
    out
}
