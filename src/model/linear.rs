//! Linear-family strategy: fitting, calibration, graph build
//!
//! Inputs and the weight matrix are quantized independently (inputs
//! asymmetric/unsigned, weights symmetric/signed). The dot product plus bias
//! is carried in a wide un-quantized accumulator until the final output, so
//! rounding error does not compound across additions; the accumulator is the
//! single point requiring output quantization.

use super::{LinearHyper, PostProcessing, QuantizedArtifacts};
use crate::fhe::CompileOptions;
use crate::graph::{build_linear, DecisionHead};
use crate::quant::{accumulator_bits, check_accumulator_width, NBits, Quantizer, QuantizerRole};
use crate::solver::{self, FitReport};
use crate::Result;
use ndarray::{Array1, Array2};
use std::sync::Arc;

/// Fit a regression model, delegating to the numerical solver
pub(super) fn fit_regressor(
    x: &Array2<f64>,
    y: &Array2<f64>,
    hyper: &LinearHyper,
) -> Result<(Array2<f64>, Array1<f64>, FitReport)> {
    solver::fit_linear_regression(x, y, hyper.fit_intercept)
}

/// Fit a classifier, delegating to the numerical solver
pub(super) fn fit_classifier(
    x: &Array2<f64>,
    labels: &[usize],
    n_classes: usize,
    hyper: &LinearHyper,
) -> Result<(Array2<f64>, Array1<f64>, FitReport)> {
    solver::fit_logistic(
        x,
        labels,
        n_classes,
        hyper.max_iter,
        hyper.learning_rate,
        hyper.tolerance,
    )
}

/// Calibrate quantizers on representative data and build the integer graph
///
/// `n_classes` is `None` for regression, `Some(c)` for classification.
pub(super) fn calibrate_and_build(
    weights: &Array2<f64>,
    bias: &Array1<f64>,
    n_classes: Option<usize>,
    x_calibration: &Array2<f64>,
    n_bits: NBits,
    options: &CompileOptions,
) -> Result<QuantizedArtifacts> {
    n_bits.validate()?;

    let input_samples: Vec<f64> = x_calibration.iter().cloned().collect();
    let input_q = Arc::new(Quantizer::calibrate(
        &input_samples,
        n_bits.input_bits(),
        QuantizerRole::Input,
        false,
        false,
    )?);

    let weight_samples: Vec<f64> = weights.iter().cloned().collect();
    let weight_q = Arc::new(Quantizer::calibrate(
        &weight_samples,
        n_bits.weight_bits(),
        QuantizerRole::Weight,
        true,
        true,
    )?);

    let acc_bits = accumulator_bits(n_bits.input_bits(), n_bits.weight_bits(), weights.ncols());
    check_accumulator_width(acc_bits, options.max_accumulator_bits)?;

    let (head, post_processing) = match n_classes {
        None => (DecisionHead::Identity, PostProcessing::Identity),
        Some(2) => (DecisionHead::Sign, PostProcessing::Sigmoid),
        Some(c) => (DecisionHead::ArgMax, PostProcessing::Softmax { n_classes: c }),
    };

    let (graph, output_q) = build_linear(weights, bias, &input_q, &weight_q, head, acc_bits)?;

    Ok(QuantizedArtifacts {
        input_quantizers: vec![input_q],
        weight_quantizers: vec![weight_q],
        output_quantizers: vec![output_q],
        graph,
        post_processing,
        options: *options,
    })
}

/// Reference cleartext decision function
pub(super) fn predict_clear(
    weights: &Array2<f64>,
    bias: &Array1<f64>,
    n_classes: Option<usize>,
    x: &Array2<f64>,
) -> Array2<f64> {
    let scores = x.dot(&weights.t()) + bias;
    match n_classes {
        None => scores,
        Some(2) => scores.mapv(|s| if s >= 0.0 { 1.0 } else { 0.0 }),
        Some(_) => {
            let mut labels = Array2::<f64>::zeros((x.nrows(), 1));
            for (i, row) in scores.rows().into_iter().enumerate() {
                let mut best = 0usize;
                for (c, &v) in row.iter().enumerate() {
                    if v > row[best] {
                        best = c;
                    }
                }
                labels[[i, 0]] = best as f64;
            }
            labels
        }
    }
}
