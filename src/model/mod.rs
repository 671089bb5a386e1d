//! Model lifecycle controller
//!
//! Orchestrates fit → calibrate → build-graph → compile → predict for the
//! closed set of supported model kinds. Fitting is delegated to the solver
//! and encrypted execution to the FHE backend; this module owns the state
//! machine and the quantized artifacts.
//!
//! State machine: `Unfitted → Fitted → Calibrated → Compiled → Ready`.
//! `fit` re-runs from any state and discards any compiled circuit;
//! `compile` re-calibrates on the provided dataset and hands the graph to
//! the backend; a failed transition leaves the previous state untouched.
//! `fit` and `compile` take `&mut self` while `predict*` take `&self`, so
//! exclusive access during mutation is enforced by the borrow checker.

mod knn;
mod linear;
mod postproc;

pub use postproc::PostProcessing;

use crate::fhe::{Circuit, CompileOptions, ExecutionMode, FheBackend, InterpreterBackend};
use crate::graph::{self, Graph};
use crate::io::ModelSnapshot;
use crate::quant::{NBits, QuantizedTensor, Quantizer};
use crate::solver::FitReport;
use crate::{Error, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Version tag of the snapshot schema produced by `dump`
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Lifecycle states, ordered by progress
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Constructed with hyperparameters only
    Unfitted,
    /// Cleartext parameters fitted
    Fitted,
    /// Quantizers calibrated and graph built (simulation path available)
    Calibrated,
    /// Graph lowered by the backend
    Compiled,
    /// Compiled circuit verified executable
    Ready,
}

/// Hyperparameters of the linear family
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearHyper {
    /// Whether to fit an intercept term
    pub fit_intercept: bool,
    /// Gradient-descent iteration cap (classifiers)
    pub max_iter: usize,
    /// Gradient-descent step size (classifiers)
    pub learning_rate: f64,
    /// Gradient norm below which fitting stops (classifiers)
    pub tolerance: f64,
}

impl Default for LinearHyper {
    fn default() -> Self {
        Self {
            fit_intercept: true,
            max_iter: 500,
            learning_rate: 0.3,
            tolerance: 1e-8,
        }
    }
}

/// Vote weighting for neighbor models
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteWeighting {
    /// Every neighbor votes once
    Uniform,
    /// Votes weighted by inverse distance (no quantized equivalent; rejected
    /// at graph build)
    Distance,
}

/// Hyperparameters of the neighbor family
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KnnHyper {
    /// Number of neighbors voting
    pub n_neighbors: usize,
    /// Vote weighting rule
    pub weights: VoteWeighting,
    /// Minkowski power; only 2 (squared Euclidean) is supported
    pub p: f64,
}

impl Default for KnnHyper {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            weights: VoteWeighting::Uniform,
            p: 2.0,
        }
    }
}

/// Supported model kinds with their hyperparameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ModelKind {
    /// Ordinary least squares, single or multi target
    LinearRegressor(LinearHyper),
    /// Logistic (binary) or softmax (multiclass) classification
    LogisticClassifier(LinearHyper),
    /// k-nearest-neighbors classification by majority vote
    KnnClassifier(KnnHyper),
}

impl ModelKind {
    /// Whether the kind predicts class labels
    pub fn is_classifier(&self) -> bool {
        !matches!(self, ModelKind::LinearRegressor(_))
    }
}

/// Training targets
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Targets {
    /// Real-valued targets, one column per output
    Regression(Array2<f64>),
    /// Class labels in `0..n_classes`
    Labels(Vec<usize>),
}

impl Targets {
    /// Single-target regression values
    pub fn regression(y: Array1<f64>) -> Self {
        Targets::Regression(y.insert_axis(ndarray::Axis(1)))
    }

    /// Multi-target regression values
    pub fn regression_multi(y: Array2<f64>) -> Self {
        Targets::Regression(y)
    }

    /// Classification labels
    pub fn labels(y: Vec<usize>) -> Self {
        Targets::Labels(y)
    }
}

/// Fitted cleartext parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FittedParams {
    /// Linear family: weight matrix `(n_outputs, n_features)` plus bias
    Linear {
        /// Weight matrix
        weights: Array2<f64>,
        /// Bias per output
        bias: Array1<f64>,
        /// `None` for regression, `Some(c)` for classification
        n_classes: Option<usize>,
    },
    /// Neighbor family: the reference dataset and its labels
    Neighbors {
        /// Reference rows
        x_fit: Array2<f64>,
        /// Label per reference row
        labels: Vec<usize>,
        /// Number of classes
        n_classes: usize,
    },
}

impl FittedParams {
    fn n_features(&self) -> usize {
        match self {
            FittedParams::Linear { weights, .. } => weights.ncols(),
            FittedParams::Neighbors { x_fit, .. } => x_fit.ncols(),
        }
    }
}

/// Everything calibration and graph build produce
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuantizedArtifacts {
    /// Quantizers for query inputs
    pub input_quantizers: Vec<Arc<Quantizer>>,
    /// Quantizers for learned parameters
    pub weight_quantizers: Vec<Arc<Quantizer>>,
    /// Quantizers for raw integer outputs
    pub output_quantizers: Vec<Arc<Quantizer>>,
    /// The integer computation graph
    pub graph: Graph,
    /// Post-processing applied to dequantized raw output
    pub post_processing: PostProcessing,
    /// Options the artifacts were calibrated against
    pub options: CompileOptions,
}

/// A quantized model with its lifecycle state
pub struct Model {
    kind: ModelKind,
    n_bits: NBits,
    state: LifecycleState,
    fitted: Option<FittedParams>,
    artifacts: Option<QuantizedArtifacts>,
    fit_report: Option<FitReport>,
    circuit: Option<Circuit>,
    backend: Box<dyn FheBackend>,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("kind", &self.kind)
            .field("n_bits", &self.n_bits)
            .field("state", &self.state)
            .field("compiled", &self.circuit.is_some())
            .finish()
    }
}

fn default_backend() -> Box<dyn FheBackend> {
    Box::new(InterpreterBackend)
}

impl Model {
    /// Construct a model from a kind and bit-width configuration
    pub fn new(kind: ModelKind, n_bits: NBits) -> Self {
        Self {
            kind,
            n_bits,
            state: LifecycleState::Unfitted,
            fitted: None,
            artifacts: None,
            fit_report: None,
            circuit: None,
            backend: default_backend(),
        }
    }

    /// Linear regressor with default hyperparameters
    pub fn linear_regressor(n_bits: NBits) -> Self {
        Self::new(ModelKind::LinearRegressor(LinearHyper::default()), n_bits)
    }

    /// Logistic classifier with default hyperparameters
    pub fn logistic_classifier(n_bits: NBits) -> Self {
        Self::new(ModelKind::LogisticClassifier(LinearHyper::default()), n_bits)
    }

    /// k-NN classifier with default hyperparameters
    pub fn knn_classifier(n_bits: NBits, n_neighbors: usize) -> Self {
        Self::new(
            ModelKind::KnnClassifier(KnnHyper {
                n_neighbors,
                ..KnnHyper::default()
            }),
            n_bits,
        )
    }

    /// Replace the FHE backend (defaults to the interpreter backend)
    pub fn with_backend(mut self, backend: Box<dyn FheBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Model kind and hyperparameters
    pub fn kind(&self) -> &ModelKind {
        &self.kind
    }

    /// Bit-width configuration
    pub fn n_bits(&self) -> NBits {
        self.n_bits
    }

    /// Report from the last fit, if any
    pub fn fit_report(&self) -> Option<&FitReport> {
        self.fit_report.as_ref()
    }

    /// Calibrated quantizers and graph, once fitted
    pub fn artifacts(&self) -> Option<&QuantizedArtifacts> {
        self.artifacts.as_ref()
    }

    /// Fit the cleartext model, then calibrate on the training data
    ///
    /// Delegates fitting to the solver, then derives quantizers and builds
    /// the graph from the training set so the cleartext-simulation path is
    /// available immediately. Any previously compiled circuit is discarded.
    /// A non-converged solver run is reported, not an error.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Targets) -> Result<FitReport> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(Error::InvalidParameter(
                "training data must be a non-empty 2-D array".to_string(),
            ));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidParameter(
                "training data contains non-finite values".to_string(),
            ));
        }
        if let Targets::Regression(targets) = y {
            if targets.iter().any(|v| !v.is_finite()) {
                return Err(Error::InvalidParameter(
                    "regression targets contain non-finite values".to_string(),
                ));
            }
        }

        let (fitted, report) = match (&self.kind, y) {
            (ModelKind::LinearRegressor(hyper), Targets::Regression(y)) => {
                let (weights, bias, report) = linear::fit_regressor(x, y, hyper)?;
                (
                    FittedParams::Linear {
                        weights,
                        bias,
                        n_classes: None,
                    },
                    report,
                )
            }
            (ModelKind::LogisticClassifier(hyper), Targets::Labels(labels)) => {
                let n_classes = labels.iter().max().map(|&m| m + 1).unwrap_or(0);
                let (weights, bias, report) =
                    linear::fit_classifier(x, labels, n_classes, hyper)?;
                (
                    FittedParams::Linear {
                        weights,
                        bias,
                        n_classes: Some(n_classes),
                    },
                    report,
                )
            }
            (ModelKind::KnnClassifier(hyper), Targets::Labels(labels)) => {
                let n_classes = knn::fit(x, labels, hyper)?;
                (
                    FittedParams::Neighbors {
                        x_fit: x.clone(),
                        labels: labels.clone(),
                        n_classes,
                    },
                    FitReport {
                        converged: true,
                        iterations: 1,
                    },
                )
            }
            _ => {
                return Err(Error::InvalidParameter(
                    "targets do not match the model kind".to_string(),
                ))
            }
        };

        let artifacts = self.calibrate(&fitted, x, &CompileOptions::default())?;

        self.fitted = Some(fitted);
        self.artifacts = Some(artifacts);
        self.fit_report = Some(report.clone());
        self.circuit = None;
        self.state = LifecycleState::Calibrated;
        Ok(report)
    }

    /// Re-calibrate on `x_calibration`, rebuild the graph, and compile it
    ///
    /// Idempotent for a fixed model state and calibration dataset. The
    /// compiled circuit is smoke-executed once before the model commits to
    /// the new artifacts, so a backend failure leaves the prior state intact.
    pub fn compile(&mut self, x_calibration: &Array2<f64>, options: &CompileOptions) -> Result<()> {
        let fitted = self.fitted.as_ref().ok_or(Error::NotFitted)?;
        if x_calibration.ncols() != fitted.n_features() {
            return Err(Error::ShapeMismatch {
                expected: vec![fitted.n_features()],
                got: vec![x_calibration.ncols()],
            });
        }

        let artifacts = self.calibrate(fitted, x_calibration, options)?;
        let q_calibration = QuantizedTensor::quantize(
            x_calibration,
            Arc::clone(&artifacts.input_quantizers[0]),
        );
        let circuit = self
            .backend
            .compile(&artifacts.graph, q_calibration.values(), options)?;

        // Backend handshake: prove the circuit executes before committing
        let row: Vec<i64> = q_calibration.row(0).to_vec();
        self.backend
            .execute(&circuit, &row, ExecutionMode::Simulate)?;

        self.artifacts = Some(artifacts);
        self.circuit = Some(circuit);
        self.state = LifecycleState::Ready;
        Ok(())
    }

    /// Predict labels or values
    ///
    /// With `execute_in_fhe` the compiled circuit runs through the backend's
    /// encrypted path; otherwise the quantized graph is interpreted directly
    /// (available as soon as the model is fitted). Output shape is
    /// `(n_samples, n_outputs)`; classifiers emit one label column.
    pub fn predict(&self, x: &Array2<f64>, execute_in_fhe: bool) -> Result<Array2<f64>> {
        let artifacts = self.require_artifacts()?;
        if execute_in_fhe && self.state < LifecycleState::Compiled {
            return Err(Error::NotCompiled);
        }
        self.check_features(x)?;

        let input_q = &artifacts.input_quantizers[0];
        let n_outputs = self.n_outputs();
        let mut out = Array2::<f64>::zeros((x.nrows(), n_outputs));

        for (i, row) in x.rows().into_iter().enumerate() {
            let q_row: Vec<i64> = row.iter().map(|&v| input_q.quantize(v)).collect();
            let raw = if execute_in_fhe {
                let circuit = self.circuit.as_ref().ok_or(Error::NotCompiled)?;
                self.backend
                    .execute(circuit, &q_row, ExecutionMode::Encrypted)?
            } else {
                graph::evaluate(&artifacts.graph, &q_row, artifacts.graph.output())?
            };

            match artifacts.post_processing {
                PostProcessing::Identity => {
                    let out_q = &artifacts.output_quantizers[0];
                    for (j, &v) in raw.iter().enumerate() {
                        out[[i, j]] = out_q.dequantize(v);
                    }
                }
                // Decision heads emit the label directly
                _ => out[[i, 0]] = raw[0] as f64,
            }
        }
        Ok(out)
    }

    /// Predict class probabilities (classifiers only)
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let artifacts = self.require_artifacts()?;
        let n_classes = artifacts.post_processing.n_classes().ok_or_else(|| {
            Error::InvalidParameter("predict_proba is only defined for classifiers".to_string())
        })?;
        self.check_features(x)?;

        let input_q = &artifacts.input_quantizers[0];
        let scores_node = artifacts.graph.node(artifacts.graph.scores());
        let mut out = Array2::<f64>::zeros((x.nrows(), n_classes));

        for (i, row) in x.rows().into_iter().enumerate() {
            let q_row: Vec<i64> = row.iter().map(|&v| input_q.quantize(v)).collect();
            let raw = graph::evaluate(&artifacts.graph, &q_row, artifacts.graph.scores())?;
            // Accumulator scores dequantize; vote counts are plain integers
            let scores: Vec<f64> = match &scores_node.output_quantizer {
                Some(q) => raw.iter().map(|&v| q.dequantize(v)).collect(),
                None => raw.iter().map(|&v| v as f64).collect(),
            };
            let probs = artifacts.post_processing.probabilities(&scores)?;
            for (j, p) in probs.into_iter().enumerate() {
                out[[i, j]] = p;
            }
        }
        Ok(out)
    }

    /// Reference cleartext predictions from the fitted float parameters
    ///
    /// Used to validate quantized accuracy before committing to encrypted
    /// execution.
    pub fn predict_clear(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let fitted = self.fitted.as_ref().ok_or(Error::NotFitted)?;
        self.check_features(x)?;
        Ok(match (fitted, &self.kind) {
            (
                FittedParams::Linear {
                    weights,
                    bias,
                    n_classes,
                },
                _,
            ) => linear::predict_clear(weights, bias, *n_classes, x),
            (
                FittedParams::Neighbors {
                    x_fit,
                    labels,
                    n_classes,
                },
                ModelKind::KnnClassifier(hyper),
            ) => knn::predict_clear(x_fit, labels, *n_classes, hyper.n_neighbors, x),
            _ => {
                return Err(Error::InvalidParameter(
                    "fitted parameters do not match the model kind".to_string(),
                ))
            }
        })
    }

    /// Full reconstructable state as a versioned snapshot
    pub fn dump(&self) -> Result<ModelSnapshot> {
        if self.fitted.is_none() {
            return Err(Error::NotFitted);
        }
        Ok(ModelSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            kind: self.kind.clone(),
            n_bits: self.n_bits,
            state: self.state,
            fitted: self.fitted.clone(),
            artifacts: self.artifacts.clone(),
            fit_report: self.fit_report.clone(),
        })
    }

    /// Reconstruct a model from a snapshot
    ///
    /// Round-trip identity: the loaded model predicts bit-identically to the
    /// dumped one. Snapshots in a compiled state are recompiled through the
    /// default backend.
    pub fn load(snapshot: ModelSnapshot) -> Result<Self> {
        if snapshot.schema_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(Error::Serialization(format!(
                "unsupported snapshot schema version {}",
                snapshot.schema_version
            )));
        }
        if snapshot.state >= LifecycleState::Fitted && snapshot.fitted.is_none() {
            return Err(Error::Serialization(
                "snapshot claims a fitted state but carries no fitted parameters".to_string(),
            ));
        }
        if snapshot.state >= LifecycleState::Calibrated && snapshot.artifacts.is_none() {
            return Err(Error::Serialization(
                "snapshot claims a calibrated state but carries no artifacts".to_string(),
            ));
        }

        let backend = default_backend();
        let circuit = match (&snapshot.artifacts, snapshot.state >= LifecycleState::Compiled) {
            (Some(artifacts), true) => Some(backend.compile(
                &artifacts.graph,
                &Array2::<i64>::zeros((0, 0)),
                &artifacts.options,
            )?),
            _ => None,
        };

        Ok(Self {
            kind: snapshot.kind,
            n_bits: snapshot.n_bits,
            state: snapshot.state,
            fitted: snapshot.fitted,
            artifacts: snapshot.artifacts,
            fit_report: snapshot.fit_report,
            circuit,
            backend,
        })
    }

    // Internal helpers

    fn calibrate(
        &self,
        fitted: &FittedParams,
        x: &Array2<f64>,
        options: &CompileOptions,
    ) -> Result<QuantizedArtifacts> {
        match (&self.kind, fitted) {
            (
                ModelKind::LinearRegressor(_) | ModelKind::LogisticClassifier(_),
                FittedParams::Linear {
                    weights,
                    bias,
                    n_classes,
                },
            ) => linear::calibrate_and_build(weights, bias, *n_classes, x, self.n_bits, options),
            (
                ModelKind::KnnClassifier(hyper),
                FittedParams::Neighbors {
                    x_fit,
                    labels,
                    n_classes,
                },
            ) => knn::calibrate_and_build(
                x_fit,
                labels,
                *n_classes,
                hyper,
                x,
                self.n_bits,
                options,
            ),
            _ => Err(Error::InvalidParameter(
                "fitted parameters do not match the model kind".to_string(),
            )),
        }
    }

    fn require_artifacts(&self) -> Result<&QuantizedArtifacts> {
        if self.state < LifecycleState::Fitted {
            return Err(Error::NotFitted);
        }
        self.artifacts.as_ref().ok_or(Error::NotFitted)
    }

    fn check_features(&self, x: &Array2<f64>) -> Result<()> {
        let fitted = self.fitted.as_ref().ok_or(Error::NotFitted)?;
        if x.ncols() != fitted.n_features() {
            return Err(Error::ShapeMismatch {
                expected: vec![fitted.n_features()],
                got: vec![x.ncols()],
            });
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidParameter(
                "query contains non-finite values".to_string(),
            ));
        }
        Ok(())
    }

    fn n_outputs(&self) -> usize {
        match (&self.fitted, &self.kind) {
            (Some(FittedParams::Linear { weights, .. }), ModelKind::LinearRegressor(_)) => {
                weights.nrows()
            }
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn regression_data() -> (Array2<f64>, Targets) {
        let x = array![
            [0.0, 0.0],
            [1.0, 0.5],
            [2.0, 1.0],
            [3.0, 1.5],
            [4.0, 2.0],
            [1.0, 2.0],
        ];
        let y = x.map_axis(ndarray::Axis(1), |r| 2.0 * r[0] - r[1] + 1.0);
        (x, Targets::regression(y))
    }

    #[test]
    fn test_unfitted_model_rejects_predict() {
        let model = Model::linear_regressor(NBits::Single(8));
        assert_eq!(model.state(), LifecycleState::Unfitted);

        let x = array![[1.0, 2.0]];
        assert!(matches!(model.predict(&x, false), Err(Error::NotFitted)));
        assert!(matches!(model.predict(&x, true), Err(Error::NotFitted)));
        assert!(matches!(model.predict_clear(&x), Err(Error::NotFitted)));
        assert!(matches!(model.dump(), Err(Error::NotFitted)));
    }

    #[test]
    fn test_fitted_but_not_compiled_rejects_fhe() {
        let (x, y) = regression_data();
        let mut model = Model::linear_regressor(NBits::Single(8));
        model.fit(&x, &y).unwrap();
        assert_eq!(model.state(), LifecycleState::Calibrated);

        let err = model.predict(&x, true).unwrap_err();
        assert!(matches!(err, Error::NotCompiled));

        // Simulation path works without compiling
        assert!(model.predict(&x, false).is_ok());
    }

    #[test]
    fn test_compile_then_fhe_predict() {
        let (x, y) = regression_data();
        let mut model = Model::linear_regressor(NBits::Single(8));
        model.fit(&x, &y).unwrap();
        model.compile(&x, &CompileOptions::default()).unwrap();
        assert_eq!(model.state(), LifecycleState::Ready);

        let sim = model.predict(&x, false).unwrap();
        let fhe = model.predict(&x, true).unwrap();
        assert_eq!(sim, fhe);
    }

    #[test]
    fn test_compile_failure_preserves_state() {
        let (x, y) = regression_data();
        let mut model = Model::linear_regressor(NBits::Single(8));
        model.fit(&x, &y).unwrap();
        let before = model.artifacts().unwrap().clone();

        let tight = CompileOptions {
            max_accumulator_bits: 10,
        };
        let err = model.compile(&x, &tight).unwrap_err();
        assert!(matches!(err, Error::BitWidthOverflow { .. }));

        // Prior state untouched: still calibrated, old artifacts intact
        assert_eq!(model.state(), LifecycleState::Calibrated);
        assert_eq!(model.artifacts().unwrap(), &before);
        assert!(model.predict(&x, false).is_ok());
    }

    #[test]
    fn test_refit_discards_circuit() {
        let (x, y) = regression_data();
        let mut model = Model::linear_regressor(NBits::Single(8));
        model.fit(&x, &y).unwrap();
        model.compile(&x, &CompileOptions::default()).unwrap();
        assert_eq!(model.state(), LifecycleState::Ready);

        model.fit(&x, &y).unwrap();
        assert_eq!(model.state(), LifecycleState::Calibrated);
        assert!(matches!(model.predict(&x, true), Err(Error::NotCompiled)));
    }

    #[test]
    fn test_compile_is_idempotent() {
        let (x, y) = regression_data();
        let mut model = Model::linear_regressor(NBits::Single(8));
        model.fit(&x, &y).unwrap();

        model.compile(&x, &CompileOptions::default()).unwrap();
        let first = model.artifacts().unwrap().clone();
        model.compile(&x, &CompileOptions::default()).unwrap();
        let second = model.artifacts().unwrap().clone();

        assert_eq!(first, second);
    }

    #[test]
    fn test_targets_must_match_kind() {
        let (x, _) = regression_data();
        let mut model = Model::linear_regressor(NBits::Single(8));
        let err = model.fit(&x, &Targets::labels(vec![0; 6])).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
        assert_eq!(model.state(), LifecycleState::Unfitted);
    }

    #[test]
    fn test_fit_rejects_non_finite_training_data() {
        let x = array![[f64::NAN, 1.0], [0.0, 2.0], [1.0, 3.0]];
        let y = Targets::regression(array![1.0, 2.0, 3.0]);

        let mut linear = Model::linear_regressor(NBits::Single(8));
        let err = linear.fit(&x, &y).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
        assert_eq!(linear.state(), LifecycleState::Unfitted);

        let mut knn = Model::knn_classifier(NBits::Single(8), 1);
        let err = knn.fit(&x, &Targets::labels(vec![0, 1, 0])).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn test_fit_rejects_non_finite_targets() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = Targets::regression(array![1.0, f64::INFINITY, 3.0]);
        let mut model = Model::linear_regressor(NBits::Single(8));
        let err = model.fit(&x, &y).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn test_non_finite_queries_are_rejected() {
        let (x, y) = regression_data();
        let mut model = Model::linear_regressor(NBits::Single(8));
        model.fit(&x, &y).unwrap();

        let bad = array![[f64::NAN, 0.0]];
        assert!(matches!(
            model.predict_clear(&bad),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            model.predict(&bad, false),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_knn_rejects_non_finite_query() {
        let x = array![[0.0, 0.0], [5.0, 5.0], [5.1, 5.1], [0.2, 0.1]];
        let mut model = Model::knn_classifier(NBits::Single(8), 1);
        model.fit(&x, &Targets::labels(vec![0, 1, 1, 0])).unwrap();

        let bad = array![[f64::NAN, 1.0]];
        assert!(matches!(
            model.predict_clear(&bad),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            model.predict_proba(&bad),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_predict_proba_rejected_for_regression() {
        let (x, y) = regression_data();
        let mut model = Model::linear_regressor(NBits::Single(8));
        model.fit(&x, &y).unwrap();
        assert!(matches!(
            model.predict_proba(&x),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_predict_checks_feature_count() {
        let (x, y) = regression_data();
        let mut model = Model::linear_regressor(NBits::Single(8));
        model.fit(&x, &y).unwrap();
        let narrow = array![[1.0]];
        assert!(matches!(
            model.predict(&narrow, false),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_dump_load_round_trip_predictions() {
        let (x, y) = regression_data();
        let mut model = Model::linear_regressor(NBits::Single(8));
        model.fit(&x, &y).unwrap();
        model.compile(&x, &CompileOptions::default()).unwrap();

        let snapshot = model.dump().unwrap();
        let restored = Model::load(snapshot).unwrap();

        assert_eq!(restored.state(), LifecycleState::Ready);
        assert_eq!(model.predict(&x, false).unwrap(), restored.predict(&x, false).unwrap());
        assert_eq!(model.predict(&x, true).unwrap(), restored.predict(&x, true).unwrap());
    }

    #[test]
    fn test_load_rejects_unknown_schema() {
        let (x, y) = regression_data();
        let mut model = Model::linear_regressor(NBits::Single(8));
        model.fit(&x, &y).unwrap();
        let mut snapshot = model.dump().unwrap();
        snapshot.schema_version = 99;
        assert!(matches!(
            Model::load(snapshot),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_logistic_end_to_end_simulation() {
        // Two well-separated 2-D clusters
        let x = array![
            [-2.0, -2.1],
            [-1.8, -2.3],
            [-2.2, -1.9],
            [-2.4, -2.0],
            [2.0, 2.1],
            [1.8, 2.3],
            [2.2, 1.9],
            [2.4, 2.0],
        ];
        let labels = vec![0usize, 0, 0, 0, 1, 1, 1, 1];

        let mut model = Model::logistic_classifier(NBits::Single(16));
        model.fit(&x, &Targets::labels(labels.clone())).unwrap();

        let pred = model.predict(&x, false).unwrap();
        for (i, &label) in labels.iter().enumerate() {
            assert_eq!(pred[[i, 0]], label as f64, "sample {i}");
        }

        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.ncols(), 2);
        for i in 0..x.nrows() {
            let s: f64 = proba.row(i).sum();
            assert!((s - 1.0).abs() < 1e-9);
        }
    }
}
