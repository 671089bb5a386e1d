//! Versioned on-disk representation of a model

use crate::model::{FittedParams, LifecycleState, ModelKind, QuantizedArtifacts};
use crate::quant::NBits;
use crate::solver::FitReport;
use serde::{Deserialize, Serialize};

/// Everything needed to reconstruct a model, minus the compiled circuit
///
/// Circuits are backend-internal and never serialized; a snapshot in a
/// compiled state is recompiled on load. The schema version is checked on
/// load so stale files fail loudly instead of deserializing into garbage.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelSnapshot {
    /// Schema version this snapshot was written with
    pub schema_version: u32,
    /// Model kind and hyperparameters
    pub kind: ModelKind,
    /// Bit-width configuration
    pub n_bits: NBits,
    /// Lifecycle state at dump time
    pub state: LifecycleState,
    /// Fitted cleartext parameters, if any
    pub fitted: Option<FittedParams>,
    /// Calibrated quantizers and graph, if any
    pub artifacts: Option<QuantizedArtifacts>,
    /// Report from the last fit, if any
    pub fit_report: Option<FitReport>,
}
