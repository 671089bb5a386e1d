//! Model loading functionality

use super::format::SnapshotFormat;
use super::snapshot::ModelSnapshot;
use crate::model::Model;
use crate::{Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Load a model from a snapshot file
///
/// The format is detected from the file extension. Snapshots dumped in a
/// compiled state are recompiled through the default backend, so the loaded
/// model predicts bit-identically to the one that was saved.
///
/// # Example
///
/// ```no_run
/// use cifrar::io::load_model;
///
/// let model = load_model("model.json").unwrap();
/// println!("state: {:?}", model.state());
/// ```
pub fn load_model(path: impl AsRef<Path>) -> Result<Model> {
    let path = path.as_ref();

    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::Serialization("file has no extension".to_string()))?;

    let format = SnapshotFormat::from_extension(ext)
        .ok_or_else(|| Error::Serialization(format!("unsupported file extension: {ext}")))?;

    let mut file = File::open(path)?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;

    let snapshot: ModelSnapshot = match format {
        SnapshotFormat::Json => serde_json::from_str(&content)
            .map_err(|e| Error::Serialization(format!("JSON deserialization failed: {e}")))?,
        SnapshotFormat::Yaml => serde_yaml::from_str(&content)
            .map_err(|e| Error::Serialization(format!("YAML deserialization failed: {e}")))?,
    };

    Model::load(snapshot)
}
