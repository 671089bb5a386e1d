//! Model saving functionality

use super::format::{SaveConfig, SnapshotFormat};
use crate::model::Model;
use crate::{Error, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Save a model snapshot to a file
///
/// The model must be at least fitted. The compiled circuit, if any, is not
/// written; `load_model` recompiles it.
///
/// # Example
///
/// ```no_run
/// use cifrar::io::{save_model, SaveConfig, SnapshotFormat};
/// use cifrar::{Model, NBits, Targets};
/// use ndarray::array;
///
/// let mut model = Model::linear_regressor(NBits::Single(8));
/// let x = array![[0.0], [1.0], [2.0]];
/// model.fit(&x, &Targets::regression(array![0.0, 2.0, 4.0])).unwrap();
///
/// let config = SaveConfig::new(SnapshotFormat::Json);
/// save_model(&model, "model.json", &config).unwrap();
/// ```
pub fn save_model(model: &Model, path: impl AsRef<Path>, config: &SaveConfig) -> Result<()> {
    let path = path.as_ref();
    let snapshot = model.dump()?;

    let data = match config.format {
        SnapshotFormat::Json => {
            if config.pretty {
                serde_json::to_string_pretty(&snapshot)
                    .map_err(|e| Error::Serialization(format!("JSON serialization failed: {e}")))?
            } else {
                serde_json::to_string(&snapshot)
                    .map_err(|e| Error::Serialization(format!("JSON serialization failed: {e}")))?
            }
        }
        SnapshotFormat::Yaml => serde_yaml::to_string(&snapshot)
            .map_err(|e| Error::Serialization(format!("YAML serialization failed: {e}")))?,
    };

    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    Ok(())
}
