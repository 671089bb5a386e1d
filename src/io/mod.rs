//! Model I/O - Saving and loading model snapshots
//!
//! Snapshots carry the full reconstructable model state in JSON or YAML;
//! compiled circuits are backend-internal and recompiled on load.

mod format;
mod load;
mod save;
mod snapshot;

pub use format::{SaveConfig, SnapshotFormat};
pub use load::load_model;
pub use save::save_model;
pub use snapshot::ModelSnapshot;
