//! Serialization format definitions

use serde::{Deserialize, Serialize};

/// Supported snapshot serialization formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotFormat {
    /// JSON format (human-readable, larger file size)
    Json,

    /// YAML format (human-readable, good for configs)
    Yaml,
}

impl SnapshotFormat {
    /// Get file extension for this format
    pub fn extension(&self) -> &str {
        match self {
            SnapshotFormat::Json => "json",
            SnapshotFormat::Yaml => "yaml",
        }
    }

    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(SnapshotFormat::Json),
            "yaml" | "yml" => Some(SnapshotFormat::Yaml),
            _ => None,
        }
    }
}

/// Configuration for saving snapshots
#[derive(Debug, Clone)]
pub struct SaveConfig {
    /// Serialization format
    pub format: SnapshotFormat,

    /// Whether to pretty-print (JSON only; YAML is always block-style)
    pub pretty: bool,
}

impl SaveConfig {
    /// Create new save config with format
    pub fn new(format: SnapshotFormat) -> Self {
        Self {
            format,
            pretty: true,
        }
    }

    /// Enable/disable pretty printing
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self::new(SnapshotFormat::Json)
    }
}
