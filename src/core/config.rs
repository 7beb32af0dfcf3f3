//! Propagation configuration

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::HierarchyError;

/// Tunables for hierarchy maintenance and the parallel backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationConfig {
    /// Frames a despawned root's buffer stays resolvable
    pub cleanup_frames: u32,
    /// Insert ticked world transforms when installing a hierarchy
    pub track_ticked: bool,
    /// Fewer roots than this are processed on the calling thread
    pub parallel_min_roots: usize,
    /// Default `env_logger` filter for the demo binary
    pub log_filter: String,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            cleanup_frames: 1,
            track_ticked: true,
            parallel_min_roots: 4,
            log_filter: String::from("info"),
        }
    }
}

impl PropagationConfig {
    /// Set how many frames cleanup records survive
    pub fn with_cleanup_frames(mut self, frames: u32) -> Self {
        self.cleanup_frames = frames;
        self
    }

    /// Enable or disable the ticked cache on new hierarchies
    pub fn with_ticked(mut self, track_ticked: bool) -> Self {
        self.track_ticked = track_ticked;
        self
    }

    /// Set the root count at which scoped writes go parallel
    pub fn with_parallel_min_roots(mut self, roots: usize) -> Self {
        self.parallel_min_roots = roots;
        self
    }

    /// Set the default log filter
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Parse a config from RON. Missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid RON for this type
    pub fn from_ron_str(text: &str) -> Result<Self, HierarchyError> {
        ron::from_str(text).map_err(|e| HierarchyError::DeserializeError(e.to_string()))
    }

    /// Load a config from a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load_ron(path: impl AsRef<Path>) -> Result<Self, HierarchyError> {
        let content = fs::read_to_string(path).map_err(|e| HierarchyError::IoError(e.to_string()))?;
        Self::from_ron_str(&content)
    }
}
