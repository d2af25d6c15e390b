//! Queue configuration

use serde::{Deserialize, Serialize};
use sylva_core::config::object_from_json;
use sylva_core::Result;

/// Sizing of the task queue between submitters and the model thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Tasks buffered before `put` blocks; 0 is treated as 1
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

impl QueueConfig {
    /// # Errors
    /// * `Serialization` - If the text is not a valid config object
    pub fn from_json(text: &str) -> Result<Self> {
        object_from_json(text, "queue config")
    }

    pub(crate) fn bound(&self) -> usize {
        self.capacity.max(1)
    }
}
