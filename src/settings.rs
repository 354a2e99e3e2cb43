//! Functions for loading system settings.

use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// A structure containing configuration data for an `EntitySystem`. Missing
/// keys fall back to the defaults when deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemParams {
    /// Entities are created provisional and must be finalized explicitly, and
    /// template construction is handed to worker threads.
    pub threaded: bool,
    /// Sets the number of worker threads. A value of 0 indicates that no job
    /// queue is started, and construction runs on the calling thread.
    pub workers: usize,
    /// Initial capacity of the entity table.
    pub entity_capacity: usize,
    /// Initial capacity of every component pool.
    pub component_capacity: usize,
}

impl Default for SystemParams {
    fn default() -> Self {
        SystemParams {
            threaded: false,
            workers: 0,
            entity_capacity: 1024,
            component_capacity: 256,
        }
    }
}

impl SystemParams {
    /// Parses `SystemParams` from a json document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Returns true if template construction should be handed to a job queue.
    #[inline]
    pub fn use_job_queue(&self) -> bool {
        self.threaded && self.workers > 0
    }
}
