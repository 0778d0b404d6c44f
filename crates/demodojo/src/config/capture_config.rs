use crate::config::{default_chunk_bytes, default_chunk_interval_ms, default_output_dir};

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

/// Capture Host configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Milliseconds of media per chunk.
    #[serde(default = "default_chunk_interval_ms")]
    pub chunk_interval_ms: u64,
    /// Bytes the synthetic device emits per chunk.
    #[serde(default = "default_chunk_bytes")]
    pub chunk_bytes: usize,
    /// Where finalized artifacts are written.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl CaptureConfig {
    /// Chunk cadence as a [`Duration`]. Never zero.
    pub fn chunk_interval(&self) -> Duration {
        Duration::from_millis(self.chunk_interval_ms.max(1))
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            chunk_interval_ms: default_chunk_interval_ms(),
            chunk_bytes: default_chunk_bytes(),
            output_dir: default_output_dir(),
        }
    }
}
