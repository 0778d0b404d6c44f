use crate::{CoreError, CoreResult, SessionId};

use std::{
    collections::HashMap,
    fs,
    io::Write,
    panic::Location,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use error_location::ErrorLocation;
use tracing::info;

/// File extension of persisted artifacts.
pub const ARTIFACT_EXTENSION: &str = "ddrc";

/// Destination for finalized artifacts.
pub trait ArtifactSink: Send {
    /// Stores `bytes` for `session_id` and returns an opaque artifact ref.
    fn persist(&mut self, session_id: SessionId, bytes: &[u8]) -> CoreResult<String>;
}

/// Writes artifacts as `<session id>.ddrc` under a directory.
#[derive(Debug, Clone)]
pub struct FileArtifactSink {
    dir: PathBuf,
}

impl FileArtifactSink {
    /// Sink rooted at `dir`. The directory is created on first persist.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Filesystem path behind a `file://` artifact ref.
    pub fn path_of(artifact_ref: &str) -> Option<PathBuf> {
        artifact_ref.strip_prefix("file://").map(PathBuf::from)
    }
}

impl ArtifactSink for FileArtifactSink {
    #[track_caller]
    fn persist(&mut self, session_id: SessionId, bytes: &[u8]) -> CoreResult<String> {
        let persist_failed = |what: &str, e: std::io::Error| CoreError::FinalizeFailed {
            reason: format!("Failed to {what}: {e}"),
            location: ErrorLocation::from(Location::caller()),
        };

        fs::create_dir_all(&self.dir).map_err(|e| persist_failed("create output directory", e))?;

        let final_path = self.dir.join(format!("{session_id}.{ARTIFACT_EXTENSION}"));
        let temp_path = final_path.with_extension(format!("{ARTIFACT_EXTENSION}.tmp"));

        let mut temp_file =
            fs::File::create(&temp_path).map_err(|e| persist_failed("create temp artifact", e))?;
        temp_file
            .write_all(bytes)
            .map_err(|e| persist_failed("write temp artifact", e))?;
        temp_file
            .sync_all()
            .map_err(|e| persist_failed("sync temp artifact", e))?;

        fs::rename(&temp_path, &final_path)
            .map_err(|e| persist_failed("rename temp artifact", e))?;

        info!(path = ?final_path, bytes = bytes.len(), "Artifact persisted");

        Ok(format!("file://{}", final_path.display()))
    }
}

/// Keeps artifacts in memory. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryArtifactSink {
    artifacts: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    failing: bool,
}

impl MemoryArtifactSink {
    /// Sink whose every persist fails.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Bytes stored under `artifact_ref`.
    pub fn get(&self, artifact_ref: &str) -> Option<Vec<u8>> {
        let artifacts = self.artifacts.lock().unwrap_or_else(|p| p.into_inner());
        artifacts.get(artifact_ref).cloned()
    }

    /// Number of stored artifacts.
    pub fn len(&self) -> usize {
        self.artifacts.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// True when nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactSink for MemoryArtifactSink {
    #[track_caller]
    fn persist(&mut self, session_id: SessionId, bytes: &[u8]) -> CoreResult<String> {
        if self.failing {
            return Err(CoreError::FinalizeFailed {
                reason: "artifact storage rejected the write".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let artifact_ref = format!("memory://{session_id}");
        self.artifacts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(artifact_ref.clone(), bytes.to_vec());
        Ok(artifact_ref)
    }
}
