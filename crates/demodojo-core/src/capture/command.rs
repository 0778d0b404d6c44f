use crate::{CaptureHandle, SessionId, SourceDescriptor};

use serde::{Deserialize, Serialize};

/// Coarse commands the Coordinator issues to the Capture Host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum CaptureCommand {
    /// Acquire the source for a new session.
    Acquire {
        /// Session the capture belongs to.
        session_id: SessionId,
        /// What to capture.
        source: SourceDescriptor,
        /// Capture audio as well.
        audio_enabled: bool,
    },
    /// Begin producing chunks.
    Start {
        /// Resource to start.
        handle: CaptureHandle,
    },
    /// Stop producing chunks until resumed.
    Pause {
        /// Resource to pause.
        handle: CaptureHandle,
    },
    /// Produce chunks again.
    Resume {
        /// Resource to resume.
        handle: CaptureHandle,
    },
    /// Stop, finalize the artifact and release the device.
    Stop {
        /// Session the artifact belongs to.
        session_id: SessionId,
        /// Resource to stop.
        handle: CaptureHandle,
    },
    /// Release the device without producing an artifact.
    Release {
        /// Resource to release.
        handle: CaptureHandle,
    },
}

impl CaptureCommand {
    /// Handle the command targets, if it targets one.
    pub fn handle(&self) -> Option<CaptureHandle> {
        match self {
            CaptureCommand::Acquire { .. } => None,
            CaptureCommand::Start { handle }
            | CaptureCommand::Pause { handle }
            | CaptureCommand::Resume { handle }
            | CaptureCommand::Stop { handle, .. }
            | CaptureCommand::Release { handle } => Some(*handle),
        }
    }
}
