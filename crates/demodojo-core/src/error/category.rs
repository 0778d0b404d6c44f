use std::fmt;

use serde::{Deserialize, Serialize};

/// Reason categories surfaced to Command Surfaces and the notification surface.
///
/// Surfaces only ever see a category (plus a short detail), never the raw
/// underlying error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The user declined the capture-source selection.
    PermissionDenied,
    /// The capture device is busy or missing.
    DeviceUnavailable,
    /// The command is not valid in the current state.
    InvalidStateTransition,
    /// A START arrived while another session is still live.
    SessionActive,
    /// The message refers to a session that is no longer current.
    StaleSession,
    /// Chunk concatenation or duration patching failed.
    FinalizeFailed,
    /// A context restarted mid-session without a clean stop.
    ContextLost,
    /// No chunk arrived within the stall timeout while recording.
    CaptureStalled,
    /// The envelope could not be decoded or named an unknown type.
    MalformedMessage,
    /// Another writer updated the session record first.
    ConcurrentModification,
    /// The session store could not be read or written.
    StoreUnavailable,
}

impl ErrorCategory {
    /// Whether a session failing with this category ends in `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ErrorCategory::PermissionDenied
                | ErrorCategory::DeviceUnavailable
                | ErrorCategory::FinalizeFailed
                | ErrorCategory::ContextLost
                | ErrorCategory::CaptureStalled
        )
    }

    /// Short, user-facing description of the category.
    pub fn user_message(self) -> &'static str {
        match self {
            ErrorCategory::PermissionDenied => {
                "Screen capture permission was declined. Start a new recording to try again."
            }
            ErrorCategory::DeviceUnavailable => {
                "The capture device is busy or unavailable. Start a new recording to try again."
            }
            ErrorCategory::InvalidStateTransition => "That action is not available right now.",
            ErrorCategory::SessionActive => "A recording is already in progress.",
            ErrorCategory::StaleSession => "That request belongs to an earlier recording.",
            ErrorCategory::FinalizeFailed => "The recording could not be saved.",
            ErrorCategory::ContextLost => {
                "The recorder restarted unexpectedly and the recording was lost."
            }
            ErrorCategory::CaptureStalled => "The capture stopped producing video.",
            ErrorCategory::MalformedMessage => "The request could not be understood.",
            ErrorCategory::ConcurrentModification => "The recording changed, please retry.",
            ErrorCategory::StoreUnavailable => "Recording state could not be saved.",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::PermissionDenied => "permission_denied",
            ErrorCategory::DeviceUnavailable => "device_unavailable",
            ErrorCategory::InvalidStateTransition => "invalid_state_transition",
            ErrorCategory::SessionActive => "session_active",
            ErrorCategory::StaleSession => "stale_session",
            ErrorCategory::FinalizeFailed => "finalize_failed",
            ErrorCategory::ContextLost => "context_lost",
            ErrorCategory::CaptureStalled => "capture_stalled",
            ErrorCategory::MalformedMessage => "malformed_message",
            ErrorCategory::ConcurrentModification => "concurrent_modification",
            ErrorCategory::StoreUnavailable => "store_unavailable",
        };
        f.write_str(name)
    }
}
