use std::fmt;

use serde::{Deserialize, Serialize};

/// Session state machine states.
///
/// `Idle → Requesting → Countdown → Recording ⇄ Paused → Finalizing → Completed`,
/// with `Failed` reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No recording in progress.
    #[default]
    Idle,
    /// Waiting for the capture source to be granted.
    Requesting,
    /// Source granted, counting down before capture starts.
    Countdown,
    /// Device is producing chunks.
    Recording,
    /// Device is paused; no chunks are produced.
    Paused,
    /// Capture stopped, artifact being assembled.
    Finalizing,
    /// Artifact produced.
    Completed,
    /// Session ended with an error.
    Failed,
}

impl SessionState {
    /// `Completed` or `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }

    /// Any state other than `Idle`, `Completed` and `Failed`.
    ///
    /// At most one session may be active at a time.
    pub fn is_active(self) -> bool {
        !matches!(
            self,
            SessionState::Idle | SessionState::Completed | SessionState::Failed
        )
    }

    /// States in which the Capture Host holds a resource for the session.
    pub fn holds_capture(self) -> bool {
        matches!(
            self,
            SessionState::Countdown
                | SessionState::Recording
                | SessionState::Paused
                | SessionState::Finalizing
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Requesting => "requesting",
            SessionState::Countdown => "countdown",
            SessionState::Recording => "recording",
            SessionState::Paused => "paused",
            SessionState::Finalizing => "finalizing",
            SessionState::Completed => "completed",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}
