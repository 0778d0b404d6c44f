use crate::{Artifact, Session, SessionFailure, SessionId, SessionState};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read-only view of the session broadcast to Command Surfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Current session, absent when idle.
    pub session_id: Option<SessionId>,
    /// State machine position.
    pub state: SessionState,
    /// Seconds left while counting down.
    pub countdown_remaining: u32,
    /// Recorded time excluding pauses.
    pub effective_duration_ms: i64,
    /// Total paused time.
    pub paused_ms: i64,
    /// Distinct chunks received.
    pub chunk_count: u64,
    /// Bytes received.
    pub total_bytes: u64,
    /// Interactions counted while recording.
    pub interaction_count: u64,
    /// Finalized recording, when completed.
    pub artifact: Option<Artifact>,
    /// Failure reason, when failed.
    pub last_error: Option<SessionFailure>,
    /// Text a surface can show for `last_error`.
    pub user_message: Option<String>,
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
}

impl SessionSnapshot {
    /// Snapshot of `session` (or of an empty store) at `now`.
    pub fn of(session: Option<&Session>, now: DateTime<Utc>) -> Self {
        match session {
            Some(s) if s.state != SessionState::Idle => Self {
                session_id: Some(s.session_id),
                state: s.state,
                countdown_remaining: s.countdown_remaining,
                effective_duration_ms: s.effective_duration_ms(now),
                paused_ms: s.paused_ms(s.stopped_at.unwrap_or(now)),
                chunk_count: s.chunk_count,
                total_bytes: s.total_bytes,
                interaction_count: s.interaction_count,
                artifact: s.artifact.clone(),
                last_error: s.last_error.clone(),
                user_message: s
                    .last_error
                    .as_ref()
                    .map(|e| e.category.user_message().to_string()),
                taken_at: now,
            },
            _ => Self::idle(now),
        }
    }

    /// Snapshot with nothing in progress.
    pub fn idle(now: DateTime<Utc>) -> Self {
        Self {
            session_id: None,
            state: SessionState::Idle,
            countdown_remaining: 0,
            effective_duration_ms: 0,
            paused_ms: 0,
            chunk_count: 0,
            total_bytes: 0,
            interaction_count: 0,
            artifact: None,
            last_error: None,
            user_message: None,
            taken_at: now,
        }
    }
}
