use crate::{
    CaptureHandle, CorrelationId, ErrorCategory, SequenceRanges, SessionId, SessionState,
    SourceDescriptor,
};

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Correlation ids remembered per session for replay detection.
pub(crate) const MAX_REMEMBERED_CORRELATIONS: usize = 256;

/// A span during which capture was paused. `ended_at` is `None` while open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PausedInterval {
    /// When the pause began.
    pub started_at: DateTime<Utc>,
    /// When capture resumed.
    pub ended_at: Option<DateTime<Utc>>,
}

impl PausedInterval {
    /// Milliseconds paused, treating an open interval as ending at `now`.
    pub fn duration_ms(&self, now: DateTime<Utc>) -> i64 {
        let end = self.ended_at.unwrap_or(now);
        (end - self.started_at).num_milliseconds().max(0)
    }
}

/// Why a session ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFailure {
    /// Reported category.
    pub category: ErrorCategory,
    /// Short diagnostic text. Not shown to users.
    pub detail: String,
}

/// The finalized recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Opaque handle or URL of the stored recording.
    pub artifact_ref: String,
    /// Corrected duration written into the container.
    pub duration_ms: u64,
    /// Effective duration came out non-positive.
    pub duration_unreliable: bool,
    /// Chunks arrived out of order or with holes.
    pub sequence_gap_detected: bool,
}

/// Durable record of one recording attempt.
///
/// Written to the session store wholesale after every mutation. A session in
/// `Idle` is a tombstone for the previous attempt; it keeps its id and
/// correlation history so late replays can still be recognised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique per attempt.
    pub session_id: SessionId,
    /// State machine position.
    pub state: SessionState,
    /// What is being captured.
    pub source: SourceDescriptor,
    /// Whether audio was requested.
    pub audio_enabled: bool,
    /// Countdown length requested at start.
    pub countdown_seconds: u32,
    /// Seconds left while in `Countdown`.
    pub countdown_remaining: u32,
    /// When the START was applied.
    pub created_at: DateTime<Utc>,
    /// When the countdown expired and capture began.
    pub recording_started_at: Option<DateTime<Utc>>,
    /// When STOP was applied (or the session failed mid-capture).
    pub stopped_at: Option<DateTime<Utc>>,
    /// Pause spans, in order. At most the last one is open.
    pub paused_intervals: Vec<PausedInterval>,
    /// Distinct chunks reported by the Capture Host.
    pub chunk_count: u64,
    /// Bytes across those chunks.
    pub total_bytes: u64,
    /// Last chunk arrival (or capture start), for stall detection.
    pub last_progress_at: Option<DateTime<Utc>>,
    /// Chunk sequence numbers seen so far.
    pub received_sequences: SequenceRanges,
    /// Set once a chunk arrives out of order or after a hole.
    pub sequence_gap_detected: bool,
    /// Interactions folded in from the page instrumentation.
    pub interaction_count: u64,
    /// Handle of the capture resource acquired for this session.
    pub capture_handle: Option<CaptureHandle>,
    /// Finalized recording; only set in `Completed`.
    pub artifact: Option<Artifact>,
    /// Failure reason; only set in `Failed`.
    pub last_error: Option<SessionFailure>,
    /// Recently applied correlation ids, oldest first.
    pub recent_correlations: VecDeque<CorrelationId>,
}

impl Session {
    /// Creates a session in `Requesting`.
    pub fn new(
        session_id: SessionId,
        source: SourceDescriptor,
        audio_enabled: bool,
        countdown_seconds: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id,
            state: SessionState::Requesting,
            source,
            audio_enabled,
            countdown_seconds,
            countdown_remaining: countdown_seconds,
            created_at: now,
            recording_started_at: None,
            stopped_at: None,
            paused_intervals: Vec::new(),
            chunk_count: 0,
            total_bytes: 0,
            last_progress_at: None,
            received_sequences: SequenceRanges::new(),
            sequence_gap_detected: false,
            interaction_count: 0,
            capture_handle: None,
            artifact: None,
            last_error: None,
            recent_correlations: VecDeque::new(),
        }
    }

    /// The artifact reference, once completed.
    pub fn artifact_ref(&self) -> Option<&str> {
        self.artifact.as_ref().map(|a| a.artifact_ref.as_str())
    }

    /// Total paused milliseconds up to `now`.
    pub fn paused_ms(&self, now: DateTime<Utc>) -> i64 {
        self.paused_intervals.iter().map(|p| p.duration_ms(now)).sum()
    }

    /// Recorded time so far: wall time since capture start minus pauses.
    pub fn effective_duration_ms(&self, now: DateTime<Utc>) -> i64 {
        let Some(started) = self.recording_started_at else {
            return 0;
        };
        let end = self.stopped_at.unwrap_or(now);
        let wall = (end - started).num_milliseconds();
        (wall - self.paused_ms(end)).max(0)
    }

    /// The open pause interval, if paused.
    pub(crate) fn open_pause_mut(&mut self) -> Option<&mut PausedInterval> {
        self.paused_intervals
            .last_mut()
            .filter(|p| p.ended_at.is_none())
    }

    /// Closes the open pause interval, if any, at `now`.
    pub(crate) fn close_pause(&mut self, now: DateTime<Utc>) {
        if let Some(open) = self.open_pause_mut() {
            open.ended_at = Some(now);
        }
    }

    /// Returns `true` if the envelope with this id was already applied.
    pub fn has_applied(&self, correlation_id: &CorrelationId) -> bool {
        self.recent_correlations.contains(correlation_id)
    }

    pub(crate) fn remember(&mut self, correlation_id: CorrelationId) {
        if self.has_applied(&correlation_id) {
            return;
        }
        self.recent_correlations.push_back(correlation_id);
        while self.recent_correlations.len() > MAX_REMEMBERED_CORRELATIONS {
            self.recent_correlations.pop_front();
        }
    }
}
