//! Session state machine.
//!
//! Pure transition logic: given the persisted session (if any), one envelope
//! and the current time, produce the next session record plus the capture
//! commands the transition requires. Nothing here touches the store or the
//! device, so every rule can be exercised with plain values.

use crate::{
    Artifact, CaptureCommand, CaptureHandle, CoreError, CoreResult, Envelope, ErrorCategory,
    Message, PausedInterval, Session, SessionFailure, SessionState, SourceDescriptor,
};

use std::panic::Location;

use chrono::{DateTime, Duration, Utc};
use error_location::ErrorLocation;
use tracing::{debug, info, warn};

/// Whether a transition changed the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Applied,
    Noop,
}

/// Result of applying one envelope.
#[derive(Debug, Clone)]
pub(crate) struct Transition {
    pub(crate) next: Option<Session>,
    pub(crate) outcome: Outcome,
    pub(crate) commands: Vec<CaptureCommand>,
}

impl Transition {
    fn applied(next: Session) -> Self {
        Self {
            next: Some(next),
            outcome: Outcome::Applied,
            commands: Vec::new(),
        }
    }

    fn noop(current: Option<Session>) -> Self {
        Self {
            next: current,
            outcome: Outcome::Noop,
            commands: Vec::new(),
        }
    }

    fn with_command(mut self, command: CaptureCommand) -> Self {
        self.commands.push(command);
        self
    }

    fn with_release(self, handle: Option<CaptureHandle>) -> Self {
        match handle {
            Some(handle) => self.with_command(CaptureCommand::Release { handle }),
            None => self,
        }
    }
}

/// Applies envelopes to session records.
#[derive(Debug, Clone)]
pub(crate) struct SessionMachine {
    default_countdown_secs: u32,
    stall_timeout: Duration,
    host_timeout: Duration,
}

impl SessionMachine {
    pub(crate) fn new(
        default_countdown_secs: u32,
        stall_timeout: Duration,
        host_timeout: Duration,
    ) -> Self {
        Self {
            default_countdown_secs,
            stall_timeout,
            host_timeout,
        }
    }

    /// Applies `envelope` to `current`.
    ///
    /// Errors are rejections: the caller must leave the stored session as is.
    #[track_caller]
    pub(crate) fn apply(
        &self,
        current: Option<Session>,
        envelope: &Envelope,
        now: DateTime<Utc>,
    ) -> CoreResult<Transition> {
        let replayed = current
            .as_ref()
            .is_some_and(|s| s.has_applied(&envelope.correlation_id));

        if replayed && !matches!(envelope.message, Message::Start { .. }) {
            debug!(
                correlation_id = %envelope.correlation_id,
                kind = envelope.message.kind(),
                "Replayed envelope ignored"
            );
            return Ok(Transition::noop(current));
        }

        if let Some(addressed) = envelope.session_id {
            if envelope.message.is_host_event()
                && current.as_ref().map(|s| s.session_id) != Some(addressed)
            {
                return Ok(foreign_host_event(current, envelope));
            }
        }

        check_addressing(current.as_ref(), envelope)?;

        let mut transition = match &envelope.message {
            Message::Start {
                source,
                audio_enabled,
                countdown_seconds,
            } => {
                if replayed {
                    return Err(duplicate_session(current.as_ref(), envelope));
                }
                self.start(current, envelope, source, *audio_enabled, *countdown_seconds, now)?
            }
            Message::QueryState => Transition::noop(current),
            Message::Pause => pause(current, now)?,
            Message::Resume => resume(current, now)?,
            Message::Stop => stop(current, now),
            Message::Reset => reset(current),
            Message::Tick { remaining } => tick(current, *remaining, now),
            Message::Interaction { count } => interaction(current, *count),
            Message::SourceGranted { handle } => source_granted(current, *handle),
            Message::SourceDenied { reason, detail } => source_denied(current, *reason, detail, now),
            Message::ChunkAvailable { handle, seq, size } => {
                chunk_available(current, *handle, *seq, *size, now)
            }
            Message::ArtifactReady {
                handle,
                artifact_ref,
                duration_ms,
                duration_unreliable,
                sequence_gap_detected,
            } => artifact_ready(
                current,
                *handle,
                Artifact {
                    artifact_ref: artifact_ref.clone(),
                    duration_ms: *duration_ms,
                    duration_unreliable: *duration_unreliable,
                    sequence_gap_detected: *sequence_gap_detected,
                },
            ),
            Message::FinalizeError { handle, detail } => finalize_error(current, *handle, detail, now),
            Message::HostError {
                handle,
                reason,
                detail,
            } => host_error(current, *handle, *reason, detail, now),
            Message::HostStatus { active_handle } => host_status(current, *active_handle, now),
            Message::Watchdog => self.watchdog(current, now),
        };

        if transition.outcome == Outcome::Applied {
            if let Some(next) = transition.next.as_mut() {
                next.remember(envelope.correlation_id);
            }
        }

        Ok(transition)
    }

    fn start(
        &self,
        current: Option<Session>,
        envelope: &Envelope,
        source: &SourceDescriptor,
        audio_enabled: bool,
        countdown_seconds: Option<u32>,
        now: DateTime<Utc>,
    ) -> CoreResult<Transition> {
        if let Some(existing) = &current {
            if existing.state.is_active() {
                return Err(CoreError::SessionActive {
                    session_id: existing.session_id,
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            if envelope.session_id == Some(existing.session_id) {
                return Err(duplicate_session(current.as_ref(), envelope));
            }
        }

        let session_id = envelope.session_id.unwrap_or_default();
        let mut next = Session::new(
            session_id,
            source.clone(),
            audio_enabled,
            countdown_seconds.unwrap_or(self.default_countdown_secs),
            now,
        );

        // Keep replay detection working for envelopes of the retired session.
        if let Some(previous) = current {
            next.recent_correlations = previous.recent_correlations;
        }

        info!(
            session_id = %session_id,
            countdown_seconds = next.countdown_seconds,
            audio_enabled,
            "Session requested"
        );

        Ok(Transition::applied(next).with_command(CaptureCommand::Acquire {
            session_id,
            source: source.clone(),
            audio_enabled,
        }))
    }

    fn watchdog(&self, current: Option<Session>, now: DateTime<Utc>) -> Transition {
        let Some(session) = current else {
            return Transition::noop(None);
        };

        match session.state {
            SessionState::Recording => self.stalled(session, now),
            SessionState::Requesting => {
                let since = session.created_at;
                self.abandoned(session, since, "no answer to capture request", now)
            }
            SessionState::Finalizing => {
                let since = session.stopped_at.unwrap_or(session.created_at);
                self.abandoned(session, since, "no answer to stop request", now)
            }
            _ => Transition::noop(Some(session)),
        }
    }

    fn stalled(&self, session: Session, now: DateTime<Utc>) -> Transition {
        let last = session
            .last_progress_at
            .or(session.recording_started_at)
            .unwrap_or(session.created_at);

        if now - last <= self.stall_timeout {
            return Transition::noop(Some(session));
        }

        warn!(
            session_id = %session.session_id,
            chunk_count = session.chunk_count,
            silent_ms = (now - last).num_milliseconds(),
            "Capture stalled"
        );

        let handle = session.capture_handle;
        Transition::applied(fail(
            session,
            ErrorCategory::CaptureStalled,
            "no chunk within stall timeout",
            now,
        ))
        .with_release(handle)
    }

    /// Fails a session whose host command was lost, e.g. across a restart.
    fn abandoned(
        &self,
        session: Session,
        since: DateTime<Utc>,
        detail: &str,
        now: DateTime<Utc>,
    ) -> Transition {
        if now - since <= self.host_timeout {
            return Transition::noop(Some(session));
        }

        warn!(
            session_id = %session.session_id,
            state = %session.state,
            waited_ms = (now - since).num_milliseconds(),
            "Capture Host never answered"
        );

        let handle = session.capture_handle;
        Transition::applied(fail(session, ErrorCategory::ContextLost, detail, now))
            .with_release(handle)
    }
}

#[track_caller]
fn check_addressing(current: Option<&Session>, envelope: &Envelope) -> CoreResult<()> {
    let Some(received) = envelope.session_id else {
        return Ok(());
    };
    if envelope.message.is_host_event()
        || matches!(envelope.message, Message::Start { .. } | Message::QueryState)
    {
        return Ok(());
    }

    let current_id = current
        .filter(|s| s.state != SessionState::Idle)
        .map(|s| s.session_id);

    if current_id == Some(received) {
        Ok(())
    } else {
        Err(CoreError::StaleSession {
            received,
            current: current_id,
            location: ErrorLocation::from(Location::caller()),
        })
    }
}

/// Host event produced for a session that is no longer current. Grants are
/// handed back; everything else is dropped.
fn foreign_host_event(current: Option<Session>, envelope: &Envelope) -> Transition {
    debug!(
        addressed = ?envelope.session_id,
        kind = envelope.message.kind(),
        "Host event for a previous session"
    );
    match envelope.message {
        Message::SourceGranted { handle } => {
            warn!(handle = %handle, "Orphaned capture grant released");
            Transition::noop(current).with_command(CaptureCommand::Release { handle })
        }
        _ => Transition::noop(current),
    }
}

#[track_caller]
fn duplicate_session(current: Option<&Session>, envelope: &Envelope) -> CoreError {
    CoreError::DuplicateSession {
        session_id: envelope
            .session_id
            .or(current.map(|s| s.session_id))
            .unwrap_or_default(),
        location: ErrorLocation::from(Location::caller()),
    }
}

#[track_caller]
fn invalid(command: &'static str, state: SessionState) -> CoreError {
    CoreError::InvalidStateTransition {
        command,
        state,
        location: ErrorLocation::from(Location::caller()),
    }
}

fn state_of(session: Option<&Session>) -> SessionState {
    session.map_or(SessionState::Idle, |s| s.state)
}

/// Moves `session` to `Failed`, closing any open pause.
fn fail(
    mut session: Session,
    category: ErrorCategory,
    detail: impl Into<String>,
    now: DateTime<Utc>,
) -> Session {
    session.close_pause(now);
    if session.recording_started_at.is_some() && session.stopped_at.is_none() {
        session.stopped_at = Some(now);
    }
    session.state = SessionState::Failed;
    session.last_error = Some(SessionFailure {
        category,
        detail: detail.into(),
    });
    info!(session_id = %session.session_id, category = %category, "Session failed");
    session
}

/// Turns `session` into an idle tombstone.
fn retire(mut session: Session) -> Session {
    session.state = SessionState::Idle;
    session.capture_handle = None;
    session.countdown_remaining = 0;
    session
}

#[track_caller]
fn pause(current: Option<Session>, now: DateTime<Utc>) -> CoreResult<Transition> {
    match current {
        Some(mut session) if session.state == SessionState::Recording => {
            let Some(handle) = session.capture_handle else {
                return Ok(Transition::applied(fail(
                    session,
                    ErrorCategory::ContextLost,
                    "recording without capture handle",
                    now,
                )));
            };
            session.state = SessionState::Paused;
            session.paused_intervals.push(PausedInterval {
                started_at: now,
                ended_at: None,
            });
            Ok(Transition::applied(session).with_command(CaptureCommand::Pause { handle }))
        }
        Some(session)
            if session.state == SessionState::Paused
                || session.state == SessionState::Finalizing
                || session.state.is_terminal() =>
        {
            Ok(Transition::noop(Some(session)))
        }
        other => Err(invalid("pause", state_of(other.as_ref()))),
    }
}

#[track_caller]
fn resume(current: Option<Session>, now: DateTime<Utc>) -> CoreResult<Transition> {
    match current {
        Some(mut session) if session.state == SessionState::Paused => {
            let Some(handle) = session.capture_handle else {
                return Ok(Transition::applied(fail(
                    session,
                    ErrorCategory::ContextLost,
                    "paused without capture handle",
                    now,
                )));
            };
            session.close_pause(now);
            session.state = SessionState::Recording;
            // A pause is not a stall.
            session.last_progress_at = Some(now);
            Ok(Transition::applied(session).with_command(CaptureCommand::Resume { handle }))
        }
        Some(session)
            if session.state == SessionState::Recording
                || session.state == SessionState::Finalizing
                || session.state.is_terminal() =>
        {
            Ok(Transition::noop(Some(session)))
        }
        other => Err(invalid("resume", state_of(other.as_ref()))),
    }
}

fn stop(current: Option<Session>, now: DateTime<Utc>) -> Transition {
    let Some(mut session) = current else {
        return Transition::noop(None);
    };

    match session.state {
        SessionState::Requesting | SessionState::Countdown => {
            info!(session_id = %session.session_id, "Session cancelled before capture");
            let handle = session.capture_handle;
            Transition::applied(retire(session)).with_release(handle)
        }
        SessionState::Recording | SessionState::Paused => {
            let Some(handle) = session.capture_handle else {
                return Transition::applied(fail(
                    session,
                    ErrorCategory::ContextLost,
                    "capturing without capture handle",
                    now,
                ));
            };
            session.close_pause(now);
            session.stopped_at = Some(now);
            session.state = SessionState::Finalizing;
            info!(
                session_id = %session.session_id,
                effective_ms = session.effective_duration_ms(now),
                "Session finalizing"
            );
            let session_id = session.session_id;
            Transition::applied(session).with_command(CaptureCommand::Stop { session_id, handle })
        }
        SessionState::Idle
        | SessionState::Finalizing
        | SessionState::Completed
        | SessionState::Failed => Transition::noop(Some(session)),
    }
}

fn reset(current: Option<Session>) -> Transition {
    match current {
        Some(session) if session.state != SessionState::Idle => {
            let handle = session.capture_handle.filter(|_| session.state.is_active());
            info!(session_id = %session.session_id, from = %session.state, "Session reset");
            Transition::applied(retire(session)).with_release(handle)
        }
        other => Transition::noop(other),
    }
}

fn tick(current: Option<Session>, remaining: u32, now: DateTime<Utc>) -> Transition {
    let Some(mut session) = current else {
        return Transition::noop(None);
    };
    if session.state != SessionState::Countdown {
        return Transition::noop(Some(session));
    }

    if remaining == 0 {
        let Some(handle) = session.capture_handle else {
            return Transition::applied(fail(
                session,
                ErrorCategory::ContextLost,
                "countdown without capture handle",
                now,
            ));
        };
        session.state = SessionState::Recording;
        session.countdown_remaining = 0;
        session.recording_started_at = Some(now);
        session.last_progress_at = Some(now);
        info!(session_id = %session.session_id, "Recording started");
        return Transition::applied(session).with_command(CaptureCommand::Start { handle });
    }

    if remaining < session.countdown_remaining {
        session.countdown_remaining = remaining;
        Transition::applied(session)
    } else {
        Transition::noop(Some(session))
    }
}

fn interaction(current: Option<Session>, count: u32) -> Transition {
    match current {
        Some(mut session) if session.state == SessionState::Recording && count > 0 => {
            session.interaction_count = session.interaction_count.saturating_add(u64::from(count));
            Transition::applied(session)
        }
        other => Transition::noop(other),
    }
}

fn source_granted(current: Option<Session>, handle: CaptureHandle) -> Transition {
    match current {
        Some(mut session) if session.state == SessionState::Requesting => {
            session.capture_handle = Some(handle);
            session.state = SessionState::Countdown;
            session.countdown_remaining = session.countdown_seconds;
            info!(
                session_id = %session.session_id,
                handle = %handle,
                countdown_seconds = session.countdown_seconds,
                "Capture source granted"
            );
            Transition::applied(session)
        }
        Some(session) if session.capture_handle == Some(handle) => {
            Transition::noop(Some(session))
        }
        other => {
            // Acquired for a session that is gone; hand it straight back.
            warn!(handle = %handle, "Orphaned capture grant released");
            Transition::noop(other).with_command(CaptureCommand::Release { handle })
        }
    }
}

fn source_denied(
    current: Option<Session>,
    reason: ErrorCategory,
    detail: &str,
    now: DateTime<Utc>,
) -> Transition {
    match current {
        Some(session) if session.state == SessionState::Requesting => {
            let category = match reason {
                ErrorCategory::DeviceUnavailable => ErrorCategory::DeviceUnavailable,
                _ => ErrorCategory::PermissionDenied,
            };
            Transition::applied(fail(session, category, detail, now))
        }
        other => Transition::noop(other),
    }
}

fn chunk_available(
    current: Option<Session>,
    handle: CaptureHandle,
    seq: u64,
    size: u64,
    now: DateTime<Utc>,
) -> Transition {
    match current {
        Some(mut session)
            if session.capture_handle == Some(handle)
                && matches!(
                    session.state,
                    SessionState::Recording | SessionState::Paused | SessionState::Finalizing
                ) =>
        {
            let expected = session.received_sequences.next_expected();
            if !session.received_sequences.insert(seq) {
                return Transition::noop(Some(session));
            }
            if seq != expected {
                warn!(
                    session_id = %session.session_id,
                    seq,
                    expected,
                    "Chunk sequence gap"
                );
                session.sequence_gap_detected = true;
            }
            session.chunk_count = session.chunk_count.saturating_add(1);
            session.total_bytes = session.total_bytes.saturating_add(size);
            session.last_progress_at = Some(now);
            Transition::applied(session)
        }
        other => Transition::noop(other),
    }
}

fn artifact_ready(current: Option<Session>, handle: CaptureHandle, artifact: Artifact) -> Transition {
    match current {
        Some(mut session)
            if session.state == SessionState::Finalizing
                && session.capture_handle == Some(handle) =>
        {
            let artifact = Artifact {
                sequence_gap_detected: artifact.sequence_gap_detected
                    || session.sequence_gap_detected,
                ..artifact
            };
            info!(
                session_id = %session.session_id,
                artifact_ref = %artifact.artifact_ref,
                duration_ms = artifact.duration_ms,
                duration_unreliable = artifact.duration_unreliable,
                sequence_gap_detected = artifact.sequence_gap_detected,
                "Session completed"
            );
            session.artifact = Some(artifact);
            session.state = SessionState::Completed;
            Transition::applied(session)
        }
        other => Transition::noop(other),
    }
}

fn finalize_error(
    current: Option<Session>,
    handle: CaptureHandle,
    detail: &str,
    now: DateTime<Utc>,
) -> Transition {
    match current {
        Some(session)
            if session.state == SessionState::Finalizing
                && session.capture_handle == Some(handle) =>
        {
            Transition::applied(fail(session, ErrorCategory::FinalizeFailed, detail, now))
        }
        other => Transition::noop(other),
    }
}

fn host_error(
    current: Option<Session>,
    handle: Option<CaptureHandle>,
    reason: ErrorCategory,
    detail: &str,
    now: DateTime<Utc>,
) -> Transition {
    match current {
        Some(session)
            if session.state.is_active()
                && (handle.is_none() || handle == session.capture_handle) =>
        {
            let release = session.capture_handle;
            Transition::applied(fail(session, reason, detail, now)).with_release(release)
        }
        other => Transition::noop(other),
    }
}

fn host_status(
    current: Option<Session>,
    active_handle: Option<CaptureHandle>,
    now: DateTime<Utc>,
) -> Transition {
    let Some(session) = current else {
        // Host holds something no session owns.
        return Transition::noop(None).with_release(active_handle);
    };

    if session.state.holds_capture() {
        if session.capture_handle == active_handle {
            return Transition::noop(Some(session));
        }
        warn!(
            session_id = %session.session_id,
            expected = ?session.capture_handle,
            reported = ?active_handle,
            "Capture Host lost the session's capture"
        );
        return Transition::applied(fail(
            session,
            ErrorCategory::ContextLost,
            "capture host restarted without a clean stop",
            now,
        ))
        .with_release(active_handle);
    }

    if session.state == SessionState::Requesting {
        // The grant for this handle may still be in flight.
        return Transition::noop(Some(session));
    }

    Transition::noop(Some(session)).with_release(active_handle)
}
