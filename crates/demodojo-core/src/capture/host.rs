use super::{
    buffer::ChunkBuffer,
    container::{assemble, patch_duration},
    guard::TrackGuard,
};
use crate::{
    ArtifactSink, CaptureCommand, CaptureDevice, CaptureHandle, Clock, CoreError, CoreResult,
    Envelope, MediaStream, Message, SessionId, SourceDescriptor,
};

use std::{fmt, panic::Location};

use chrono::{DateTime, Utc};
use error_location::ErrorLocation;
use tracing::{debug, error, info, instrument, warn};

/// Lifecycle of the capture resource currently held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Source granted, encoder not yet started.
    Acquired,
    /// Encoder producing chunks.
    Recording,
    /// Encoder suspended.
    Paused,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureState::Acquired => "acquired",
            CaptureState::Recording => "recording",
            CaptureState::Paused => "paused",
        };
        f.write_str(name)
    }
}

/// A chunk accepted into the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkReceipt {
    /// Capture the chunk belongs to.
    pub handle: CaptureHandle,
    /// Host-assigned sequence number, starting at 0.
    pub seq: u64,
    /// Chunk size in bytes.
    pub size: u64,
}

/// Result of a successful stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedArtifact {
    /// Capture that produced the artifact.
    pub handle: CaptureHandle,
    /// Session the artifact belongs to.
    pub session_id: SessionId,
    /// Where the sink stored it.
    pub artifact_ref: String,
    /// Effective duration written into the container.
    pub duration_ms: u64,
    /// Duration could not be computed from the timeline.
    pub duration_unreliable: bool,
    /// Buffered chunks had holes or reordering.
    pub sequence_gap_detected: bool,
    /// Chunks in the container.
    pub chunk_count: usize,
}

struct ActiveCapture<S: MediaStream> {
    handle: CaptureHandle,
    session_id: SessionId,
    guard: TrackGuard<S>,
    state: CaptureState,
    buffer: ChunkBuffer,
    next_seq: u64,
    started_at: Option<DateTime<Utc>>,
    paused_since: Option<DateTime<Utc>>,
    paused_ms: i64,
}

impl<S: MediaStream> ActiveCapture<S> {
    fn effective_ms(&self, now: DateTime<Utc>) -> Option<i64> {
        let started_at = self.started_at?;
        let open_pause = self
            .paused_since
            .map_or(0, |since| (now - since).num_milliseconds().max(0));
        Some((now - started_at).num_milliseconds() - self.paused_ms - open_pause)
    }
}

/// Owns the capture device and at most one live capture.
///
/// Drives the device through acquire, start, pause, resume and stop,
/// buffers chunks, and finalizes them into an artifact with a corrected
/// duration. Device tracks are released on every exit path.
pub struct CaptureHost<D: CaptureDevice, K: ArtifactSink, C: Clock> {
    device: D,
    sink: K,
    clock: C,
    active: Option<ActiveCapture<D::Stream>>,
}

impl<D: CaptureDevice, K: ArtifactSink, C: Clock> CaptureHost<D, K, C> {
    /// Host with no capture held.
    pub fn new(device: D, sink: K, clock: C) -> Self {
        Self {
            device,
            sink,
            clock,
            active: None,
        }
    }

    /// Handle of the capture currently held.
    pub fn active_handle(&self) -> Option<CaptureHandle> {
        self.active.as_ref().map(|a| a.handle)
    }

    /// State of the capture currently held.
    pub fn state(&self) -> Option<CaptureState> {
        self.active.as_ref().map(|a| a.state)
    }

    /// Bytes buffered for the current capture.
    pub fn buffered_bytes(&self) -> u64 {
        self.active.as_ref().map_or(0, |a| a.buffer.total_bytes())
    }

    /// Opens `source` for `session_id`.
    #[track_caller]
    #[instrument(skip(self, source), fields(source_id = %source.source_id))]
    pub fn acquire(
        &mut self,
        session_id: SessionId,
        source: &SourceDescriptor,
        audio_enabled: bool,
    ) -> CoreResult<CaptureHandle> {
        if let Some(active) = &self.active {
            return Err(CoreError::DeviceUnavailable {
                reason: format!("capture {} already active", active.handle),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let stream = self.device.open(source, audio_enabled)?;
        let handle = CaptureHandle::new();

        self.active = Some(ActiveCapture {
            handle,
            session_id,
            guard: TrackGuard::new(stream),
            state: CaptureState::Acquired,
            buffer: ChunkBuffer::new(),
            next_seq: 0,
            started_at: None,
            paused_since: None,
            paused_ms: 0,
        });

        info!(handle = %handle, "Capture acquired");
        Ok(handle)
    }

    /// Starts encoding.
    #[track_caller]
    #[instrument(skip(self))]
    pub fn start(&mut self, handle: CaptureHandle) -> CoreResult<()> {
        let now = self.clock.now();
        let active = self.lookup(handle)?;

        match active.state {
            CaptureState::Acquired => {
                active.guard.stream_mut().start()?;
                active.state = CaptureState::Recording;
                active.started_at = Some(now);
                info!("Capture started");
                Ok(())
            }
            state => Err(invalid_state("start", state)),
        }
    }

    /// Suspends encoding.
    ///
    /// Fails with `InvalidCaptureState` unless the capture is recording.
    #[track_caller]
    #[instrument(skip(self))]
    pub fn pause(&mut self, handle: CaptureHandle) -> CoreResult<()> {
        let now = self.clock.now();
        let active = self.lookup(handle)?;

        match active.state {
            CaptureState::Recording => {
                active.guard.stream_mut().pause()?;
                active.state = CaptureState::Paused;
                active.paused_since = Some(now);
                debug!("Capture paused");
                Ok(())
            }
            state => Err(invalid_state("pause", state)),
        }
    }

    /// Continues encoding.
    ///
    /// Fails with `InvalidCaptureState` unless the capture is paused.
    #[track_caller]
    #[instrument(skip(self))]
    pub fn resume(&mut self, handle: CaptureHandle) -> CoreResult<()> {
        let now = self.clock.now();
        let active = self.lookup(handle)?;

        match active.state {
            CaptureState::Paused => {
                active.guard.stream_mut().resume()?;
                if let Some(since) = active.paused_since.take() {
                    active.paused_ms += (now - since).num_milliseconds().max(0);
                }
                active.state = CaptureState::Recording;
                debug!(paused_ms = active.paused_ms, "Capture resumed");
                Ok(())
            }
            state => Err(invalid_state("resume", state)),
        }
    }

    /// Moves newly encoded data into the buffer.
    ///
    /// Returns `Ok(None)` when nothing is held, the capture is not
    /// recording, or the encoder had nothing new.
    #[track_caller]
    pub fn pull_chunk(&mut self) -> CoreResult<Option<ChunkReceipt>> {
        let Some(active) = self.active.as_mut() else {
            return Ok(None);
        };
        if active.state != CaptureState::Recording {
            return Ok(None);
        }

        match active.guard.stream_mut().take_data()? {
            Some(data) if !data.is_empty() => {
                let seq = active.next_seq;
                let size = data.len() as u64;
                active.next_seq += 1;
                active.buffer.push(seq, data)?;
                Ok(Some(ChunkReceipt {
                    handle: active.handle,
                    seq,
                    size,
                }))
            }
            _ => Ok(None),
        }
    }

    /// Stops the capture and finalizes its artifact.
    ///
    /// Tracks are released before finalization starts and the capture is
    /// gone afterwards whether or not finalization succeeds.
    #[track_caller]
    #[instrument(skip(self))]
    pub fn stop(&mut self, handle: CaptureHandle) -> CoreResult<FinalizedArtifact> {
        self.lookup(handle)?;
        let now = self.clock.now();
        let Some(mut active) = self.active.take() else {
            return Err(unknown_handle(handle));
        };

        // Last partial chunk.
        if active.state == CaptureState::Recording {
            match active.guard.stream_mut().take_data() {
                Ok(Some(data)) if !data.is_empty() => {
                    let seq = active.next_seq;
                    active.next_seq += 1;
                    active.buffer.push(seq, data)?;
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Final flush failed"),
            }
        }

        let reported_duration_ms = active.guard.stream().reported_duration_ms();
        active.guard.release();

        let (duration_ms, duration_unreliable) = match active.effective_ms(now) {
            Some(ms) if ms > 0 => (ms as u64, false),
            effective => {
                warn!(effective_ms = ?effective, "Effective duration unavailable");
                (0, true)
            }
        };
        let sequence_gap_detected = active.buffer.gap_detected();

        let mut container = assemble(
            active.buffer.chunks().iter().map(Vec::as_slice),
            reported_duration_ms,
        )?;
        patch_duration(
            &mut container,
            duration_ms,
            duration_unreliable,
            sequence_gap_detected,
        )?;

        let artifact_ref = self.sink.persist(active.session_id, &container)?;

        info!(
            artifact_ref = %artifact_ref,
            duration_ms,
            reported_duration_ms,
            chunk_count = active.buffer.len(),
            "Capture finalized"
        );

        Ok(FinalizedArtifact {
            handle,
            session_id: active.session_id,
            artifact_ref,
            duration_ms,
            duration_unreliable,
            sequence_gap_detected,
            chunk_count: active.buffer.len(),
        })
    }

    /// Drops the capture without producing an artifact. Returns whether
    /// `handle` was held.
    #[instrument(skip(self))]
    pub fn release(&mut self, handle: CaptureHandle) -> bool {
        match self.active.take_if(|a| a.handle == handle) {
            Some(mut active) => {
                active.guard.release();
                info!(buffered_chunks = active.buffer.len(), "Capture released");
                true
            }
            None => false,
        }
    }

    /// Report of what the host holds, sent after a restart so the
    /// coordinator can detect a lost capture.
    pub fn status(&self) -> Envelope {
        Envelope::new(Message::HostStatus {
            active_handle: self.active_handle(),
        })
    }

    /// Executes a coordinator command and returns the events it produced.
    pub fn execute(&mut self, command: &CaptureCommand) -> Vec<Envelope> {
        match command {
            CaptureCommand::Acquire {
                session_id,
                source,
                audio_enabled,
            } => {
                let message = match self.acquire(*session_id, source, *audio_enabled) {
                    Ok(handle) => Message::SourceGranted { handle },
                    Err(e) => {
                        warn!(session_id = %session_id, error = %e, "Capture acquire failed");
                        Message::SourceDenied {
                            reason: e.category(),
                            detail: e.category().user_message().to_string(),
                        }
                    }
                };
                vec![Envelope::new(message).for_session(*session_id)]
            }
            CaptureCommand::Start { handle } => {
                let result = self.start(*handle);
                self.device_event(*handle, result)
            }
            CaptureCommand::Pause { handle } => {
                let result = self.pause(*handle);
                self.device_event(*handle, result)
            }
            CaptureCommand::Resume { handle } => {
                let result = self.resume(*handle);
                self.device_event(*handle, result)
            }
            CaptureCommand::Stop { session_id, handle } => {
                let message = match self.stop(*handle) {
                    Ok(artifact) => Message::ArtifactReady {
                        handle: artifact.handle,
                        artifact_ref: artifact.artifact_ref,
                        duration_ms: artifact.duration_ms,
                        duration_unreliable: artifact.duration_unreliable,
                        sequence_gap_detected: artifact.sequence_gap_detected,
                    },
                    Err(e) => {
                        error!(handle = %handle, error = %e, "Finalization failed");
                        Message::FinalizeError {
                            handle: *handle,
                            detail: e.to_string(),
                        }
                    }
                };
                vec![Envelope::new(message).for_session(*session_id)]
            }
            CaptureCommand::Release { handle } => {
                if !self.release(*handle) {
                    debug!(handle = %handle, "Release for a capture not held");
                }
                Vec::new()
            }
        }
    }

    /// Pulls one chunk and reports it. Buffer overflow fails the capture.
    pub fn poll(&mut self) -> Vec<Envelope> {
        let session_id = self.active.as_ref().map(|a| a.session_id);

        match self.pull_chunk() {
            Ok(Some(receipt)) => session_id
                .map(|id| {
                    Envelope::new(Message::ChunkAvailable {
                        handle: receipt.handle,
                        seq: receipt.seq,
                        size: receipt.size,
                    })
                    .for_session(id)
                })
                .into_iter()
                .collect(),
            Ok(None) => Vec::new(),
            Err(e) => {
                let handle = self.active_handle();
                error!(error = %e, "Chunk pull failed");
                if let Some(handle) = handle {
                    self.release(handle);
                }
                let event = Envelope::new(Message::HostError {
                    handle,
                    reason: e.category(),
                    detail: e.to_string(),
                });
                match session_id {
                    Some(id) => vec![event.for_session(id)],
                    None => vec![event],
                }
            }
        }
    }

    fn device_event(&mut self, handle: CaptureHandle, result: CoreResult<()>) -> Vec<Envelope> {
        let error = match result {
            Ok(()) => return Vec::new(),
            Err(e) => e,
        };

        match error {
            CoreError::InvalidCaptureState { .. } | CoreError::UnknownHandle { .. } => {
                warn!(handle = %handle, error = %error, "Capture command ignored");
                Vec::new()
            }
            other => {
                error!(handle = %handle, error = %other, "Capture device failed");
                let session_id = self
                    .active
                    .as_ref()
                    .filter(|a| a.handle == handle)
                    .map(|a| a.session_id);
                self.release(handle);
                let event = Envelope::new(Message::HostError {
                    handle: Some(handle),
                    reason: other.category(),
                    detail: other.to_string(),
                });
                match session_id {
                    Some(id) => vec![event.for_session(id)],
                    None => vec![event],
                }
            }
        }
    }

    #[track_caller]
    fn lookup(&mut self, handle: CaptureHandle) -> CoreResult<&mut ActiveCapture<D::Stream>> {
        match self.active.as_mut() {
            Some(active) if active.handle == handle => Ok(active),
            _ => Err(unknown_handle(handle)),
        }
    }
}

#[track_caller]
fn invalid_state(operation: &'static str, state: CaptureState) -> CoreError {
    CoreError::InvalidCaptureState {
        operation,
        state: state.to_string(),
        location: ErrorLocation::from(Location::caller()),
    }
}

#[track_caller]
fn unknown_handle(handle: CaptureHandle) -> CoreError {
    CoreError::UnknownHandle {
        handle,
        location: ErrorLocation::from(Location::caller()),
    }
}
