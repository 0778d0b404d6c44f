use crate::{
    CaptureHandle, CoreError, CoreResult, CorrelationId, ErrorCategory, SessionId,
    SourceDescriptor,
};

use std::panic::Location;

use error_location::ErrorLocation;
use serde::{Deserialize, Serialize};

/// Every message that crosses a context boundary towards the Coordinator.
///
/// Commands come from Command Surfaces, events from the Capture Host and
/// the host's own timers. Unknown `type` values fail to decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Begin a new session.
    #[serde(rename_all = "camelCase")]
    Start {
        /// Target returned by the capture-target picker.
        source: SourceDescriptor,
        /// Capture audio alongside video.
        #[serde(default)]
        audio_enabled: bool,
        /// Countdown before capture; host default when absent.
        #[serde(default)]
        countdown_seconds: Option<u32>,
    },
    /// Pause capture.
    Pause,
    /// Resume capture.
    Resume,
    /// Stop capture (or cancel before it starts).
    Stop,
    /// Return a finished or abandoned session to idle.
    Reset,
    /// Ask for the current snapshot without changing anything.
    QueryState,
    /// Countdown timer announcing the seconds left.
    #[serde(rename_all = "camelCase")]
    Tick {
        /// Seconds left after this tick; `0` expires the countdown.
        remaining: u32,
    },
    /// Interaction increment from the page instrumentation.
    #[serde(rename_all = "camelCase")]
    Interaction {
        /// Interactions since the previous increment.
        count: u32,
    },
    /// Capture Host acquired the source.
    #[serde(rename_all = "camelCase")]
    SourceGranted {
        /// Token for the acquired resource.
        handle: CaptureHandle,
    },
    /// Capture Host could not acquire the source.
    #[serde(rename_all = "camelCase")]
    SourceDenied {
        /// `permission_denied` or `device_unavailable`.
        reason: ErrorCategory,
        /// Diagnostic text.
        #[serde(default)]
        detail: String,
    },
    /// Capture Host buffered a chunk.
    #[serde(rename_all = "camelCase")]
    ChunkAvailable {
        /// Resource that produced the chunk.
        handle: CaptureHandle,
        /// Per-capture sequence number, starting at 0.
        seq: u64,
        /// Chunk size in bytes.
        size: u64,
    },
    /// Capture Host finalized the recording.
    #[serde(rename_all = "camelCase")]
    ArtifactReady {
        /// Resource that was finalized.
        handle: CaptureHandle,
        /// Where the artifact lives.
        artifact_ref: String,
        /// Corrected duration.
        duration_ms: u64,
        /// Effective duration was non-positive.
        duration_unreliable: bool,
        /// Chunk sequence had holes or reordering.
        sequence_gap_detected: bool,
    },
    /// Capture Host failed to finalize; tracks were still released.
    #[serde(rename_all = "camelCase")]
    FinalizeError {
        /// Resource that failed.
        handle: CaptureHandle,
        /// Diagnostic text.
        detail: String,
    },
    /// Capture Host hit an unrecoverable device error.
    #[serde(rename_all = "camelCase")]
    HostError {
        /// Affected resource, when known.
        #[serde(default)]
        handle: Option<CaptureHandle>,
        /// Reported category.
        reason: ErrorCategory,
        /// Diagnostic text.
        #[serde(default)]
        detail: String,
    },
    /// Capture Host (re)started and reports what it currently holds.
    #[serde(rename_all = "camelCase")]
    HostStatus {
        /// Handle of the live capture, if any.
        #[serde(default)]
        active_handle: Option<CaptureHandle>,
    },
    /// Periodic liveness check for a recording capture.
    Watchdog,
}

impl Message {
    /// Wire name of the message type.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Start { .. } => "START",
            Message::Pause => "PAUSE",
            Message::Resume => "RESUME",
            Message::Stop => "STOP",
            Message::Reset => "RESET",
            Message::QueryState => "QUERY_STATE",
            Message::Tick { .. } => "TICK",
            Message::Interaction { .. } => "INTERACTION",
            Message::SourceGranted { .. } => "SOURCE_GRANTED",
            Message::SourceDenied { .. } => "SOURCE_DENIED",
            Message::ChunkAvailable { .. } => "CHUNK_AVAILABLE",
            Message::ArtifactReady { .. } => "ARTIFACT_READY",
            Message::FinalizeError { .. } => "FINALIZE_ERROR",
            Message::HostError { .. } => "HOST_ERROR",
            Message::HostStatus { .. } => "HOST_STATUS",
            Message::Watchdog => "WATCHDOG",
        }
    }

    /// Events originate from the Capture Host; everything else is a command.
    pub fn is_host_event(&self) -> bool {
        matches!(
            self,
            Message::SourceGranted { .. }
                | Message::SourceDenied { .. }
                | Message::ChunkAvailable { .. }
                | Message::ArtifactReady { .. }
                | Message::FinalizeError { .. }
                | Message::HostError { .. }
                | Message::HostStatus { .. }
        )
    }
}

/// Transport wrapper around a [`Message`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Unique per logical send; replays reuse it.
    pub correlation_id: CorrelationId,
    /// Session the sender believes is current.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// The message itself.
    pub message: Message,
}

impl Envelope {
    /// Wraps `message` with a fresh correlation id and no session id.
    pub fn new(message: Message) -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            session_id: None,
            message,
        }
    }

    /// Addresses the envelope to `session_id`.
    pub fn for_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Decodes a JSON text frame.
    #[track_caller]
    pub fn decode(text: &str) -> CoreResult<Self> {
        serde_json::from_str(text).map_err(|source| CoreError::MalformedMessage {
            source,
            location: ErrorLocation::from(Location::caller()),
        })
    }

    /// Encodes to a JSON text frame.
    #[track_caller]
    pub fn encode(&self) -> CoreResult<String> {
        serde_json::to_string(self).map_err(|source| CoreError::MalformedMessage {
            source,
            location: ErrorLocation::from(Location::caller()),
        })
    }

    /// Best-effort correlation id of a frame that failed to decode, so the
    /// rejection can still be matched by the sender.
    pub fn correlation_hint(text: &str) -> Option<CorrelationId> {
        let value: serde_json::Value = serde_json::from_str(text).ok()?;
        serde_json::from_value(value.get("correlationId")?.clone()).ok()
    }
}
