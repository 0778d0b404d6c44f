mod category;

pub use category::ErrorCategory;

use crate::{CaptureHandle, SessionId, SessionState};

use error_location::ErrorLocation;
use thiserror::Error;

/// Recording coordination errors with source location tracking.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The capture source was denied by the user or the platform picker.
    #[error("Capture permission denied for source {source_id} {location}")]
    PermissionDenied {
        /// Opaque id of the denied source.
        source_id: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Capture device busy or missing.
    #[error("Capture device unavailable: {reason} {location}")]
    DeviceUnavailable {
        /// Description of the device problem.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Capture resource is not in the state the operation expects.
    #[error("Capture {operation} not valid while {state} {location}")]
    InvalidCaptureState {
        /// Attempted device operation.
        operation: &'static str,
        /// Current capture state.
        state: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Handle does not name the capture currently held.
    #[error("Unknown capture handle {handle} {location}")]
    UnknownHandle {
        /// The stale or foreign handle.
        handle: CaptureHandle,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Session command not valid in the current session state.
    #[error("Cannot {command} while session is {state} {location}")]
    InvalidStateTransition {
        /// Rejected command name.
        command: &'static str,
        /// Session state at the time of the command.
        state: SessionState,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// START while another session is live.
    #[error("Session {session_id} is still active {location}")]
    SessionActive {
        /// The live session.
        session_id: SessionId,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// START replayed with the id of a session that already exists.
    #[error("Session {session_id} already exists {location}")]
    DuplicateSession {
        /// The replayed id.
        session_id: SessionId,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Message addressed to a session other than the current one.
    #[error("Message for session {received} but current is {current:?} {location}")]
    StaleSession {
        /// Session id carried by the message.
        received: SessionId,
        /// Current session id, if any.
        current: Option<SessionId>,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Chunk concatenation, metadata patch or artifact persistence failed.
    #[error("Finalize failed: {reason} {location}")]
    FinalizeFailed {
        /// Description of the failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Chunk buffer exceeded its memory bound.
    #[error("Chunk buffer overflow at {buffered_bytes} bytes {location}")]
    BufferOverflow {
        /// Bytes buffered when the limit was hit.
        buffered_bytes: u64,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Envelope could not be decoded.
    #[error("Malformed message: {source} {location}")]
    MalformedMessage {
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Compare-and-set on the session record lost a race.
    #[error("Session record revision {actual} does not match expected {expected} {location}")]
    ConcurrentModification {
        /// Revision the writer read.
        expected: u64,
        /// Revision found in the store.
        actual: u64,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Session store read or write failed.
    #[error("Session store error: {reason} {location}")]
    StoreError {
        /// Description of the failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// IO error from filesystem operations.
    #[error("IO error: {source} {location}")]
    Io {
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
        /// Location where this error was created.
        location: ErrorLocation,
    },
}

impl CoreError {
    /// Maps the error onto the category reported to surfaces.
    pub fn category(&self) -> ErrorCategory {
        match self {
            CoreError::PermissionDenied { .. } => ErrorCategory::PermissionDenied,
            CoreError::DeviceUnavailable { .. } | CoreError::BufferOverflow { .. } => {
                ErrorCategory::DeviceUnavailable
            }
            CoreError::InvalidCaptureState { .. }
            | CoreError::UnknownHandle { .. }
            | CoreError::InvalidStateTransition { .. }
            | CoreError::DuplicateSession { .. } => ErrorCategory::InvalidStateTransition,
            CoreError::SessionActive { .. } => ErrorCategory::SessionActive,
            CoreError::StaleSession { .. } => ErrorCategory::StaleSession,
            CoreError::FinalizeFailed { .. } => ErrorCategory::FinalizeFailed,
            CoreError::MalformedMessage { .. } => ErrorCategory::MalformedMessage,
            CoreError::ConcurrentModification { .. } => ErrorCategory::ConcurrentModification,
            CoreError::StoreError { .. } | CoreError::Io { .. } => ErrorCategory::StoreUnavailable,
        }
    }
}

impl From<std::io::Error> for CoreError {
    #[track_caller]
    fn from(source: std::io::Error) -> Self {
        CoreError::Io {
            source,
            location: ErrorLocation::from(std::panic::Location::caller()),
        }
    }
}

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;
