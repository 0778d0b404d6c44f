//! DemoDojo Core Library
//!
//! Recording session coordination for a tab/screen recorder whose work is
//! split across contexts that only talk through best-effort messages: the
//! session state machine, the capture resource manager, the message
//! envelope, and a stateless coordinator that re-derives everything from a
//! session store on every message.
//!
//! # Example
//!
//! ```no_run
//! use demodojo_core::{
//!     CaptureTarget, Coordinator, CoordinatorSettings, CoreResult, Envelope,
//!     MemorySessionStore, Message, SourceDescriptor, SystemClock,
//! };
//!
//! fn main() -> CoreResult<()> {
//!     let coordinator = Coordinator::new(
//!         MemorySessionStore::default(),
//!         SystemClock,
//!         CoordinatorSettings::default(),
//!     );
//!
//!     let start = Envelope::new(Message::Start {
//!         source: SourceDescriptor::new("stream-1", CaptureTarget::Tab { tab_id: 7 }),
//!         audio_enabled: true,
//!         countdown_seconds: Some(3),
//!     });
//!
//!     let dispatch = coordinator.handle(&start);
//!     println!("{:?} -> {:?}", dispatch.ack.status, dispatch.snapshot.state);
//!     Ok(())
//! }
//! ```

mod capture;
mod clock;
mod coordinator;
mod error;
mod ids;
mod message;
mod sequence;
mod session;
mod store;

pub use {
    capture::{
        ARTIFACT_EXTENSION, ArtifactSink, CaptureCommand, CaptureDevice, CaptureHost, CaptureState,
        ChunkReceipt, ContainerHeader, FileArtifactSink, FinalizedArtifact, MediaStream,
        MemoryArtifactSink, SyntheticDevice, SyntheticStream,
    },
    clock::{Clock, ManualClock, SystemClock},
    coordinator::{Coordinator, CoordinatorSettings, Dispatch},
    error::{CoreError, ErrorCategory, Result as CoreResult},
    ids::{CaptureHandle, CorrelationId, SessionId},
    message::{Ack, AckStatus, Envelope, Message, Outbound},
    sequence::SequenceRanges,
    session::{
        Artifact, CaptureTarget, PausedInterval, Session, SessionFailure, SessionSnapshot,
        SessionState, SourceDescriptor,
    },
    store::{FileSessionStore, MemorySessionStore, SessionStore, StoreRecord},
};

#[cfg(test)]
mod tests;
