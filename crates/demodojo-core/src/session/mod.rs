pub(crate) mod machine;
#[allow(clippy::module_inception)]
mod session;
mod session_state;
mod snapshot;
mod source;

pub(crate) use machine::{Outcome, SessionMachine};

pub use {
    session::{Artifact, PausedInterval, Session, SessionFailure},
    session_state::SessionState,
    snapshot::SessionSnapshot,
    source::{CaptureTarget, SourceDescriptor},
};
