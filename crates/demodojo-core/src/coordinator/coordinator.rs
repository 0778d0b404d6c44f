use crate::{
    Ack, AckStatus, CaptureCommand, Clock, CoordinatorSettings, CoreError, CoreResult, Envelope,
    Message, Session, SessionSnapshot, SessionStore,
    session::{Outcome, SessionMachine},
};

use tracing::{debug, info, instrument, warn};

/// Everything produced by handling one envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    /// Reply for the sender.
    pub ack: Ack,
    /// Session state after handling.
    pub snapshot: SessionSnapshot,
    /// The session changed and surfaces should be told.
    pub broadcast: bool,
    /// Commands for the Capture Host.
    pub commands: Vec<CaptureCommand>,
}

/// Stateless message handler.
///
/// Holds no session data between calls: every envelope reloads the record
/// from the store, applies the transition and writes it back with
/// compare-and-set. A restarted coordinator therefore continues exactly
/// where the store left off.
pub struct Coordinator<S: SessionStore, C: Clock> {
    store: S,
    clock: C,
    machine: SessionMachine,
    max_store_retries: u32,
}

impl<S: SessionStore, C: Clock> Coordinator<S, C> {
    /// Coordinator over `store`.
    pub fn new(store: S, clock: C, settings: CoordinatorSettings) -> Self {
        Self {
            store,
            clock,
            machine: SessionMachine::new(
                settings.default_countdown_secs,
                settings.stall_timeout,
                settings.host_timeout,
            ),
            max_store_retries: settings.max_store_retries,
        }
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Handles one decoded envelope.
    #[instrument(
        skip(self, envelope),
        fields(
            correlation_id = %envelope.correlation_id,
            kind = envelope.message.kind(),
        )
    )]
    pub fn handle(&self, envelope: &Envelope) -> Dispatch {
        let mut attempt = 0;

        loop {
            let record = match self.store.load() {
                Ok(record) => record,
                Err(e) => return self.reject(envelope, &e, None),
            };

            let now = self.clock.now();
            let transition = match self.machine.apply(record.session.clone(), envelope, now) {
                Ok(transition) => transition,
                Err(e) => return self.reject(envelope, &e, record.session.as_ref()),
            };

            let status = match transition.outcome {
                Outcome::Noop => AckStatus::Noop,
                Outcome::Applied => {
                    match self
                        .store
                        .compare_and_set(record.revision, transition.next.as_ref())
                    {
                        Ok(revision) => {
                            debug!(revision, "Session record written");
                            AckStatus::Applied
                        }
                        Err(CoreError::ConcurrentModification {
                            expected, actual, ..
                        }) if attempt < self.max_store_retries => {
                            attempt += 1;
                            warn!(expected, actual, attempt, "Lost session record race, retrying");
                            continue;
                        }
                        Err(e) => return self.reject(envelope, &e, record.session.as_ref()),
                    }
                }
            };

            let broadcast = status == AckStatus::Applied;
            if broadcast {
                let state = transition.next.as_ref().map(|s| s.state);
                info!(state = ?state, commands = transition.commands.len(), "Envelope applied");
            }

            return Dispatch {
                ack: Ack {
                    correlation_id: Some(envelope.correlation_id),
                    status,
                },
                snapshot: SessionSnapshot::of(transition.next.as_ref(), now),
                broadcast,
                commands: transition.commands,
            };
        }
    }

    /// Decodes a text frame and handles it. Undecodable frames are
    /// rejected as malformed and leave the session untouched.
    pub fn handle_raw(&self, text: &str) -> Dispatch {
        match Envelope::decode(text) {
            Ok(envelope) => self.handle(&envelope),
            Err(e) => {
                warn!(error = %e, "Malformed envelope rejected");
                let current = self.store.load().ok().and_then(|r| r.session);
                Dispatch {
                    ack: Ack {
                        correlation_id: Envelope::correlation_hint(text),
                        status: AckStatus::rejected(&e),
                    },
                    snapshot: SessionSnapshot::of(current.as_ref(), self.clock.now()),
                    broadcast: false,
                    commands: Vec::new(),
                }
            }
        }
    }

    /// Current session state.
    pub fn snapshot(&self) -> CoreResult<SessionSnapshot> {
        let record = self.store.load()?;
        Ok(SessionSnapshot::of(record.session.as_ref(), self.clock.now()))
    }

    /// Current session record, if any.
    pub fn session(&self) -> CoreResult<Option<Session>> {
        Ok(self.store.load()?.session)
    }

    fn reject(&self, envelope: &Envelope, error: &CoreError, current: Option<&Session>) -> Dispatch {
        let surface_visible = !matches!(
            envelope.message,
            Message::QueryState | Message::Tick { .. } | Message::Watchdog
        );
        if surface_visible {
            warn!(error = %error, category = %error.category(), "Envelope rejected");
        } else {
            debug!(error = %error, "Envelope rejected");
        }

        Dispatch {
            ack: Ack {
                correlation_id: Some(envelope.correlation_id),
                status: AckStatus::rejected(error),
            },
            snapshot: SessionSnapshot::of(current, self.clock.now()),
            broadcast: false,
            commands: Vec::new(),
        }
    }
}
