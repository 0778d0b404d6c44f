//! Cross-context message router.
//!
//! Serializes every inbound envelope through the coordinator, one at a time,
//! then fans out the results: the ack to the sender, a snapshot broadcast to
//! every listening surface, and capture commands to the capture worker. Also
//! owns the two timers that feed the session: the countdown ticker and the
//! stall watchdog.

use crate::{AppResult, Inbound};

use std::{sync::Arc, time::Duration};

use demodojo_core::{
    CaptureCommand, Clock, Coordinator, Dispatch, Envelope, Message, Outbound, SessionId,
    SessionSnapshot, SessionState, SessionStore,
};
use tokio::{
    sync::{broadcast, mpsc, watch},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, error, info, instrument};

const TICK_PERIOD: Duration = Duration::from_secs(1);

struct Countdown {
    session_id: SessionId,
    task: JoinHandle<()>,
}

/// Routes envelopes between surfaces, the coordinator and the capture worker.
pub struct MessageRouter<S: SessionStore, C: Clock> {
    coordinator: Arc<Coordinator<S, C>>,
    inbound_tx: mpsc::Sender<Inbound>,
    inbound_rx: mpsc::Receiver<Inbound>,
    capture_tx: mpsc::Sender<CaptureCommand>,
    broadcast_tx: broadcast::Sender<Outbound>,
    watchdog_interval: Duration,
    countdown: Option<Countdown>,
}

impl<S: SessionStore + 'static, C: Clock + 'static> MessageRouter<S, C> {
    /// Router draining `inbound_rx`. `inbound_tx` must feed the same
    /// channel; the countdown ticker sends through it.
    pub fn new(
        coordinator: Coordinator<S, C>,
        inbound_tx: mpsc::Sender<Inbound>,
        inbound_rx: mpsc::Receiver<Inbound>,
        capture_tx: mpsc::Sender<CaptureCommand>,
        broadcast_tx: broadcast::Sender<Outbound>,
        watchdog_interval: Duration,
    ) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
            inbound_tx,
            inbound_rx,
            capture_tx,
            broadcast_tx,
            watchdog_interval,
            countdown: None,
        }
    }

    /// Run until shutdown is signalled.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) -> AppResult<()> {
        info!("Message router starting");

        let mut watchdog = tokio::time::interval(self.watchdog_interval);
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        watchdog.tick().await;

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!("Message router shutting down");
                    break;
                }

                Some(inbound) = self.inbound_rx.recv() => {
                    self.process(inbound).await;
                }

                _ = watchdog.tick() => {
                    self.process(Inbound::event(Envelope::new(Message::Watchdog))).await;
                }
            }
        }

        if let Some(countdown) = self.countdown.take() {
            countdown.task.abort();
        }

        Ok(())
    }

    async fn process(&mut self, inbound: Inbound) {
        // Store reads and writes may hit the disk; keep them off the async workers.
        let coordinator = Arc::clone(&self.coordinator);
        let (handled, reply) = match inbound {
            Inbound::Frame { text, reply } => (
                tokio::task::spawn_blocking(move || coordinator.handle_raw(&text)).await,
                reply,
            ),
            Inbound::Envelope { envelope, reply } => (
                tokio::task::spawn_blocking(move || coordinator.handle(&envelope)).await,
                reply,
            ),
        };

        let dispatch = match handled {
            Ok(dispatch) => dispatch,
            Err(e) => {
                error!(error = ?e, "Coordinator task failed, envelope dropped");
                return;
            }
        };

        let Dispatch {
            ack,
            snapshot,
            broadcast,
            commands,
        } = dispatch;

        if broadcast {
            // No listening surface is fine; they query on (re)open.
            let receivers = self
                .broadcast_tx
                .send(Outbound::Snapshot {
                    snapshot: snapshot.clone(),
                })
                .unwrap_or(0);
            debug!(state = %snapshot.state, receivers, "Snapshot broadcast");
        }

        if let Some(reply) = reply {
            if reply
                .send(Outbound::Ack {
                    ack,
                    snapshot: snapshot.clone(),
                })
                .is_err()
            {
                debug!("Sender stopped waiting for ack");
            }
        }

        for command in commands {
            if let Err(e) = self.capture_tx.send(command).await {
                error!(command = ?e.0, "Capture worker gone, command dropped");
            }
        }

        self.sync_countdown(&snapshot);
    }

    /// Starts a ticker when a session enters its countdown and stops it
    /// when the session leaves.
    fn sync_countdown(&mut self, snapshot: &SessionSnapshot) {
        let counting = match (snapshot.state, snapshot.session_id) {
            (SessionState::Countdown, Some(session_id)) => Some(session_id),
            _ => None,
        };

        let running = self
            .countdown
            .as_ref()
            .filter(|c| !c.task.is_finished())
            .map(|c| c.session_id);
        if counting.is_some() && running == counting {
            return;
        }

        if let Some(previous) = self.countdown.take() {
            previous.task.abort();
        }

        if let Some(session_id) = counting {
            info!(
                session_id = %session_id,
                seconds = snapshot.countdown_remaining,
                "Countdown started"
            );
            self.countdown = Some(Countdown {
                session_id,
                task: spawn_ticker(
                    self.inbound_tx.clone(),
                    session_id,
                    snapshot.countdown_remaining,
                ),
            });
        }
    }
}

/// Sends `TICK(from - 1) .. TICK(0)`, one per second. A zero countdown
/// sends `TICK(0)` at once.
fn spawn_ticker(inbound_tx: mpsc::Sender<Inbound>, session_id: SessionId, from: u32) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut remaining = from;
        loop {
            if remaining > 0 {
                tokio::time::sleep(TICK_PERIOD).await;
                remaining -= 1;
            }

            let tick = Envelope::new(Message::Tick { remaining }).for_session(session_id);
            if inbound_tx.send(Inbound::event(tick)).await.is_err() || remaining == 0 {
                break;
            }
        }
    })
}
