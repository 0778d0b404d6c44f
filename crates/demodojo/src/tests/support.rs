#![allow(clippy::unwrap_used)]

use crate::{CaptureWorker, Inbound, MessageRouter};

use std::time::Duration;

use demodojo_core::{
    Ack, CaptureHost, CaptureTarget, Coordinator, CoordinatorSettings, MemoryArtifactSink,
    MemorySessionStore, Message, Outbound, SessionSnapshot, SessionState, SessionStore,
    SourceDescriptor, SyntheticDevice, SystemClock,
};
use tokio::sync::{broadcast, mpsc, watch};

pub(crate) const WAIT: Duration = Duration::from_secs(5);

/// Router and capture worker running on the test runtime, backed by
/// in-memory store and sink.
pub(crate) struct Running {
    pub(crate) inbound_tx: mpsc::Sender<Inbound>,
    pub(crate) broadcast_tx: broadcast::Sender<Outbound>,
    pub(crate) sink: MemoryArtifactSink,
    pub(crate) shutdown_tx: watch::Sender<bool>,
}

impl Running {
    pub(crate) fn spawn() -> Self {
        Self::spawn_with(MemorySessionStore::default())
    }

    pub(crate) fn spawn_with<S: SessionStore + 'static>(store: S) -> Self {
        let coordinator = Coordinator::new(store, SystemClock, CoordinatorSettings::default());
        let sink = MemoryArtifactSink::default();

        let (inbound_tx, inbound_rx) = mpsc::channel(64);
        let (capture_tx, capture_rx) = mpsc::channel(32);
        let (broadcast_tx, _) = broadcast::channel(64);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let router = MessageRouter::new(
            coordinator,
            inbound_tx.clone(),
            inbound_rx,
            capture_tx,
            broadcast_tx.clone(),
            Duration::from_secs(60),
        );
        let worker = CaptureWorker::new(
            CaptureHost::new(SyntheticDevice::new(32), sink.clone(), SystemClock),
            capture_rx,
            inbound_tx.clone(),
            Duration::from_millis(10),
        );

        tokio::spawn(router.run(shutdown_rx.clone()));
        tokio::spawn(worker.run(shutdown_rx));

        Self {
            inbound_tx,
            broadcast_tx,
            sink,
            shutdown_tx,
        }
    }

    /// Sends a raw frame and waits for its ack.
    pub(crate) async fn send_frame(&self, text: &str) -> Outbound {
        let (inbound, reply_rx) = Inbound::frame(text.to_string());
        self.inbound_tx.send(inbound).await.unwrap();
        tokio::time::timeout(WAIT, reply_rx).await.unwrap().unwrap()
    }
}

pub(crate) fn start_frame(countdown_seconds: u32) -> String {
    let envelope = demodojo_core::Envelope::new(Message::Start {
        source: SourceDescriptor::new("tab-stream-1", CaptureTarget::Tab { tab_id: 3 }),
        audio_enabled: false,
        countdown_seconds: Some(countdown_seconds),
    });
    envelope.encode().unwrap()
}

/// Waits for a broadcast snapshot in `state`.
pub(crate) async fn wait_for_state(
    updates: &mut broadcast::Receiver<Outbound>,
    state: SessionState,
) -> SessionSnapshot {
    tokio::time::timeout(WAIT, async {
        loop {
            if let Ok(Outbound::Snapshot { snapshot }) = updates.recv().await {
                if snapshot.state == state {
                    return snapshot;
                }
            }
        }
    })
    .await
    .unwrap()
}

/// Splits an ack reply.
pub(crate) fn into_ack(outbound: Outbound) -> Option<(Ack, SessionSnapshot)> {
    match outbound {
        Outbound::Ack { ack, snapshot } => Some((ack, snapshot)),
        Outbound::Snapshot { .. } => None,
    }
}
