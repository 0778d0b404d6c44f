use crate::{AppError, AppResult, Inbound};

use std::{panic::Location, time::Duration};

use demodojo_core::{ArtifactSink, CaptureCommand, CaptureDevice, CaptureHost, Clock, Envelope};
use error_location::ErrorLocation;
use tokio::{
    sync::{mpsc, watch},
    time::MissedTickBehavior,
};
use tracing::{debug, info, instrument};

/// Runs the Capture Host on its own task.
///
/// Executes commands from the router, pulls a chunk every chunk interval,
/// and reports every resulting event back as an envelope. Announces what it
/// holds on startup so the coordinator can spot a capture lost to a restart.
pub struct CaptureWorker<D: CaptureDevice, K: ArtifactSink, C: Clock> {
    host: CaptureHost<D, K, C>,
    command_rx: mpsc::Receiver<CaptureCommand>,
    events_tx: mpsc::Sender<Inbound>,
    chunk_interval: Duration,
}

impl<D: CaptureDevice, K: ArtifactSink, C: Clock> CaptureWorker<D, K, C> {
    /// Worker around `host`.
    pub fn new(
        host: CaptureHost<D, K, C>,
        command_rx: mpsc::Receiver<CaptureCommand>,
        events_tx: mpsc::Sender<Inbound>,
        chunk_interval: Duration,
    ) -> Self {
        Self {
            host,
            command_rx,
            events_tx,
            chunk_interval,
        }
    }

    /// Run until shutdown is signalled or the router goes away.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) -> AppResult<()> {
        info!(chunk_interval = ?self.chunk_interval, "Capture worker starting");

        let status = self.host.status();
        Self::emit(&self.events_tx, vec![status]).await?;

        let mut chunks = tokio::time::interval(self.chunk_interval);
        chunks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let result = loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!("Capture worker shutting down");
                    break Ok(());
                }

                command = self.command_rx.recv() => {
                    let Some(command) = command else {
                        debug!("Command channel closed");
                        break Ok(());
                    };
                    let events = self.host.execute(&command);
                    if let Err(e) = Self::emit(&self.events_tx, events).await {
                        break Err(e);
                    }
                }

                _ = chunks.tick() => {
                    let events = self.host.poll();
                    if let Err(e) = Self::emit(&self.events_tx, events).await {
                        break Err(e);
                    }
                }
            }
        };

        if let Some(handle) = self.host.active_handle() {
            self.host.release(handle);
        }

        result
    }

    async fn emit(events_tx: &mpsc::Sender<Inbound>, events: Vec<Envelope>) -> AppResult<()> {
        for event in events {
            debug!(kind = event.message.kind(), "Host event");
            events_tx
                .send(Inbound::event(event))
                .await
                .map_err(|e| AppError::ChannelSendFailed {
                    message: format!("Router gone, host event dropped: {}", e),
                    location: ErrorLocation::from(Location::caller()),
                })?;
        }
        Ok(())
    }
}
