use crate::{
    AppError, AppResult, CaptureWorker, MessageRouter, ServerState, config::Config, server,
};

use std::{panic::Location, time::Duration};

use demodojo_core::{
    CaptureHost, Coordinator, FileArtifactSink, FileSessionStore, SyntheticDevice, SystemClock,
};
use error_location::ErrorLocation;
use tokio::{
    sync::{broadcast, mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, error, info, instrument, warn};

const INBOUND_CAPACITY: usize = 64;
const COMMAND_CAPACITY: usize = 32;
const BROADCAST_CAPACITY: usize = 64;
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Wires the coordinator, capture worker and surface server together.
pub struct App {
    pub(crate) config: Config,
}

impl App {
    /// Run until Ctrl-C or until the server stops.
    #[instrument(skip(self))]
    pub(crate) async fn run(self) -> AppResult<()> {
        info!(ws_url = %self.config.ws_url(), "DemoDojo starting");

        let store = FileSessionStore::new(&self.config.session.store_path);
        let coordinator = Coordinator::new(
            store,
            SystemClock,
            self.config.session.coordinator_settings(),
        );

        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        let (capture_tx, capture_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let router = MessageRouter::new(
            coordinator,
            inbound_tx.clone(),
            inbound_rx,
            capture_tx,
            broadcast_tx.clone(),
            self.config.session.watchdog_interval(),
        );

        let host = CaptureHost::new(
            SyntheticDevice::new(self.config.capture.chunk_bytes),
            FileArtifactSink::new(&self.config.capture.output_dir),
            SystemClock,
        );
        let worker = CaptureWorker::new(
            host,
            capture_rx,
            inbound_tx.clone(),
            self.config.capture.chunk_interval(),
        );

        let state = ServerState::new(inbound_tx, broadcast_tx);

        let router_handle = tokio::spawn(router.run(shutdown_rx.clone()));
        let worker_handle = tokio::spawn(worker.run(shutdown_rx.clone()));
        let mut server_handle = tokio::spawn(server::serve(
            self.config.server_addr(),
            state,
            shutdown_rx,
        ));

        let server_result = tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                info!("Shutdown requested");
                None
            }

            finished = &mut server_handle => Some(finished),
        };

        let _ = shutdown_tx.send(true);

        join_with_timeout("router", router_handle).await;
        join_with_timeout("capture worker", worker_handle).await;

        let server_result = match server_result {
            Some(finished) => finished,
            None => match tokio::time::timeout(JOIN_TIMEOUT, server_handle).await {
                Ok(finished) => finished,
                Err(_) => {
                    debug!("Server did not stop within timeout, will be cleaned up on exit");
                    Ok(Ok(()))
                }
            },
        };

        match server_result {
            Ok(result) => result?,
            Err(e) => {
                return Err(AppError::ServerError {
                    reason: format!("Server task failed: {}", e),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        }

        info!("DemoDojo shut down successfully");
        Ok(())
    }
}

/// Best-effort join so a stuck task cannot hang shutdown.
async fn join_with_timeout(name: &str, handle: JoinHandle<AppResult<()>>) {
    match tokio::time::timeout(JOIN_TIMEOUT, handle).await {
        Ok(Ok(Ok(()))) => debug!(task = name, "Task stopped cleanly"),
        Ok(Ok(Err(e))) => error!(task = name, error = ?e, "Task failed"),
        Ok(Err(e)) => error!(task = name, error = ?e, "Task panicked"),
        Err(_) => debug!(task = name, "Task did not stop within timeout, will be cleaned up on exit"),
    }
}
