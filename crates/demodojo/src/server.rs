//! Embedded server for Command Surfaces.
//!
//! `GET /ws` upgrades to a WebSocket carrying JSON envelopes in and acks
//! plus snapshot broadcasts out. `GET /state` returns the current snapshot
//! for surfaces that just (re)opened.

use crate::{AppError, AppResult, Inbound};

use std::{net::SocketAddr, panic::Location};

use axum::{
    Json, Router,
    extract::{
        State,
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::Response,
    routing::get,
};
use demodojo_core::{Envelope, Message, Outbound, SessionSnapshot};
use error_location::ErrorLocation;
use tokio::{
    net::TcpListener,
    sync::{broadcast, mpsc, watch},
};
use tower_http::cors::CorsLayer;
use tracing::{debug, info, instrument, warn};

/// Handles shared by every connection.
#[derive(Clone)]
pub struct ServerState {
    inbound_tx: mpsc::Sender<Inbound>,
    broadcast_tx: broadcast::Sender<Outbound>,
}

impl ServerState {
    /// State forwarding to the router behind `inbound_tx`.
    pub fn new(inbound_tx: mpsc::Sender<Inbound>, broadcast_tx: broadcast::Sender<Outbound>) -> Self {
        Self {
            inbound_tx,
            broadcast_tx,
        }
    }

    async fn submit(&self, inbound: Inbound, reply_rx: tokio::sync::oneshot::Receiver<Outbound>) -> Option<Outbound> {
        self.inbound_tx.send(inbound).await.ok()?;
        reply_rx.await.ok()
    }
}

/// HTTP routes.
pub fn routes(state: ServerState) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/state", get(current_state))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve on an already bound listener until shutdown is signalled.
#[instrument(skip(listener, state, shutdown_rx))]
pub async fn serve_on(
    listener: TcpListener,
    state: ServerState,
    mut shutdown_rx: watch::Receiver<bool>,
) -> AppResult<()> {
    axum::serve(listener, routes(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        })
        .await
        .map_err(|e| AppError::ServerError {
            reason: format!("Server stopped: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

    info!("Server stopped");
    Ok(())
}

/// Bind `addr` and serve until shutdown is signalled.
pub async fn serve(
    addr: SocketAddr,
    state: ServerState,
    shutdown_rx: watch::Receiver<bool>,
) -> AppResult<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::ServerError {
            reason: format!("Failed to bind {}: {}", addr, e),
            location: ErrorLocation::from(Location::caller()),
        })?;

    info!(addr = %addr, "Server listening");
    serve_on(listener, state, shutdown_rx).await
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<ServerState>) -> Response {
    ws.on_upgrade(move |socket| surface_connection(socket, state))
}

async fn current_state(State(state): State<ServerState>) -> Result<Json<SessionSnapshot>, StatusCode> {
    let (inbound, reply_rx) = Inbound::request(Envelope::new(Message::QueryState));
    match state.submit(inbound, reply_rx).await {
        Some(Outbound::Ack { snapshot, .. } | Outbound::Snapshot { snapshot }) => Ok(Json(snapshot)),
        None => Err(StatusCode::SERVICE_UNAVAILABLE),
    }
}

async fn surface_connection(mut socket: WebSocket, state: ServerState) {
    let mut updates = state.broadcast_tx.subscribe();
    info!("Surface connected");

    loop {
        tokio::select! {
            frame = socket.recv() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    let (inbound, reply_rx) = Inbound::frame(text.to_string());
                    let Some(reply) = state.submit(inbound, reply_rx).await else {
                        warn!("Router unavailable, closing surface");
                        break;
                    };
                    if send_outbound(&mut socket, &reply).await.is_err() {
                        break;
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(other)) => debug!(frame = ?other, "Non-text frame ignored"),
                Some(Err(e)) => {
                    debug!(error = %e, "Surface socket error");
                    break;
                }
            },

            update = updates.recv() => match update {
                Ok(outbound) => {
                    if send_outbound(&mut socket, &outbound).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Surface fell behind, snapshots skipped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    info!("Surface disconnected");
}

async fn send_outbound(socket: &mut WebSocket, outbound: &Outbound) -> Result<(), ()> {
    let text = match serde_json::to_string(outbound) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "Failed to encode outbound frame");
            return Ok(());
        }
    };
    socket.send(WsMessage::Text(text.into())).await.map_err(|e| {
        debug!(error = %e, "Surface send failed");
    })
}
