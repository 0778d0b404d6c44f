#![allow(clippy::unwrap_used)]

use crate::{
    ServerState, server,
    tests::support::{Running, WAIT},
};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::{broadcast, mpsc, watch},
};

async fn get(addr: std::net::SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    tokio::time::timeout(WAIT, stream.read_to_string(&mut response))
        .await
        .unwrap()
        .unwrap();
    response
}

/// WHAT: GET /state returns the idle snapshot before anything happens
/// WHY: Surfaces query the state when they (re)open
#[tokio::test]
async fn given_idle_coordinator_when_state_requested_then_idle_snapshot() {
    // Given: A router and a server on an ephemeral port
    let running = Running::spawn();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = ServerState::new(running.inbound_tx.clone(), running.broadcast_tx.clone());
    tokio::spawn(server::serve_on(listener, state, running.shutdown_tx.subscribe()));

    // When: Requesting the state
    let response = get(addr, "/state").await;

    // Then: The snapshot is idle
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains("\"state\":\"idle\""));

    let _ = running.shutdown_tx.send(true);
}

/// WHAT: GET /state answers 503 when the router is gone
/// WHY: A dead router must not hang HTTP clients
#[tokio::test]
async fn given_no_router_when_state_requested_then_service_unavailable() {
    // Given: A server whose inbound channel has no receiver
    let (inbound_tx, inbound_rx) = mpsc::channel(1);
    drop(inbound_rx);
    let (broadcast_tx, _) = broadcast::channel(1);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server::serve_on(
        listener,
        ServerState::new(inbound_tx, broadcast_tx),
        shutdown_rx,
    ));

    // When: Requesting the state
    let response = get(addr, "/state").await;

    // Then: The server reports itself unavailable
    assert!(response.starts_with("HTTP/1.1 503"));

    let _ = shutdown_tx.send(true);
}
