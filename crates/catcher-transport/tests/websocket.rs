//! End-to-end tests using a real WebSocket client.

use std::{sync::Arc, time::Duration};

use catcher_core::{Catcher, SessionConfig};
use catcher_transport::create_ws_router;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};

const TIMEOUT: Duration = Duration::from_secs(5);

type WsClient =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Boot a server on an ephemeral port and return the WS URL + hub.
async fn boot_server(config: SessionConfig) -> (String, Arc<Catcher<Value>>) {
    let catcher = Arc::new(Catcher::new(config).unwrap());
    let app = create_ws_router(Arc::clone(&catcher));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("ws://{addr}/ws"), catcher)
}

async fn connect(url: &str) -> WsClient {
    let (ws, _) = timeout(TIMEOUT, connect_async(url)).await.unwrap().unwrap();
    ws
}

async fn wait_for_clients(catcher: &Catcher<Value>, count: usize) {
    timeout(TIMEOUT, async {
        while catcher.client_count().await != count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("client count not reached in time");
}

fn fast_pings() -> SessionConfig {
    SessionConfig {
        ping_interval: Duration::from_millis(50),
        ..SessionConfig::default()
    }
}

#[tokio::test]
async fn broadcast_reaches_connected_client() {
    let (url, catcher) = boot_server(SessionConfig::default()).await;
    let mut ws = connect(&url).await;
    wait_for_clients(&catcher, 1).await;

    assert_eq!(catcher.broadcast(json!({"event": "deploy"})).await, 1);

    let text = timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(t))) => break t.to_string(),
                Some(Ok(_)) => {}
                other => panic!("unexpected frame: {other:?}"),
            }
        }
    })
    .await
    .unwrap();

    let value: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value, json!({"event": "deploy"}));
}

#[tokio::test]
async fn server_sends_periodic_pings() {
    let (url, catcher) = boot_server(fast_pings()).await;
    let mut ws = connect(&url).await;
    wait_for_clients(&catcher, 1).await;

    let mut pings = 0;
    timeout(TIMEOUT, async {
        while pings < 2 {
            match ws.next().await {
                Some(Ok(Message::Ping(data))) => {
                    assert!(data.is_empty());
                    pings += 1;
                }
                Some(Ok(_)) => {}
                other => panic!("unexpected frame: {other:?}"),
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(catcher.client_count().await, 1);
}

#[tokio::test]
async fn client_close_deregisters_session() {
    let (url, catcher) = boot_server(fast_pings()).await;
    let mut ws = connect(&url).await;
    wait_for_clients(&catcher, 1).await;

    ws.close(None).await.unwrap();
    drop(ws);

    wait_for_clients(&catcher, 0).await;
}

#[tokio::test]
async fn shutdown_sends_close_frame() {
    let (url, catcher) = boot_server(SessionConfig::default()).await;
    let mut ws = connect(&url).await;
    wait_for_clients(&catcher, 1).await;

    catcher.shutdown().await;

    timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => panic!("unexpected error: {e}"),
            }
        }
    })
    .await
    .unwrap();

    wait_for_clients(&catcher, 0).await;
}

#[tokio::test]
async fn oversized_message_drops_client() {
    let config = SessionConfig {
        max_message_size: 16,
        ..fast_pings()
    };
    let (url, catcher) = boot_server(config).await;
    let mut ws = connect(&url).await;
    wait_for_clients(&catcher, 1).await;

    ws.send(Message::Text("x".repeat(100).into())).await.unwrap();

    wait_for_clients(&catcher, 0).await;
}
