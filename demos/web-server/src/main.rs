//! Demo notification hub pushing ticks to browser catchers.
//!
//! Run with: cargo run -p web-server-demo
//!
//! Then open http://localhost:3000 in a few browser tabs.

use std::{
    net::SocketAddr,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use axum::{Router, response::Html, routing::get};
use catcher_core::{Catcher, SessionConfig};
use catcher_transport::create_ws_router;
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const TICK_INTERVAL: Duration = Duration::from_secs(2);

/// Notification pushed to every catcher.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Notification {
    Tick { seq: u64, unix_time: u64 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let catcher = Arc::new(Catcher::<Notification>::new(SessionConfig::default())?);
    let ticker = tokio::spawn(run_ticker(Arc::clone(&catcher)));

    // Build router
    let app = Router::new()
        .route("/", get(index_handler))
        .merge(create_ws_router(Arc::clone(&catcher)))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    tracing::info!("Server listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&catcher)))
        .await?;

    ticker.abort();
    Ok(())
}

async fn run_ticker(catcher: Arc<Catcher<Notification>>) {
    let mut interval = tokio::time::interval(TICK_INTERVAL);
    let mut seq = 0;
    loop {
        interval.tick().await;
        seq += 1;
        let unix_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let delivered = catcher
            .broadcast(Notification::Tick { seq, unix_time })
            .await;
        tracing::debug!(seq, delivered, "Tick broadcast");
    }
}

async fn shutdown_signal(catcher: Arc<Catcher<Notification>>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
    let count = catcher.client_count().await;
    tracing::info!("Shutting down, closing {count} catchers");
    catcher.shutdown().await;
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Catcher</title>
    <style>
        body {
            margin: 0;
            padding: 20px;
            background: #1e1e1e;
            color: #d4d4d4;
            font-family: system-ui, sans-serif;
        }
        h1 { color: #fff; margin-bottom: 10px; }
        .status {
            color: #888;
            font-size: 14px;
            margin-bottom: 10px;
        }
        .connected { color: #4a4; }
        .disconnected { color: #a44; }
        #log { font-family: Menlo, Monaco, "Courier New", monospace; }
    </style>
</head>
<body>
    <h1>Catcher</h1>
    <div class="status" id="status">Connecting...</div>
    <div id="log"></div>

    <script>
        const status = document.getElementById('status');
        const log = document.getElementById('log');

        function connect() {
            const protocol = window.location.protocol === 'https:' ? 'wss:' : 'ws:';
            const ws = new WebSocket(`${protocol}//${window.location.host}/ws`);

            ws.onopen = () => {
                status.textContent = 'Connected';
                status.className = 'status connected';
            };

            ws.onclose = () => {
                status.textContent = 'Disconnected - reconnecting...';
                status.className = 'status disconnected';
                setTimeout(connect, 2000);
            };

            ws.onmessage = (event) => {
                const line = document.createElement('div');
                line.textContent = event.data;
                log.prepend(line);
                while (log.childElementCount > 50) {
                    log.lastChild.remove();
                }
            };
        }

        connect();
    </script>
</body>
</html>
"#;
