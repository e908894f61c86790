use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use super::DashboardHub;

/// Router serving the live dashboard feed at `/ws/dashboard`.
pub fn dashboard_router(hub: DashboardHub) -> Router {
    Router::new()
        .route("/ws/dashboard", get(dashboard_socket))
        .with_state(hub)
}

async fn dashboard_socket(ws: WebSocketUpgrade, State(hub): State<DashboardHub>) -> Response {
    ws.on_upgrade(move |socket| stream_counts(socket, hub))
}

/// Forwards every published update as a JSON text frame until either side
/// closes. Client frames are read only to notice the close.
async fn stream_counts(socket: WebSocket, hub: DashboardHub) {
    info!("dashboard client connected");
    let (mut sender, mut receiver) = socket.split();
    let mut updates = hub.subscribe();

    let mut inbound = tokio::spawn(async move {
        while let Some(message) = receiver.next().await {
            match message {
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(err) => {
                    debug!(error = %err, "dashboard socket receive error");
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(counts) => {
                    let text = match serde_json::to_string(&counts) {
                        Ok(text) => text,
                        Err(err) => {
                            warn!(error = %err, "dashboard update not serializable");
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "dashboard client lagging, updates skipped");
                }
                Err(RecvError::Closed) => break,
            },
            _ = &mut inbound => break,
        }
    }

    inbound.abort();
    info!("dashboard client disconnected");
}
