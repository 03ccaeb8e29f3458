//! WebSocket live feed.
//!
//! Forwards the store's change events to connected dashboards so they
//! subscribe to updates instead of polling the read views.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tracing::debug;

use listpilot_store::traits::{EventSource, JobStore};

use crate::state::AppState;

pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.store.subscribe();

    // Initial snapshot so clients render without waiting for a change.
    let initial = build_snapshot(&state).await;
    if sender.send(Message::Text(initial.into())).await.is_err() {
        return;
    }

    // Forward store events to this client.
    let send_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            let payload = match serde_json::to_string(&event) {
                Ok(payload) => payload,
                Err(_) => continue,
            };
            if sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    // Consume incoming messages (pings, close frames) but ignore content.
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if matches!(message, Message::Close(_)) {
                break;
            }
        }
    });

    // Either task finishing means the client is gone.
    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }
    debug!("Live feed client disconnected");
}

async fn build_snapshot(state: &Arc<AppState>) -> String {
    let jobs = state.store.list_jobs(20).await.unwrap_or_default();
    serde_json::json!({
        "type": "snapshot",
        "jobs": jobs,
    })
    .to_string()
}
