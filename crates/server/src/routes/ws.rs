// crates/server/src/routes/ws.rs
//! Progress event stream.
//!
//! - `WS /ws` -- every job's events, from the moment of connection
//!
//! On connect the client receives `{"type":"connected","clientId":...}`,
//! then one JSON text frame per event. Client messages are ignored.

use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::Response,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;

use crate::events::{EventBroadcaster, ObserverId};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename = "connected", rename_all = "camelCase")]
struct ConnectedAck<'a> {
    client_id: &'a str,
}

/// Unsubscribes the observer when the socket task ends, however it ends.
struct ObserverGuard {
    id: ObserverId,
    broadcaster: Arc<EventBroadcaster>,
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        self.broadcaster.unsubscribe(&self.id);
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/ws", get(ws_handler))
}

async fn ws_handler(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sink, mut stream) = socket.split();

    // Subscribe inside the upgrade so the guard always pairs with it.
    let observer = state.orchestrator.subscribe();
    let _guard = ObserverGuard {
        id: observer.id.clone(),
        broadcaster: Arc::clone(state.orchestrator.broadcaster()),
    };
    let client_id = observer.id.clone();
    let mut rx = observer.rx;

    let ack = match serde_json::to_string(&ConnectedAck { client_id: &client_id }) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize connect ack");
            return;
        }
    };
    if sink.send(Message::Text(ack.into())).await.is_err() {
        return;
    }

    let forward_id = client_id.clone();
    let mut forward_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    tracing::warn!(observer_id = %forward_id, error = %e, "failed to serialize event");
                    continue;
                }
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = stream.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut forward_task => read_task.abort(),
        _ = &mut read_task => forward_task.abort(),
    }
    tracing::debug!(observer_id = %client_id, "websocket closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connected_ack_shape() {
        let json = serde_json::to_value(ConnectedAck { client_id: "abc" }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "connected", "clientId": "abc"}));
    }

    #[test]
    fn test_guard_unsubscribes() {
        let broadcaster = Arc::new(EventBroadcaster::new());
        let observer = broadcaster.subscribe();
        let guard = ObserverGuard {
            id: observer.id.clone(),
            broadcaster: Arc::clone(&broadcaster),
        };
        assert_eq!(broadcaster.observer_count(), 1);
        drop(guard);
        assert_eq!(broadcaster.observer_count(), 0);
    }
}
