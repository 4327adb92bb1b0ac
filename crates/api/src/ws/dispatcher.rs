use axum::extract::ws::Message;
use futures::SinkExt;
use tracing::{debug, warn};

use super::protocol::ServerEvent;
use super::storage::WsStorage;

/// Sends an event to a single connection. Delivery is at-most-once: a failed
/// send is logged and dropped, never retried.
pub async fn send_to_connection(ws_storage: &WsStorage, connection_id: &str, event: &ServerEvent) {
    let Some(sender) = ws_storage.get(connection_id) else {
        return;
    };
    let text = match serde_json::to_string(event) {
        Ok(t) => t,
        Err(e) => {
            warn!(%e, "failed to serialize WS event");
            return;
        }
    };
    let mut guard = sender.lock().await;
    if let Err(e) = guard.send(Message::text(text)).await {
        warn!(%connection_id, %e, "failed to send WS event");
    } else {
        debug!(%connection_id, "WS event sent");
    }
}

/// Fans an event out to a set of connections.
pub async fn broadcast(ws_storage: &WsStorage, connection_ids: &[String], event: &ServerEvent) {
    for connection_id in connection_ids {
        send_to_connection(ws_storage, connection_id, event).await;
    }
}

/// Sends a raw JSON value (ack envelopes) to a single connection.
pub async fn send_raw(ws_storage: &WsStorage, connection_id: &str, value: &serde_json::Value) {
    let Some(sender) = ws_storage.get(connection_id) else {
        return;
    };
    let text = value.to_string();
    let mut guard = sender.lock().await;
    if let Err(e) = guard.send(Message::text(text)).await {
        warn!(%connection_id, %e, "failed to send WS ack");
    }
}
