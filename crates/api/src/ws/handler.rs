use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use linewatch_core::messages::PushMessage;
use linewatch_core::LineSnapshot;
use linewatch_events::Subscription;

use crate::state::AppState;
use crate::ws::manager::WsManager;

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade the connection is registered with `WsManager`,
/// subscribed to the snapshot hub, and managed by spawned sender and
/// forwarder tasks.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Encode a snapshot as a text frame, logging serialization failures.
fn snapshot_frame(message: &PushMessage<'_, LineSnapshot>) -> Option<Message> {
    match message.to_json() {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize snapshot frame");
            None
        }
    }
}

/// Manage a single WebSocket connection after upgrade.
///
///   1. Registers the connection with `WsManager` and subscribes to the hub.
///   2. Queues `initial_data` with the last known snapshot, if any.
///   3. Spawns a sender task (manager channel to socket sink) and a
///      forwarder task (hub subscription to manager channel).
///   4. Processes inbound frames on the current task.
///   5. Unsubscribes and cleans up on disconnect.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "WebSocket connected");

    let ws_manager = Arc::clone(&state.ws_manager);
    let mut rx = ws_manager.add(conn_id.clone()).await;

    // Subscribe before reading the latest snapshot so no tick falls in between.
    let subscription = state.poller.hub().subscribe();
    let subscription_id = subscription.id;

    let initial_tick = match state.poller.live_data() {
        Some(snapshot) => {
            if let Some(frame) = snapshot_frame(&PushMessage::initial(&*snapshot)) {
                ws_manager.send_to(&conn_id, frame).await;
            }
            snapshot.tick
        }
        None => 0,
    };

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward channel messages to the WebSocket sink.
    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    let forward_task = tokio::spawn(forward_updates(
        subscription,
        initial_tick,
        conn_id.clone(),
        Arc::clone(&ws_manager),
    ));

    // Receiver loop: dashboards are read-only, so inbound frames are ignored.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_msg) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    state.poller.hub().unsubscribe(subscription_id);
    let connected_at = ws_manager.remove(&conn_id).await;
    forward_task.abort();
    send_task.abort();
    let connected_secs = connected_at.map(|at| (chrono::Utc::now() - at).num_seconds());
    tracing::info!(conn_id = %conn_id, connected_secs, "WebSocket disconnected");
}

/// Relay published snapshots to one connection as `data_update` frames.
///
/// Snapshots not newer than the one sent as `initial_data` are skipped.
/// When the hub closes the subscription (polling stopped) a Close frame is
/// queued so the client disconnects.
async fn forward_updates(
    mut subscription: Subscription,
    initial_tick: u64,
    conn_id: String,
    ws_manager: Arc<WsManager>,
) {
    while let Some(snapshot) = subscription.receiver.recv().await {
        if snapshot.tick <= initial_tick {
            continue;
        }
        let Some(frame) = snapshot_frame(&PushMessage::update(&*snapshot)) else {
            continue;
        };
        if !ws_manager.send_to(&conn_id, frame).await {
            return;
        }
    }

    tracing::debug!(conn_id = %conn_id, "Subscription closed, closing WebSocket");
    ws_manager.send_to(&conn_id, Message::Close(None)).await;
}
