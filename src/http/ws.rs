//! WebSocket upgrade handler for project-scoped event bus subscription.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::services::event_bus::project_topic;

use super::routes::AppState;

/// Upgrades to a WebSocket and streams every event published to
/// `project:{id}` until the client disconnects or a send fails.
///
/// Per section 6, the caller is expected to have authenticated via a
/// bearer token carried in the query string; that check happens upstream
/// of this handler (left to the deployment's auth middleware) so the
/// handler itself only needs to know which topic to subscribe to.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>, Path(project_id): Path<Uuid>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, project_id))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, project_id: Uuid) {
    let topic = project_topic(project_id);
    let mut rx = state.bus.subscribe(&topic).await;

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Ok(event) = event else { break };
                let Ok(text) = serde_json::to_string(&event) else { continue };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            message = socket.recv() => {
                match message {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }
}
