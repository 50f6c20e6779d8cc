//! HTTP and WebSocket surface.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::escalation::EscalationRecord;
use crate::notify::BroadcastNotifier;
use crate::pipeline::MessageRouter;
use crate::pipeline::types::{CallerContext, Channel};
use crate::store::CandidateStore;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<MessageRouter>,
    pub store: Arc<dyn CandidateStore>,
    /// Source of admin events for `/ws/admin`.
    pub events: BroadcastNotifier,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub candidate_id: String,
    pub text: String,
    pub channel: Channel,
    #[serde(default)]
    pub context: Option<CallerContext>,
}

/// Sent to an admin socket on connect and after it lags.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SyncMessage {
    EscalationsSync { escalations: Vec<EscalationRecord> },
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/messages", post(post_message))
        .route("/api/escalations", get(list_escalations))
        .route("/api/escalations/{id}/resolve", post(resolve_escalation))
        .route("/ws/admin", get(admin_ws_handler))
        .with_state(state)
}

// ── REST ────────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "chat-router"
    }))
}

async fn post_message(
    State(state): State<AppState>,
    Json(req): Json<MessageRequest>,
) -> impl IntoResponse {
    let response = state
        .router
        .process_message(
            &req.candidate_id,
            &req.text,
            req.channel,
            req.context.unwrap_or_default(),
        )
        .await;
    Json(response)
}

async fn list_escalations(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.list_open_escalations().await {
        Ok(open) => Json(open).into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to list escalations");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

async fn resolve_escalation(State(state): State<AppState>, Path(id): Path<Uuid>) -> StatusCode {
    match state.router.escalations().resolve(id).await {
        Ok(true) => StatusCode::NO_CONTENT,
        Ok(false) => StatusCode::NOT_FOUND,
        Err(e) => {
            warn!(escalation_id = %id, error = %e, "Failed to resolve escalation");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

// ── WebSocket ───────────────────────────────────────────────────────────

async fn admin_ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("Admin WebSocket client connecting");
    ws.on_upgrade(|socket| handle_admin_socket(socket, state))
}

async fn handle_admin_socket(mut socket: WebSocket, state: AppState) {
    // Subscribe before the sync so nothing falls between the two.
    let mut rx = state.events.subscribe_admin();

    if !send_sync(&mut socket, state.store.as_ref()).await {
        warn!("Failed to send initial sync, client disconnected");
        return;
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        if let Ok(json) = serde_json::to_string(&event) {
                            if socket.send(Message::Text(json.into())).await.is_err() {
                                debug!("Client disconnected during send");
                                break;
                            }
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!(missed = n, "Admin WS client lagged behind broadcast");
                        if !send_sync(&mut socket, state.store.as_ref()).await {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => {
                        debug!("Broadcast channel closed");
                        break;
                    }
                }
            }

            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Admin WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("Admin WebSocket connection closed");
}

/// Push every open escalation. `false` when the client is gone.
async fn send_sync(socket: &mut WebSocket, store: &dyn CandidateStore) -> bool {
    let escalations = match store.list_open_escalations().await {
        Ok(open) => open,
        Err(e) => {
            warn!(error = %e, "Could not load open escalations for sync");
            Vec::new()
        }
    };
    match serde_json::to_string(&SyncMessage::EscalationsSync { escalations }) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(_) => true,
    }
}
