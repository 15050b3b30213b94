//! Observer surface: websocket fan-out plus status and retry endpoints.
//!
//! | Route        | Method | Purpose                                        |
//! |--------------|--------|------------------------------------------------|
//! | `/`, `/ws`   | GET    | Websocket upgrade; receives every broadcast    |
//! | `/status`    | GET    | Link state, device, last error and counters    |
//! | `/reconnect` | POST   | Reset a faulted link and open the device again |
//!
//! Each websocket connection gets one hub observer. A writer task drains the
//! observer queue into the socket while the connection task reads (and
//! ignores) inbound messages until the client goes away. The observer is
//! unregistered from the hub before its queue is dropped.

use crate::backend::{DeviceSource, LinkSupervisor};
use crate::broadcast::{BroadcastHub, ObserverStream};
use crate::error::RelayError;
use crate::types::{HubStats, LinkState, PipelineStats};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct RelayState {
    pub supervisor: Arc<LinkSupervisor>,
    pub hub: Arc<BroadcastHub>,
    /// Device reopened by the retry endpoint
    pub source: Arc<dyn DeviceSource>,
}

/// Body of `GET /status`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub connected: bool,
    /// Device identifier (serial path or `mock`)
    pub port: Option<String>,
    pub state: LinkState,
    pub last_error: Option<String>,
    pub observers: usize,
    pub pipeline: PipelineStats,
    pub hub: HubStats,
}

impl StatusResponse {
    fn from_supervisor(supervisor: &LinkSupervisor) -> Self {
        let status = supervisor.status();
        Self {
            connected: status.is_connected(),
            port: status.device,
            state: status.state,
            last_error: status.last_error,
            observers: status.observers,
            pipeline: status.pipeline,
            hub: status.hub,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error returned by HTTP handlers
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        let status = match err {
            RelayError::InvalidState { .. } => StatusCode::CONFLICT,
            _ => StatusCode::SERVICE_UNAVAILABLE,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// Build the router with all routes and layers
pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/", get(handle_websocket))
        .route("/ws", get(handle_websocket))
        .route("/status", get(status))
        .route("/reconnect", post(reconnect))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn status(State(state): State<RelayState>) -> Json<StatusResponse> {
    Json(StatusResponse::from_supervisor(&state.supervisor))
}

async fn reconnect(State(state): State<RelayState>) -> Result<Json<StatusResponse>, ApiError> {
    tracing::info!("Reconnect requested");
    state.supervisor.reconnect(state.source.clone()).await?;
    Ok(Json(StatusResponse::from_supervisor(&state.supervisor)))
}

/// Handle WebSocket upgrade
async fn handle_websocket(ws: WebSocketUpgrade, State(state): State<RelayState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: RelayState) {
    let (mut sender, mut receiver) = socket.split();
    let (id, mut frames) = state.hub.subscribe();
    tracing::info!("Observer {} connected", id);

    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let mut writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                next = frames.recv() => match next {
                    Some(payload) => {
                        if let Err(e) = sender.send(Message::Text(payload.to_string().into())).await {
                            tracing::debug!("Observer {} send failed: {}", id, e);
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
        frames
    });

    let frames: Option<ObserverStream> = tokio::select! {
        _ = read_until_closed(&mut receiver) => {
            let _ = stop_tx.send(());
            writer.await.ok()
        }
        finished = &mut writer => finished.ok(),
    };

    state.hub.unregister(id);
    drop(frames);
    tracing::info!("Observer {} disconnected", id);
}

/// Consume inbound messages until the client closes or the socket errors
async fn read_until_closed(receiver: &mut SplitStream<WebSocket>) {
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::debug!("WebSocket error: {}", e);
                break;
            }
            // inbound data is ignored; axum answers pings
            _ => {}
        }
    }
}
