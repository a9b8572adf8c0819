//! WebSocket upgrade handler

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{RoomCommand, SchedulerHandle};
use crate::ws::protocol::ClientMsg;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();
    info!(connection_id = %connection_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();
    let (outbox, outbox_rx) = mpsc::channel(state.config.outbox_capacity);

    let registered = state
        .scheduler
        .send(RoomCommand::Connect {
            connection_id,
            outbox,
        })
        .await;
    if !registered {
        error!(connection_id = %connection_id, "Scheduler unavailable, closing connection");
        return;
    }

    run_session(connection_id, ws_sink, ws_stream, outbox_rx, &state.scheduler).await;

    // Disconnect is handled like an explicit leave
    let _ = state
        .scheduler
        .send(RoomCommand::Disconnect { connection_id })
        .await;

    info!(connection_id = %connection_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    connection_id: Uuid,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    mut outbox_rx: mpsc::Receiver<Arc<str>>,
    scheduler: &SchedulerHandle,
) {
    // Spawn writer task: outbox frames -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(frame) = outbox_rx.recv().await {
            if let Err(e) = ws_sink.send(Message::Text(frame.to_string())).await {
                debug!(connection_id = %connection_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> scheduler
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMsg>(&text) {
                Ok(msg) => {
                    let command = RoomCommand::Message { connection_id, msg };
                    if !scheduler.send(command).await {
                        debug!(connection_id = %connection_id, "Scheduler channel closed");
                        break;
                    }
                }
                Err(e) => {
                    warn!(connection_id = %connection_id, error = %e, "Failed to parse client message");
                }
            },
            Ok(Message::Binary(_)) => {
                warn!(connection_id = %connection_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(connection_id = %connection_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}
