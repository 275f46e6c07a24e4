//! Progress channel
//!
//! Every connected client receives each `ProgressEvent` published on the
//! shared broadcast bus as JSON text, plus a ping every 30 seconds.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use crate::AppState;

const PING_INTERVAL: Duration = Duration::from_secs(30);

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    metrics::gauge!("refscore_ws_connections").increment(1.0);
    info!("Progress subscriber connected");

    let (mut sender, mut receiver) = socket.split();
    let mut events = state.progress.subscribe();

    let mut send_task = tokio::spawn(async move {
        let mut ping = tokio::time::interval(PING_INTERVAL);
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => {
                        let Ok(json) = serde_json::to_string(&event) else {
                            continue;
                        };
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(missed)) => debug!(missed, "Progress subscriber lagged"),
                    Err(RecvError::Closed) => break,
                },
                _ = ping.tick() => {
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Client messages are ignored; the loop only watches for close
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if let Message::Close(_) = message {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    metrics::gauge!("refscore_ws_connections").decrement(1.0);
    info!("Progress subscriber disconnected");
}
