//! services/api/src/web/ws_handler.rs
//!
//! WebSocket fan-out of the counter change feed. Each connected client
//! receives the current counter value on connect, then one JSON frame per
//! store-side change. Clients are expected to keep their own poll as a
//! backstop; a dropped socket is not an error worth surfacing.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::web::rest::CounterResponse;
use crate::web::state::AppState;
use trashtalk_core::domain::CounterObservation;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn counter_ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("New counter feed WebSocket connection established");
    let mut updates = app_state.counter_updates.subscribe();
    let (mut sender, mut receiver) = socket.split();

    // Prime the client with the current value so it does not have to wait
    // for the first change.
    if let Ok(observation) = app_state.counter.read().await {
        if send_observation(&mut sender, observation).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            update = updates.recv() => {
                match update {
                    Ok(observation) => {
                        if send_observation(&mut sender, observation).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Only the latest value matters; dropped
                        // intermediates are fine.
                        warn!("Counter feed client lagged, skipped {} updates", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Counter feed closed, ending WebSocket connection");
                        break;
                    }
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Counter feed client disconnected");
                        break;
                    }
                    Some(Ok(_)) => {
                        // This feed is one-way; client frames are ignored.
                    }
                    Some(Err(e)) => {
                        warn!("Counter feed WebSocket error: {}", e);
                        break;
                    }
                }
            }
        }
    }
}

async fn send_observation(
    sender: &mut (impl futures::Sink<Message, Error = axum::Error> + Unpin),
    observation: CounterObservation,
) -> Result<(), axum::Error> {
    use futures::SinkExt;

    let response: CounterResponse = observation.into();
    let json = serde_json::to_string(&response).map_err(axum::Error::new)?;
    sender.send(Message::Text(json.into())).await
}
