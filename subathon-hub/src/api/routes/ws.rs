//! Subscriber feed over WebSocket.
//!
//! Each socket is one subscriber: outbound frames come from its broadcaster
//! queue, inbound text frames are client commands.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::debug;

use crate::api::server::AppState;
use crate::services::ServiceContainer;

/// Plain-HTTP body for non-upgrade requests.
pub const BANNER: &str = "Subathon Hub running";

/// Upgrade to the subscriber feed, or answer with the banner.
pub async fn subscribe_or_banner(
    State(state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match upgrade {
        Ok(ws) => {
            let services = state.services.clone();
            ws.on_upgrade(move |socket| handle_socket(socket, services))
        }
        Err(_) => BANNER.into_response(),
    }
}

async fn handle_socket(socket: WebSocket, services: Arc<ServiceContainer>) {
    let mut subscription = services.connect_subscriber();
    let id = subscription.id();
    let shutdown = services.cancellation_token();
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
            frame = subscription.recv() => match frame {
                Some(frame) => {
                    if sender.send(Message::text(frame.to_string())).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            message = receiver.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    services.handle_command(id, text.as_str()).await;
                }
                Some(Ok(Message::Ping(data))) => {
                    if sender.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(subscriber_id = id, error = %e, "Subscriber socket error");
                    break;
                }
            },
        }
    }

    drop(subscription);
    debug!(
        subscriber_id = id,
        subscribers = services.broadcaster.subscriber_count(),
        "Subscriber disconnected"
    );
}
