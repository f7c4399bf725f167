//! WebSocket relay between browser participants and the broker.
//!
//! Every frame is a JSON `ChannelMessage` (`{ topic, payload, retain }`).
//! Frames from the broker under the configured prefix are pushed to the
//! socket, retained ones first; frames from the socket are published as-is.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use axum::{Router, routing::get};
use futures_util::{SinkExt, StreamExt};
use storylink_core::channel::{ChannelMessage, SyncChannel};
use storylink_core::error::DomainError;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::ErrorBody;
use crate::state::AppState;

/// Buffer size for per-connection outbound frames.
const CONNECTION_CHANNEL_BUFFER: usize = 256;

/// GET /ws
async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Decodes one inbound frame and checks that it stays under `prefix`.
///
/// # Errors
///
/// Returns `DomainError::MalformedMessage` if the frame is not a channel
/// message, or `DomainError::Validation` if its topic is outside the prefix
/// or contains wildcards.
pub fn parse_frame(text: &str, prefix: &str) -> Result<ChannelMessage, DomainError> {
    let message: ChannelMessage = serde_json::from_str(text)
        .map_err(|e| DomainError::MalformedMessage(format!("invalid frame: {e}")))?;
    let inside = message
        .topic
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('/') && rest.len() > 1);
    if !inside {
        return Err(DomainError::Validation(format!(
            "topic '{}' is outside '{prefix}/'",
            message.topic
        )));
    }
    if message.topic.contains(['+', '#']) {
        return Err(DomainError::Validation(format!(
            "cannot publish to wildcard topic '{}'",
            message.topic
        )));
    }
    Ok(message)
}

fn error_frame(err: &DomainError) -> String {
    let code = match err {
        DomainError::MalformedMessage(_) => "malformed_message",
        DomainError::Transport(_) | DomainError::Unavailable(_) => "transport_error",
        DomainError::Validation(_) | DomainError::OutOfRange { .. } => "validation_error",
    };
    let body = ErrorBody {
        error: code,
        message: err.to_string(),
    };
    serde_json::to_string(&body).unwrap_or_default()
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let filter = format!("{}/#", state.topic_prefix);
    let mut subscription = match state.broker.subscribe(&[filter]).await {
        Ok(subscription) => subscription,
        Err(err) => {
            warn!(error = %err, "Relay could not subscribe; closing socket");
            let _ = ws_sender.send(Message::Text(error_frame(&err).into())).await;
            let _ = ws_sender.close().await;
            return;
        }
    };
    info!("Relay connection established");

    let (tx, mut rx) = mpsc::channel::<String>(CONNECTION_CHANNEL_BUFFER);

    // Broker to socket.
    let forward_tx = tx.clone();
    let mut forward_task = tokio::spawn(async move {
        while let Some(message) = subscription.next_message().await {
            match serde_json::to_string(&message) {
                Ok(json) => {
                    if forward_tx.send(json).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!(error = %e, "Failed to encode relayed message"),
            }
        }
    });

    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    // Socket to broker.
    loop {
        let result = tokio::select! {
            incoming = ws_receiver.next() => match incoming {
                Some(result) => result,
                None => break,
            },
            _ = &mut forward_task => {
                info!("Broker subscription ended; closing relay");
                break;
            }
        };
        match result {
            Ok(Message::Text(text)) => {
                let published = match parse_frame(text.as_str(), &state.topic_prefix) {
                    Ok(message) => state.broker.publish(message).await,
                    Err(err) => Err(err),
                };
                if let Err(err) = published {
                    warn!(error = %err, "Relay frame rejected");
                    if tx.try_send(error_frame(&err)).is_err() {
                        warn!("Failed to send error frame, channel full or closed");
                    }
                }
            }
            Ok(Message::Close(_)) => {
                info!("Relay socket closed by client");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Relay socket error");
                break;
            }
            _ => {}
        }
    }

    // The send task drains what is queued and closes the socket once every
    // sender is gone.
    drop(tx);
    forward_task.abort();
    if send_task.await.is_err() {
        warn!("Relay send task panicked");
    }
    info!("Relay connection terminated");
}

/// Returns the relay router.
pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(upgrade))
}
