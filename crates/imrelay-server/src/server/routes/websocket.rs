//! WebSocket endpoint: `GET {endpoint_path}/{userId}`.
//!
//! Each upgraded socket gets a bounded outbound queue and two tasks: a writer
//! draining the queue into the socket, and the read loop below reporting
//! lifecycle events to the relay.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::{Sink, SinkExt, StreamExt};
use imrelay_core::{envelope::is_blank, Connection, OutboundMessage};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::server::AppState;

/// How long a closing connection's writer may spend flushing queued frames.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Create the WebSocket router
pub fn router(state: Arc<AppState>) -> Router {
    let route = state.config.endpoint_route();
    Router::new()
        .route(&route, get(relay_websocket_handler))
        .with_state(state)
}

/// Upgrades the HTTP connection and binds it to the user id in the path.
async fn relay_websocket_handler(
    ws: WebSocketUpgrade,
    Path(user_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    if is_blank(&user_id) {
        warn!("WebSocket connection request without user id");
        return (StatusCode::BAD_REQUEST, "user id required").into_response();
    }

    info!(user_id = %user_id, "WebSocket connection request");
    ws.on_upgrade(move |socket| handle_relay_websocket(socket, user_id, state))
}

/// Drive one client connection until it closes.
async fn handle_relay_websocket(socket: WebSocket, user_id: String, state: Arc<AppState>) {
    let (sink, mut stream) = socket.split();
    let (connection, outbound) =
        Connection::channel(user_id.clone(), state.config.outbound_buffer);
    let connection_id = connection.connection_id();

    let writer = tokio::spawn(write_outbound(sink, outbound));

    state.relay.on_connect(connection.clone()).await;

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                state.relay.on_message(&user_id, &text).await;
            }
            Ok(Message::Binary(_)) => {
                warn!(user_id = %user_id, "Received binary WebSocket message (not supported)");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                // Answered by the protocol layer
            }
            Ok(Message::Close(_)) => {
                info!(user_id = %user_id, "WebSocket close requested");
                break;
            }
            Err(e) => {
                state.relay.on_error(&user_id, &e);
                break;
            }
        }
    }

    state.relay.on_disconnect(&user_id, connection_id);
    drop(connection);
    finish_writer(writer, WRITER_DRAIN_TIMEOUT).await;

    info!(user_id = %user_id, connection_id = %connection_id, "WebSocket connection closed");
}

/// Forward queued messages to the socket until every sender is gone or the
/// socket refuses a frame.
async fn write_outbound<S>(mut sink: S, mut outbound: mpsc::Receiver<OutboundMessage>)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    while let Some(message) = outbound.recv().await {
        if let Err(e) = sink.send(Message::Text(message.into_text())).await {
            debug!(error = %e, "Socket writer stopped");
            break;
        }
    }
}

/// Let the writer flush what is already queued, aborting it if it does not
/// finish in time. Router snapshots may still hold a sender clone briefly.
async fn finish_writer(mut writer: JoinHandle<()>, timeout: Duration) {
    if tokio::time::timeout(timeout, &mut writer).await.is_err() {
        debug!("Socket writer did not drain in time, aborting");
        writer.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(message: Message) -> String {
        match message {
            Message::Text(text) => text,
            other => panic!("expected text frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_writer_flushes_queued_messages_after_close() {
        let (connection, outbound) = Connection::channel("alice", 8);
        connection.send("first").await.unwrap();
        connection.send("A当前用户占不在线！").await.unwrap();
        drop(connection);

        let (sink, mut socket) = futures::channel::mpsc::unbounded::<Message>();
        let writer = tokio::spawn(write_outbound(sink, outbound));
        finish_writer(writer, Duration::from_secs(1)).await;

        assert_eq!(text_of(socket.next().await.unwrap()), "first");
        assert_eq!(
            text_of(socket.next().await.unwrap()),
            "A当前用户占不在线！"
        );
        assert!(socket.next().await.is_none());
    }

    #[tokio::test]
    async fn test_writer_aborted_when_sender_outlives_timeout() {
        let (connection, outbound) = Connection::channel("alice", 8);
        let (sink, _socket) = futures::channel::mpsc::unbounded::<Message>();
        let writer = tokio::spawn(write_outbound(sink, outbound));

        // A lingering sender keeps the queue open, so only the timeout ends it.
        finish_writer(writer, Duration::from_millis(50)).await;

        let closed = tokio::time::timeout(Duration::from_secs(1), async {
            while !connection.is_closed() {
                tokio::task::yield_now().await;
            }
        })
        .await;
        assert!(closed.is_ok(), "aborted writer should release the queue");
    }
}
