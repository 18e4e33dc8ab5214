//! A single live client connection.
//!
//! The core never touches the socket. Each connection owns the sending half of
//! a bounded queue; the transport layer drains the receiving half into the
//! socket from its own writer task.

use std::fmt;

use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::error::{RelayError, RelayResult};

/// A text frame queued for delivery to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Frame payload
    pub text: String,
}

impl OutboundMessage {
    /// Create a new outbound message.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Consume the message, returning its payload.
    pub fn into_text(self) -> String {
        self.text
    }
}

/// Handle to one physical connection.
///
/// Cloning is cheap and every clone refers to the same underlying queue.
/// The user id and connection id are fixed at construction.
#[derive(Clone)]
pub struct Connection {
    user_id: String,
    connection_id: Uuid,
    sender: mpsc::Sender<OutboundMessage>,
}

impl Connection {
    /// Wrap an existing outbound sender.
    pub fn new(user_id: impl Into<String>, sender: mpsc::Sender<OutboundMessage>) -> Self {
        Self {
            user_id: user_id.into(),
            connection_id: Uuid::new_v4(),
            sender,
        }
    }

    /// Create a connection together with the receiver the transport drains.
    pub fn channel(
        user_id: impl Into<String>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(user_id, tx), rx)
    }

    /// The user id this connection was opened for.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Identifier of the physical connection.
    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    /// Whether the transport has dropped its receiver.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Send and wait for queue space.
    ///
    /// Fails only when the transport side is gone, so callers can observe
    /// the outcome of a directed delivery.
    pub async fn send(&self, text: impl Into<String>) -> RelayResult<()> {
        self.sender
            .send(OutboundMessage::new(text))
            .await
            .map_err(|_| {
                debug!(user_id = %self.user_id, connection_id = %self.connection_id, "Send on closed connection");
                RelayError::ChannelClosed
            })
    }

    /// Send without waiting.
    ///
    /// A full queue or a closed transport fails immediately and the message
    /// is lost for this recipient.
    pub fn send_nowait(&self, text: impl Into<String>) -> RelayResult<()> {
        match self.sender.try_send(OutboundMessage::new(text)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(RelayError::ChannelFull),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(RelayError::ChannelClosed),
        }
    }

    /// Whether both handles refer to the same physical connection.
    pub fn same_connection(&self, other: &Connection) -> bool {
        self.connection_id == other.connection_id
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("user_id", &self.user_id)
            .field("connection_id", &self.connection_id)
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}
