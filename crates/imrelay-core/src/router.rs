//! Message routing between registered connections.
//!
//! For each inbound message, the router:
//! 1. Parses the envelope and stamps the sender's registered user id
//! 2. Broadcasts the stamped message to every registered connection
//! 3. If a recipient is named and online: sends it to the recipient and
//!    echoes it back to the sender
//! 4. If a recipient is named but offline: sends the sender a notice
//!
//! Step 2 always happens, so a directed message to an online recipient
//! reaches the sender twice and the recipient twice.

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::connection::Connection;
use crate::envelope::{is_blank, Envelope};
use crate::error::RelayError;
use crate::registry::ConnectionRegistry;

/// Placeholder replaced by the recipient id in the offline notice.
pub const USER_ID_PLACEHOLDER: &str = "{userId}";

/// Notice sent to a sender whose recipient is offline.
pub const DEFAULT_OFFLINE_NOTICE: &str = "{userId}当前用户占不在线！";

/// Configuration for the message router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Offline notice template, `{userId}` is replaced with the recipient
    pub offline_notice: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            offline_notice: DEFAULT_OFFLINE_NOTICE.to_string(),
        }
    }
}

impl RouterConfig {
    /// Create a router configuration with the default notice.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom offline notice template.
    pub fn with_offline_notice(mut self, template: impl Into<String>) -> Self {
        self.offline_notice = template.into();
        self
    }

    /// Render the offline notice for a recipient.
    pub fn offline_notice_for(&self, recipient: &str) -> String {
        self.offline_notice.replace(USER_ID_PLACEHOLDER, recipient)
    }
}

/// Outcome of a single directed send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendResult {
    /// Message was queued for delivery
    Sent,
    /// The recipient is not currently connected
    NotConnected,
    /// The recipient's transport is gone
    ChannelClosed,
}

impl SendResult {
    /// Whether the message was handed to the transport.
    pub fn is_sent(&self) -> bool {
        matches!(self, SendResult::Sent)
    }
}

/// Per-recipient tally of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections the message was queued for
    pub delivered: usize,
    /// Connections that refused the message
    pub failed: usize,
}

impl BroadcastReport {
    /// Number of connections a delivery was attempted for.
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed
    }
}

/// What the router did with an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingResult {
    /// Blank input, nothing sent
    Empty,
    /// Input was not a valid envelope, nothing sent
    Malformed,
    /// No recipient named, broadcast only
    Broadcast {
        /// Broadcast tally
        broadcast: BroadcastReport,
    },
    /// Recipient online: broadcast plus direct copies
    Directed {
        /// Broadcast tally
        broadcast: BroadcastReport,
        /// Direct copy to the recipient
        recipient: SendResult,
        /// Direct copy echoed to the sender
        echo: SendResult,
    },
    /// Recipient offline: broadcast plus a notice to the sender
    RecipientOffline {
        /// Broadcast tally
        broadcast: BroadcastReport,
        /// The recipient that was not found
        recipient: String,
        /// Delivery of the notice to the sender
        notice: SendResult,
    },
}

/// Routes inbound messages through the connection registry.
pub struct MessageRouter {
    /// Router configuration
    config: RouterConfig,
    /// Registry of online users
    registry: Arc<ConnectionRegistry>,
}

impl MessageRouter {
    /// Create a new message router.
    pub fn new(config: RouterConfig, registry: Arc<ConnectionRegistry>) -> Self {
        Self { config, registry }
    }

    /// Get the router configuration.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Get the registry this router delivers through.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Route one inbound message from `sender_id`.
    ///
    /// Never fails: every problem is logged and reflected in the result.
    #[instrument(skip(self, raw), fields(sender = %sender_id, len = raw.len()))]
    pub async fn handle_inbound(&self, sender_id: &str, raw: &str) -> RoutingResult {
        let mut envelope = match Envelope::parse(raw) {
            Ok(envelope) => envelope,
            Err(RelayError::EmptyMessage) => {
                debug!("Ignoring blank message");
                return RoutingResult::Empty;
            }
            Err(e) => {
                warn!(error = %e, "Dropping malformed message");
                return RoutingResult::Malformed;
            }
        };

        envelope.stamp_sender(sender_id);
        let text = match envelope.to_text() {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "Failed to encode stamped message");
                return RoutingResult::Malformed;
            }
        };

        let broadcast = self.broadcast(&text);

        let Some(recipient) = envelope.recipient() else {
            return RoutingResult::Broadcast { broadcast };
        };

        match self.registry.lookup(recipient) {
            Some(connection) => {
                let recipient_result = deliver(&connection, text.clone()).await;
                let echo = self.deliver_to_user(sender_id, text).await;
                debug!(to = %recipient, recipient = ?recipient_result, echo = ?echo, "Directed send complete");
                RoutingResult::Directed {
                    broadcast,
                    recipient: recipient_result,
                    echo,
                }
            }
            None => {
                warn!(to = %recipient, "Recipient not online");
                let notice = self
                    .deliver_to_user(sender_id, self.config.offline_notice_for(recipient))
                    .await;
                RoutingResult::RecipientOffline {
                    broadcast,
                    recipient: recipient.to_owned(),
                    notice,
                }
            }
        }
    }

    /// Send `text` to every registered connection without waiting.
    ///
    /// A refused send is logged and skipped; the connection stays registered.
    pub fn broadcast(&self, text: &str) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        for (user_id, connection) in self.registry.all() {
            match connection.send_nowait(text) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "Broadcast delivery failed");
                    report.failed += 1;
                }
            }
        }

        debug!(
            delivered = report.delivered,
            failed = report.failed,
            "Broadcast complete"
        );
        report
    }

    /// Push arbitrary text to a connected user, bypassing envelope parsing.
    #[instrument(skip(self, text), fields(to = %user_id))]
    pub async fn send_to(&self, user_id: &str, text: impl Into<String>) -> SendResult {
        let text = text.into();
        info!(len = text.len(), "Pushing message to user");

        if is_blank(user_id) {
            error!("User not online");
            return SendResult::NotConnected;
        }
        self.deliver_to_user(user_id, text).await
    }

    async fn deliver_to_user(&self, user_id: &str, text: String) -> SendResult {
        match self.registry.lookup(user_id) {
            Some(connection) => deliver(&connection, text).await,
            None => {
                error!(user_id = %user_id, "User not online");
                SendResult::NotConnected
            }
        }
    }
}

async fn deliver(connection: &Connection, text: String) -> SendResult {
    match connection.send(text).await {
        Ok(()) => SendResult::Sent,
        Err(e) => {
            warn!(user_id = %connection.user_id(), error = %e, "Direct delivery failed");
            SendResult::ChannelClosed
        }
    }
}
