//! Session lifecycle surface.
//!
//! The hosting transport reports open, message, close and error events here.
//! `Relay` turns them into registry updates and routing calls and never
//! returns an error to the transport.

use std::fmt;
use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::connection::Connection;
use crate::registry::ConnectionRegistry;
use crate::router::{MessageRouter, RouterConfig, RoutingResult};

/// Greeting sent to a client right after it registers.
pub const DEFAULT_WELCOME_MESSAGE: &str = "连接成功！";

/// Lifecycle handler shared by every session task.
pub struct Relay {
    registry: Arc<ConnectionRegistry>,
    router: MessageRouter,
    welcome_message: Option<String>,
}

impl Relay {
    /// Create a relay over an existing registry.
    pub fn new(registry: Arc<ConnectionRegistry>, router_config: RouterConfig) -> Self {
        let router = MessageRouter::new(router_config, Arc::clone(&registry));
        Self {
            registry,
            router,
            welcome_message: None,
        }
    }

    /// Set the message sent to every newly registered connection.
    pub fn with_welcome_message(mut self, message: Option<String>) -> Self {
        self.welcome_message = message;
        self
    }

    /// Get the connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Get the message router.
    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    /// A transport session opened.
    pub async fn on_connect(&self, connection: Connection) {
        let user_id = connection.user_id().to_owned();

        if let Some(previous) = self.registry.register(connection.clone()) {
            info!(
                user_id = %user_id,
                superseded = %previous.connection_id(),
                "Connection superseded by reconnect"
            );
        }
        info!(user_id = %user_id, online = self.registry.online_count(), "User connected");

        if let Some(welcome) = &self.welcome_message {
            if let Err(e) = connection.send(welcome.clone()).await {
                error!(user_id = %user_id, error = %e, "Failed to send welcome message");
            }
        }
    }

    /// A text frame arrived from `user_id`.
    pub async fn on_message(&self, user_id: &str, text: &str) -> RoutingResult {
        info!(user_id = %user_id, len = text.len(), "User message");
        self.router.handle_inbound(user_id, text).await
    }

    /// A transport session closed.
    ///
    /// Only removes the registration if it still belongs to `connection_id`.
    pub fn on_disconnect(&self, user_id: &str, connection_id: Uuid) {
        if self
            .registry
            .unregister_connection(user_id, connection_id)
            .is_none()
        {
            warn!(user_id = %user_id, connection_id = %connection_id, "Closed connection was not registered");
        }
        info!(user_id = %user_id, online = self.registry.online_count(), "User disconnected");
    }

    /// The transport reported an error. The registration is kept.
    pub fn on_error(&self, user_id: &str, err: &dyn std::error::Error) {
        error!(user_id = %user_id, error = %err, "Connection error");
    }
}

impl fmt::Debug for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relay")
            .field("registry", &self.registry)
            .field("welcome_message", &self.welcome_message)
            .finish()
    }
}
