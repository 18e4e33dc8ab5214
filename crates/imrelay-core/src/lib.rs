//! # imrelay-core
//!
//! Connection registry and message routing for the imrelay presence relay.
//!
//! ## Architecture
//!
//! - **Connection**: one live client session, backed by a bounded outbound queue
//! - **ConnectionRegistry**: user id to current connection, plus online count
//! - **MessageRouter**: broadcast, directed send and offline notices
//! - **Relay**: lifecycle events (connect, message, disconnect, error) from the
//!   hosting transport
//!
//! The transport (see `imrelay-server`) owns the sockets. This crate never
//! performs I/O beyond pushing into per-connection queues.

pub mod connection;
pub mod envelope;
pub mod registry;
pub mod relay;
pub mod router;

mod error;

pub use connection::{Connection, OutboundMessage};
pub use envelope::Envelope;
pub use error::{RelayError, RelayResult};
pub use registry::ConnectionRegistry;
pub use relay::{Relay, DEFAULT_WELCOME_MESSAGE};
pub use router::{
    BroadcastReport, MessageRouter, RouterConfig, RoutingResult, SendResult,
    DEFAULT_OFFLINE_NOTICE,
};
