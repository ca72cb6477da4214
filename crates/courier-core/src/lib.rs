//! Courier core types
//!
//! Wire envelopes, the error taxonomy and the seam to the host messaging
//! substrate. Everything else in the workspace builds on these.

pub mod envelope;
pub mod error;
pub mod sender;
pub mod transport;

pub use envelope::{split_target, Request, Response, EXTERNAL_SOURCE, WILDCARD};
pub use error::{BusError, BusErrorCode, HandlerError, TransportError};
pub use sender::{SenderInfo, TabId};
pub use transport::{Address, Listener, Reply, ReplyCallback, Responder, Transport};

/// Payload type carried by every envelope.
pub use serde_json::Value;

pub type Result<T> = std::result::Result<T, BusError>;
