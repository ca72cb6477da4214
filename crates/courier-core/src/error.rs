use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of call failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusErrorCode {
    /// Nobody answered: no target, broadcast miss, or a torn-down channel
    NoResponse,
    /// A specifically named bus was reached but has nothing at the path
    NoHandler,
    /// The handler ran and failed
    HandlerError,
}

impl BusErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoResponse => "no_response",
            Self::NoHandler => "no_handler",
            Self::HandlerError => "handler_error",
        }
    }
}

impl fmt::Display for BusErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured call error.
///
/// `code`, `message` and `type` travel on the wire. `target` is filled in by
/// the caller (`target:path`) and never serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct BusError {
    pub code: BusErrorCode,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip)]
    pub target: Option<String>,
}

impl BusError {
    pub fn new(code: BusErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            kind: None,
            target: None,
        }
    }

    pub fn no_response(message: impl Into<String>) -> Self {
        Self::new(BusErrorCode::NoResponse, message)
    }

    pub fn no_handler(message: impl Into<String>) -> Self {
        Self::new(BusErrorCode::NoHandler, message)
    }

    pub fn handler_error(message: impl Into<String>, kind: Option<String>) -> Self {
        Self {
            kind,
            ..Self::new(BusErrorCode::HandlerError, message)
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Error category name, falling back to the code.
    pub fn type_name(&self) -> &str {
        self.kind.as_deref().unwrap_or(self.code.as_str())
    }
}

impl From<HandlerError> for BusError {
    fn from(err: HandlerError) -> Self {
        Self::handler_error(err.message, err.kind)
    }
}

/// Failure raised by a handler.
///
/// Only the message and the optional category name reach the caller.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
    pub kind: Option<String>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Builds an error out of a caught panic payload.
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "handler panicked".to_string()
        };
        Self::new(message).with_kind("panic")
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string()).with_kind("serialization")
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{:#}", err))
    }
}

/// Side-channel error reported by the substrate alongside a reply
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Could not establish connection. Receiving end does not exist.")]
    ReceivingEndMissing,

    #[error("The message port closed before a response was received.")]
    PortClosed,

    #[error("No active tab")]
    NoActiveTab,

    #[error("{0}")]
    Other(String),
}
