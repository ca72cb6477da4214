//! Seam to the host messaging substrate
//!
//! The bus never talks to the host directly. It is handed a [`Transport`]
//! that can send one message and report at most one reply, and that can
//! register [`Listener`]s for inbound traffic.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::envelope::Response;
use crate::error::TransportError;
use crate::sender::{SenderInfo, TabId};

/// Where an outbound message is delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// Every non-tab context of the sender's own extension
    Runtime,
    /// Content scripts of one tab
    Tab(TabId),
    /// External listeners of another extension
    Extension(String),
}

/// The single callback invocation of a send.
///
/// Mirrors the host contract: a reply value (possibly missing) plus a
/// last-error side channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    pub response: Option<Value>,
    pub last_error: Option<TransportError>,
}

impl Reply {
    pub fn response(value: Value) -> Self {
        Self {
            response: Some(value),
            last_error: None,
        }
    }

    pub fn failed(error: TransportError) -> Self {
        Self {
            response: None,
            last_error: Some(error),
        }
    }
}

/// Invoked at most once per send. Dropping it unfired means the channel
/// was torn down.
pub type ReplyCallback = Box<dyn FnOnce(Reply) + Send + 'static>;

/// One-shot handle for answering an inbound message.
///
/// `send` consumes the responder, so a listener can answer at most once.
pub struct Responder {
    reply: Box<dyn FnOnce(Value) + Send + 'static>,
}

impl Responder {
    pub fn new<F>(reply: F) -> Self
    where
        F: FnOnce(Value) + Send + 'static,
    {
        Self {
            reply: Box::new(reply),
        }
    }

    pub fn send(self, response: Response) {
        self.send_value(response.to_value());
    }

    pub fn send_value(self, value: Value) {
        (self.reply)(value)
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder").finish_non_exhaustive()
    }
}

/// Inbound message listener.
///
/// Returning `true` tells the substrate a response will be sent later and
/// the channel must stay open.
pub trait Listener: Send + Sync {
    fn on_message(&self, message: Value, sender: SenderInfo, responder: Responder) -> bool;
}

impl<F> Listener for F
where
    F: Fn(Value, SenderInfo, Responder) -> bool + Send + Sync,
{
    fn on_message(&self, message: Value, sender: SenderInfo, responder: Responder) -> bool {
        (self)(message, sender, responder)
    }
}

/// Host messaging primitives available to one execution context
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `message` to `address`; `callback` fires at most once.
    fn send(&self, address: Address, message: Value, callback: ReplyCallback);

    /// The tab the user is currently looking at, if any.
    async fn active_tab(&self) -> Option<TabId>;

    /// Registers a listener for messages from this extension.
    fn add_listener(&self, listener: Arc<dyn Listener>);

    /// Registers a listener for messages from other extensions.
    fn add_external_listener(&self, listener: Arc<dyn Listener>);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_responder_delivers_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let responder = Responder::new(move |value| sink.lock().unwrap().push(value));

        responder.send(Response::success("b", Value::from("hi")));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["result"], "hi");
    }

    #[test]
    fn test_closure_listener() {
        let listener = |_msg: Value, sender: SenderInfo, _responder: Responder| {
            sender.is_content_script()
        };
        let kept_open = listener.on_message(
            Value::Null,
            SenderInfo::new().with_tab(3, 0),
            Responder::new(|_| {}),
        );
        assert!(kept_open);
    }
}
