//! One send's reply slot
//!
//! Every listener reached by a send gets a [`Responder`] backed by the same
//! exchange. The first answer fires the sender's callback; later answers are
//! dropped. If the exchange goes away unanswered the sender hears that the
//! port closed.

use std::sync::Arc;

use courier_core::{Reply, ReplyCallback, Responder, TransportError};
use parking_lot::Mutex;
use tracing::trace;

pub(crate) struct Exchange {
    callback: Mutex<Option<ReplyCallback>>,
}

impl Exchange {
    pub(crate) fn new(callback: ReplyCallback) -> Arc<Self> {
        Arc::new(Self {
            callback: Mutex::new(Some(callback)),
        })
    }

    /// Fires the callback unless someone already did. Returns whether this
    /// call won.
    pub(crate) fn settle(&self, reply: Reply) -> bool {
        let callback = self.callback.lock().take();
        match callback {
            Some(callback) => {
                callback(reply);
                true
            }
            None => {
                trace!("Reply discarded, exchange already settled");
                false
            }
        }
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.callback.lock().is_none()
    }

    pub(crate) fn responder(self: &Arc<Self>) -> Responder {
        let exchange = Arc::clone(self);
        Responder::new(move |value| {
            exchange.settle(Reply::response(value));
        })
    }
}

impl Drop for Exchange {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.get_mut().take() {
            callback(Reply::failed(TransportError::PortClosed));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    fn recorder() -> (ReplyCallback, Arc<StdMutex<Vec<Reply>>>) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (Box::new(move |reply| sink.lock().unwrap().push(reply)), seen)
    }

    #[test]
    fn test_first_answer_wins() {
        let (callback, seen) = recorder();
        let exchange = Exchange::new(callback);
        let first = exchange.responder();
        let second = exchange.responder();

        first.send_value(json!(1));
        second.send_value(json!(2));
        assert!(exchange.is_settled());
        drop(exchange);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].response, Some(json!(1)));
    }

    #[test]
    fn test_dropped_unanswered_closes_port() {
        let (callback, seen) = recorder();
        let exchange = Exchange::new(callback);
        let responder = exchange.responder();
        drop(exchange);
        assert!(seen.lock().unwrap().is_empty());

        drop(responder);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].last_error, Some(TransportError::PortClosed));
    }
}
