//! Inbound request dispatcher
//!
//! One call per inbound message: target check, resolve, invoke, and turn
//! whatever the handler did into exactly one response. Handler failures,
//! panics included, never escape this module.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Weak;

use courier_core::{BusError, HandlerError, Listener, Request, Responder, Response, SenderInfo, Value};
use courier_observability::{dispatch_span, DispatchMetrics};
use futures_util::FutureExt;
use parking_lot::RwLock;
use tokio::runtime::Handle;
use tracing::{debug, error, Instrument};

use crate::bus::BusInner;
use crate::handlers::{HandlerContext, HandlerOutput, HandlerResult, HandlerTree};

/// The bus's listener for messages from its own extension
pub(crate) struct BusListener {
    pub(crate) inner: Weak<BusInner>,
}

impl Listener for BusListener {
    fn on_message(&self, message: Value, sender: SenderInfo, responder: Responder) -> bool {
        let Some(inner) = self.inner.upgrade() else {
            return false;
        };
        let Some(request) = Request::from_value(&message) else {
            debug!(bus = %inner.name, "Ignoring non-request message");
            DispatchMetrics::record_ignored(&inner.name);
            return false;
        };

        dispatch(&inner.name, &inner.handlers, request, sender, responder)
    }
}

/// Handles one request on behalf of the bus `name`.
///
/// Returns `true` when the response will be sent later and the channel
/// must be kept open.
pub(crate) fn dispatch(
    name: &str,
    handlers: &RwLock<HandlerTree>,
    request: Request,
    sender: SenderInfo,
    responder: Responder,
) -> bool {
    if !request.addresses(name) {
        debug!(bus = %name, target = %request.target, "Request addressed elsewhere");
        DispatchMetrics::record_ignored(name);
        return false;
    }

    let span = dispatch_span(name, &request.source, &request.path);
    let _entered = span.enter();

    // Clone out of the lock so handler code never runs under it
    let resolved = handlers.read().resolve(&request.path);

    let Some(resolved) = resolved else {
        if request.is_broadcast() {
            debug!("No handler for broadcast, staying silent");
            DispatchMetrics::record_ignored(name);
        } else {
            debug!("No handler");
            responder.send(Response::failure(
                name,
                BusError::no_handler(format!("No handler for '{}' on '{}'", request.path, name)),
            ));
        }
        return false;
    };

    DispatchMetrics::record_dispatch(name);

    let Request { source, path, data, .. } = request;
    let ctx = HandlerContext::new(sender, source, path.clone(), resolved.group);
    let handler = resolved.handler;

    let output = panic::catch_unwind(AssertUnwindSafe(|| handler.call(data, ctx)))
        .unwrap_or_else(|payload| HandlerOutput::Ready(Err(HandlerError::from_panic(payload.as_ref()))));

    match output {
        HandlerOutput::Ready(result) => {
            responder.send(into_response(name, &path, result));
            false
        }
        HandlerOutput::Deferred(future) => {
            let Ok(runtime) = Handle::try_current() else {
                responder.send(into_response(
                    name,
                    &path,
                    Err(HandlerError::new("No async runtime to drive the handler").with_kind("runtime")),
                ));
                return false;
            };

            let name = name.to_string();
            runtime.spawn(
                async move {
                    let result = AssertUnwindSafe(future)
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|payload| Err(HandlerError::from_panic(payload.as_ref())));
                    responder.send(into_response(&name, &path, result));
                }
                .instrument(span.clone()),
            );
            true
        }
    }
}

fn into_response(name: &str, path: &str, result: HandlerResult) -> Response {
    match result {
        Ok(value) => Response::success(name, value),
        Err(err) => {
            error!(
                bus = %name,
                path = %path,
                kind = err.kind.as_deref().unwrap_or("error"),
                "Handler failed: {}",
                err.message
            );
            DispatchMetrics::record_handler_error(name);
            Response::failure(name, err.into())
        }
    }
}
