//! Outbound call correlator
//!
//! Wraps the substrate's single-callback send in a future and folds every
//! way a call can end into either a value or a [`BusError`], then hands
//! errors to the bus's [`OnError`] policy.

use courier_core::{
    split_target, Address, BusError, BusErrorCode, Reply, Request, Response, Result, TabId,
    TransportError, Value, WILDCARD,
};
use courier_observability::{call_span, CallMetrics};
use tokio::sync::oneshot;
use tracing::{debug, warn, Instrument};
use uuid::Uuid;

use crate::bus::Bus;
use crate::policy::OnError;

/// Which tab a tab call goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabTarget {
    Id(TabId),
    /// Whatever tab the user is looking at when the call starts
    Active,
}

impl From<TabId> for TabTarget {
    fn from(id: TabId) -> Self {
        Self::Id(id)
    }
}

/// How a reply settled
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Outcome {
    Success(Value),
    Failure {
        error: BusError,
        response: Option<Response>,
    },
}

/// Classifies the callback invocation of one send; `None` means the
/// callback was dropped without firing.
pub(crate) fn classify(reply: Option<Reply>) -> Outcome {
    let Some(reply) = reply else {
        return Outcome::Failure {
            error: BusError::no_response("Message channel closed before a response was received"),
            response: None,
        };
    };

    let response = reply.response.as_ref().map(Response::from_value);

    // A structured error outranks whatever the transport reported
    if let Some(error) = response.as_ref().and_then(|r| r.error.clone()) {
        return Outcome::Failure { error, response };
    }

    if let Some(err) = reply.last_error {
        return Outcome::Failure {
            error: BusError::no_response(err.to_string()),
            response: None,
        };
    }

    match response {
        Some(response) => Outcome::Success(response.result.unwrap_or(Value::Null)),
        None => Outcome::Failure {
            error: BusError::no_response("No response"),
            response: None,
        },
    }
}

fn address_label(address: &Address) -> &'static str {
    match address {
        Address::Runtime => "runtime",
        Address::Tab(_) => "tab",
        Address::Extension(_) => "extension",
    }
}

impl Bus {
    /// Calls `path` on the bus's default target, or on `name` when the path
    /// reads `name:path`.
    pub async fn call(&self, path: &str, data: Value) -> Result<Value> {
        self.set_error(None);

        let default_target = self.target();
        let (target, path) = split_target(path, &default_target);
        let request = Request::new(self.name(), target, path, data);

        self.send_request(Address::Runtime, request).await
    }

    /// Calls `path` on the content scripts of a tab. The path is sent as
    /// given and every bus in the tab may answer.
    pub async fn call_tab(
        &self,
        tab: impl Into<TabTarget>,
        path: &str,
        data: Value,
    ) -> Result<Value> {
        self.set_error(None);

        let request = Request::new(self.name(), WILDCARD, path, data);
        let tab_id = match tab.into() {
            TabTarget::Id(id) => id,
            TabTarget::Active => match self.inner.transport.active_tab().await {
                Some(id) => id,
                None => {
                    let error = BusError::no_response(TransportError::NoActiveTab.to_string());
                    return self.fail(&request, error, None);
                }
            },
        };

        self.send_request(Address::Tab(tab_id), request).await
    }

    /// Calls `path` on another extension's external listener.
    pub async fn call_extension(
        &self,
        extension_id: impl Into<String>,
        path: &str,
        data: Value,
    ) -> Result<Value> {
        self.set_error(None);

        let request = Request::new(self.name(), WILDCARD, path, data);
        self.send_request(Address::Extension(extension_id.into()), request)
            .await
    }

    async fn send_request(&self, address: Address, request: Request) -> Result<Value> {
        let call_id = Uuid::new_v4().to_string();
        let span = call_span(self.name(), &request.target, &request.path, &call_id);

        async move {
            CallMetrics::record_call(self.name(), address_label(&address));
            debug!(address = ?address, "Sending request");

            let (tx, rx) = oneshot::channel::<Reply>();
            self.inner.transport.send(
                address,
                request.to_value(),
                Box::new(move |reply| {
                    let _ = tx.send(reply);
                }),
            );

            match classify(rx.await.ok()) {
                Outcome::Success(value) => {
                    debug!("Call succeeded");
                    Ok(value)
                }
                Outcome::Failure { error, response } => {
                    self.fail(&request, error, response.as_ref())
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Records a failed call and applies the error policy.
    fn fail(
        &self,
        request: &Request,
        error: BusError,
        response: Option<&Response>,
    ) -> Result<Value> {
        let error = error.with_target(request.qualified_path());
        CallMetrics::record_error(self.name(), error.code.as_str());
        self.set_error(Some(error.clone()));

        match self.on_error() {
            OnError::Warn => {
                if error.code != BusErrorCode::NoResponse {
                    warn!(
                        bus = %self.name(),
                        "{} at {}: {}",
                        error.type_name(),
                        request.qualified_path(),
                        error.message
                    );
                }
                Ok(Value::Null)
            }
            OnError::Silent => Ok(Value::Null),
            OnError::Reject => Err(error),
            OnError::Custom(resolve) => Ok(resolve(request, response, self)),
        }
    }
}
