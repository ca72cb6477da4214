//! The named bus
//!
//! Ties one handler tree, one inbound listener and the outbound correlator
//! to a transport.

use std::fmt;
use std::sync::Arc;

use courier_config::BusConfig;
use courier_core::{BusError, Transport, WILDCARD};
use parking_lot::{Mutex, RwLock};
use tracing::info;

use crate::dispatcher::BusListener;
use crate::external::{ExternalListener, ExternalPolicy};
use crate::handlers::{Handler, HandlerNode, HandlerTree};
use crate::policy::OnError;

pub(crate) struct BusInner {
    pub(crate) name: String,
    pub(crate) target: RwLock<String>,
    pub(crate) handlers: RwLock<HandlerTree>,
    pub(crate) error: Mutex<Option<BusError>>,
    pub(crate) on_error: OnError,
    pub(crate) external: ExternalPolicy,
    pub(crate) transport: Arc<dyn Transport>,
}

/// A named endpoint that both serves handlers and calls other buses.
///
/// Clones share state.
#[derive(Clone)]
pub struct Bus {
    pub(crate) inner: Arc<BusInner>,
}

impl Bus {
    pub fn builder(name: impl Into<String>) -> BusBuilder {
        BusBuilder::new(name)
    }

    /// This bus's name, used as `source` on outbound requests.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Default outbound target
    pub fn target(&self) -> String {
        self.inner.target.read().clone()
    }

    pub fn set_target(&self, target: impl Into<String>) {
        *self.inner.target.write() = target.into();
    }

    /// Error from the most recent call, if it failed.
    ///
    /// Overwritten by every call, so it is only meaningful when calls do
    /// not overlap.
    pub fn error(&self) -> Option<BusError> {
        self.inner.error.lock().clone()
    }

    pub(crate) fn set_error(&self, error: Option<BusError>) {
        *self.inner.error.lock() = error;
    }

    /// Snapshot of the handler tree
    pub fn handlers(&self) -> HandlerTree {
        self.inner.handlers.read().clone()
    }

    pub fn add_handler(&self, name: impl Into<String>, handler: impl Handler + 'static) {
        self.inner
            .handlers
            .write()
            .insert(name, HandlerNode::leaf(handler));
    }

    /// Merges `handlers` into the root. Existing siblings stay.
    pub fn add_handlers(&self, handlers: HandlerTree) {
        self.inner.handlers.write().merge(handlers);
    }

    /// Merges `handlers` into the group at `key`, creating it if needed.
    pub fn add_handlers_at(&self, key: &str, handlers: HandlerTree) {
        self.inner.handlers.write().merge_at(key, handlers);
    }

    pub fn on_error(&self) -> &OnError {
        &self.inner.on_error
    }

    pub fn external(&self) -> &ExternalPolicy {
        &self.inner.external
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("name", &self.inner.name)
            .field("target", &self.target())
            .field("on_error", &self.inner.on_error)
            .field("external", &self.inner.external)
            .finish()
    }
}

/// Builder for [`Bus`]
#[derive(Debug)]
pub struct BusBuilder {
    name: String,
    target: String,
    handlers: HandlerTree,
    on_error: OnError,
    external: ExternalPolicy,
}

impl BusBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: WILDCARD.to_string(),
            handlers: HandlerTree::new(),
            on_error: OnError::default(),
            external: ExternalPolicy::default(),
        }
    }

    /// Name, target, error policy and external paths from a config file.
    pub fn from_config(config: &BusConfig) -> Self {
        Self::new(config.name.clone())
            .target(config.target.clone())
            .on_error(config.on_error)
            .external(ExternalPolicy::from(&config.external))
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    pub fn handlers(mut self, handlers: HandlerTree) -> Self {
        self.handlers.merge(handlers);
        self
    }

    pub fn handler(mut self, name: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.handlers.insert(name, HandlerNode::leaf(handler));
        self
    }

    pub fn on_error(mut self, on_error: impl Into<OnError>) -> Self {
        self.on_error = on_error.into();
        self
    }

    pub fn external(mut self, external: ExternalPolicy) -> Self {
        self.external = external;
        self
    }

    /// Creates the bus and registers its listeners on `transport`.
    pub fn build(self, transport: Arc<dyn Transport>) -> Bus {
        let inner = Arc::new(BusInner {
            name: self.name,
            target: RwLock::new(self.target),
            handlers: RwLock::new(self.handlers),
            error: Mutex::new(None),
            on_error: self.on_error,
            external: self.external,
            transport,
        });

        inner.transport.add_listener(Arc::new(BusListener {
            inner: Arc::downgrade(&inner),
        }));

        if inner.external.is_enabled() {
            inner.transport.add_external_listener(Arc::new(ExternalListener {
                inner: Arc::downgrade(&inner),
            }));
        }

        info!(
            bus = %inner.name,
            target = %inner.target.read().as_str(),
            on_error = ?inner.on_error,
            external = inner.external.is_enabled(),
            "Bus created"
        );

        Bus { inner }
    }
}
