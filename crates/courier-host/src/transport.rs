//! Per-context endpoint onto a [`MemoryHost`](crate::MemoryHost)

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use courier_core::{Address, Listener, ReplyCallback, TabId, Transport, Value};

use crate::host::{ContextId, HostInner};

/// The messaging primitives of one registered context
pub struct MemoryTransport {
    id: ContextId,
    host: Arc<HostInner>,
}

impl MemoryTransport {
    pub(crate) fn new(id: ContextId, host: Arc<HostInner>) -> Self {
        Self { id, host }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }
}

impl fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTransport").field("id", &self.id).finish()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn send(&self, address: Address, message: Value, callback: ReplyCallback) {
        self.host.send(self.id, address, message, callback);
    }

    async fn active_tab(&self) -> Option<TabId> {
        self.host.active_tab()
    }

    fn add_listener(&self, listener: Arc<dyn Listener>) {
        self.host.add_listener(self.id, listener, false);
    }

    fn add_external_listener(&self, listener: Arc<dyn Listener>) {
        self.host.add_listener(self.id, listener, true);
    }
}
