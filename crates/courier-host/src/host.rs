//! In-memory messaging substrate
//!
//! Keeps a registry of execution contexts and delivers messages between
//! them with the same rules a browser applies to extension messaging.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use courier_core::{Address, Listener, Reply, ReplyCallback, SenderInfo, TabId, TransportError, Value};
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::exchange::Exchange;
use crate::transport::MemoryTransport;

pub type ContextId = u64;

/// What kind of execution context a transport belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextKind {
    Background,
    Popup,
    /// An extension page such as options
    Page,
    ContentScript { tab_id: TabId, frame_id: i64 },
}

impl ContextKind {
    pub fn tab_id(&self) -> Option<TabId> {
        match self {
            Self::ContentScript { tab_id, .. } => Some(*tab_id),
            _ => None,
        }
    }
}

struct ContextEntry {
    extension_id: String,
    kind: ContextKind,
    url: Option<String>,
    listeners: Vec<Arc<dyn Listener>>,
    external_listeners: Vec<Arc<dyn Listener>>,
}

impl ContextEntry {
    fn sender_info(&self) -> SenderInfo {
        let mut sender = SenderInfo::new().with_extension_id(self.extension_id.clone());
        if let Some(url) = &self.url {
            sender = sender.with_url(url.clone());
        }
        if let ContextKind::ContentScript { tab_id, frame_id } = self.kind {
            sender = sender.with_tab(tab_id, frame_id);
        }
        sender
    }
}

#[derive(Default)]
pub(crate) struct HostInner {
    contexts: DashMap<ContextId, ContextEntry>,
    next_id: AtomicU64,
    active_tab: RwLock<Option<TabId>>,
}

/// Shared in-memory substrate.
///
/// Each registered context gets its own [`MemoryTransport`]; buses built on
/// those transports can call each other exactly as they would in a browser.
#[derive(Clone, Default)]
pub struct MemoryHost {
    inner: Arc<HostInner>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a context and returns its transport.
    pub fn connect(
        &self,
        extension_id: impl Into<String>,
        kind: ContextKind,
        url: Option<String>,
    ) -> Arc<MemoryTransport> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let extension_id = extension_id.into();

        debug!(context = id, extension = %extension_id, kind = ?kind, "Context connected");

        self.inner.contexts.insert(
            id,
            ContextEntry {
                extension_id,
                kind,
                url,
                listeners: Vec::new(),
                external_listeners: Vec::new(),
            },
        );

        Arc::new(MemoryTransport::new(id, Arc::clone(&self.inner)))
    }

    pub fn background(&self, extension_id: impl Into<String>) -> Arc<MemoryTransport> {
        self.connect(extension_id, ContextKind::Background, None)
    }

    pub fn popup(&self, extension_id: impl Into<String>) -> Arc<MemoryTransport> {
        self.connect(extension_id, ContextKind::Popup, None)
    }

    pub fn page(&self, extension_id: impl Into<String>, url: impl Into<String>) -> Arc<MemoryTransport> {
        self.connect(extension_id, ContextKind::Page, Some(url.into()))
    }

    /// Top-frame content script in `tab_id`.
    pub fn content_script(
        &self,
        extension_id: impl Into<String>,
        tab_id: TabId,
        url: impl Into<String>,
    ) -> Arc<MemoryTransport> {
        self.connect(
            extension_id,
            ContextKind::ContentScript { tab_id, frame_id: 0 },
            Some(url.into()),
        )
    }

    /// Removes a context; its listeners stop receiving messages.
    pub fn disconnect(&self, id: ContextId) -> bool {
        let removed = self.inner.contexts.remove(&id).is_some();
        if removed {
            debug!(context = id, "Context disconnected");
        }
        removed
    }

    pub fn set_active_tab(&self, tab_id: Option<TabId>) {
        *self.inner.active_tab.write() = tab_id;
    }

    pub fn active_tab(&self) -> Option<TabId> {
        self.inner.active_tab()
    }

    /// Drops every content script in `tab_id`. Returns how many went away.
    pub fn close_tab(&self, tab_id: TabId) -> usize {
        let before = self.inner.contexts.len();
        self.inner
            .contexts
            .retain(|_, entry| entry.kind.tab_id() != Some(tab_id));
        let removed = before - self.inner.contexts.len();

        {
            let mut active = self.inner.active_tab.write();
            if *active == Some(tab_id) {
                *active = None;
            }
        }

        info!(tab = tab_id, removed, "Tab closed");
        removed
    }

    pub fn context_count(&self) -> usize {
        self.inner.contexts.len()
    }
}

impl HostInner {
    pub(crate) fn active_tab(&self) -> Option<TabId> {
        *self.active_tab.read()
    }

    pub(crate) fn add_listener(&self, id: ContextId, listener: Arc<dyn Listener>, external: bool) {
        match self.contexts.get_mut(&id) {
            Some(mut entry) if external => entry.external_listeners.push(listener),
            Some(mut entry) => entry.listeners.push(listener),
            None => warn!(context = id, "Listener added to a disconnected context"),
        }
    }

    /// Picks the listeners `address` reaches from context `from`.
    fn recipients(&self, from: ContextId, address: &Address) -> Option<(SenderInfo, Vec<Arc<dyn Listener>>)> {
        let (extension_id, sender) = {
            let entry = self.contexts.get(&from)?;
            (entry.extension_id.clone(), entry.sender_info())
        };

        let mut listeners = Vec::new();
        for entry in self.contexts.iter() {
            if *entry.key() == from {
                continue;
            }
            let ctx = entry.value();
            match address {
                Address::Runtime => {
                    if ctx.extension_id == extension_id && ctx.kind.tab_id().is_none() {
                        listeners.extend(ctx.listeners.iter().cloned());
                    }
                }
                Address::Tab(tab_id) => {
                    if ctx.extension_id == extension_id && ctx.kind.tab_id() == Some(*tab_id) {
                        listeners.extend(ctx.listeners.iter().cloned());
                    }
                }
                Address::Extension(target) if *target == extension_id => {
                    if ctx.extension_id == extension_id && ctx.kind.tab_id().is_none() {
                        listeners.extend(ctx.listeners.iter().cloned());
                    }
                }
                Address::Extension(target) => {
                    if ctx.extension_id == *target {
                        listeners.extend(ctx.external_listeners.iter().cloned());
                    }
                }
            }
        }

        Some((sender, listeners))
    }

    pub(crate) fn send(&self, from: ContextId, address: Address, message: Value, callback: ReplyCallback) {
        let Some((sender, listeners)) = self.recipients(from, &address) else {
            callback(Reply::failed(TransportError::Other(
                "Extension context invalidated.".to_string(),
            )));
            return;
        };

        debug!(context = from, address = ?address, listeners = listeners.len(), "Delivering message");

        match Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    deliver(listeners, message, sender, callback);
                });
            }
            Err(_) => deliver(listeners, message, sender, callback),
        }
    }
}

/// Runs every listener once against a shared reply slot.
fn deliver(listeners: Vec<Arc<dyn Listener>>, message: Value, sender: SenderInfo, callback: ReplyCallback) {
    if listeners.is_empty() {
        callback(Reply::failed(TransportError::ReceivingEndMissing));
        return;
    }

    let exchange = Exchange::new(callback);
    let mut keep_open = false;

    for listener in listeners {
        let pending = listener.on_message(message.clone(), sender.clone(), exchange.responder());
        keep_open |= pending;
    }

    if !keep_open && !exchange.is_settled() {
        exchange.settle(Reply::failed(TransportError::PortClosed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::{Responder, Transport};
    use serde_json::json;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::oneshot;

    async fn send(transport: &MemoryTransport, address: Address, message: Value) -> Reply {
        let (tx, rx) = oneshot::channel();
        transport.send(
            address,
            message,
            Box::new(move |reply| {
                let _ = tx.send(reply);
            }),
        );
        rx.await.unwrap_or_else(|_| Reply::failed(TransportError::Other("dropped".into())))
    }

    fn echo(tag: &'static str) -> Arc<dyn Listener> {
        Arc::new(move |msg: Value, _sender: SenderInfo, responder: Responder| {
            responder.send_value(json!({ "from": tag, "msg": msg }));
            false
        })
    }

    #[tokio::test]
    async fn test_no_listener_is_receiving_end_missing() {
        let host = MemoryHost::new();
        let popup = host.popup("ext");
        let reply = send(&popup, Address::Runtime, json!(1)).await;
        assert_eq!(reply.last_error, Some(TransportError::ReceivingEndMissing));
    }

    #[tokio::test]
    async fn test_runtime_skips_sender_and_tabs() {
        let host = MemoryHost::new();
        let background = host.background("ext");
        let popup = host.popup("ext");
        let content = host.content_script("ext", 1, "https://example.com");

        popup.add_listener(echo("popup"));
        content.add_listener(echo("content"));
        background.add_listener(echo("background"));

        let reply = send(&popup, Address::Runtime, json!("hi")).await;
        assert_eq!(reply.response.unwrap()["from"], "background");
    }

    #[tokio::test]
    async fn test_tab_address() {
        let host = MemoryHost::new();
        let background = host.background("ext");
        let tab1 = host.content_script("ext", 1, "https://a.test");
        let tab2 = host.content_script("ext", 2, "https://b.test");
        tab1.add_listener(echo("tab1"));
        tab2.add_listener(echo("tab2"));

        let reply = send(&background, Address::Tab(2), json!(null)).await;
        assert_eq!(reply.response.unwrap()["from"], "tab2");

        let reply = send(&background, Address::Tab(3), json!(null)).await;
        assert_eq!(reply.last_error, Some(TransportError::ReceivingEndMissing));
    }

    #[tokio::test]
    async fn test_sender_info_for_content_script() {
        let host = MemoryHost::new();
        let background = host.background("ext");
        let content = host.content_script("ext", 9, "https://example.com/page");

        let seen = Arc::new(StdMutex::new(None));
        let sink = Arc::clone(&seen);
        background.add_listener(Arc::new(move |_msg: Value, sender: SenderInfo, responder: Responder| {
            *sink.lock().unwrap() = Some(sender);
            responder.send_value(Value::Null);
            false
        }));

        send(&content, Address::Runtime, Value::Null).await;
        let sender = seen.lock().unwrap().clone().unwrap();
        assert_eq!(sender.tab_id, Some(9));
        assert_eq!(sender.extension_id.as_deref(), Some("ext"));
        assert_eq!(sender.url.as_deref(), Some("https://example.com/page"));
    }

    #[tokio::test]
    async fn test_silent_listeners_close_port() {
        let host = MemoryHost::new();
        let background = host.background("ext");
        let popup = host.popup("ext");
        background.add_listener(Arc::new(|_m: Value, _s: SenderInfo, _r: Responder| false));

        let reply = send(&popup, Address::Runtime, Value::Null).await;
        assert_eq!(reply.last_error, Some(TransportError::PortClosed));
    }

    #[tokio::test]
    async fn test_first_responder_wins() {
        let host = MemoryHost::new();
        let popup = host.popup("ext");
        let background = host.background("ext");
        let page = host.page("ext", "chrome-extension://ext/options.html");
        background.add_listener(echo("background"));
        page.add_listener(echo("page"));

        let reply = send(&popup, Address::Runtime, Value::Null).await;
        let from = reply.response.unwrap()["from"].clone();
        assert!(from == "background" || from == "page");
    }

    #[tokio::test]
    async fn test_pending_listener_answers_later() {
        let host = MemoryHost::new();
        let popup = host.popup("ext");
        let background = host.background("ext");
        background.add_listener(Arc::new(|_m: Value, _s: SenderInfo, responder: Responder| {
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                responder.send_value(json!("late"));
            });
            true
        }));

        let reply = send(&popup, Address::Runtime, Value::Null).await;
        assert_eq!(reply.response, Some(json!("late")));
    }

    #[tokio::test]
    async fn test_external_delivery() {
        let host = MemoryHost::new();
        let caller = host.background("caller");
        let target = host.background("target");
        target.add_listener(echo("internal"));
        target.add_external_listener(echo("external"));

        let reply = send(&caller, Address::Extension("target".into()), Value::Null).await;
        assert_eq!(reply.response.unwrap()["from"], "external");

        let reply = send(&caller, Address::Extension("nobody".into()), Value::Null).await;
        assert_eq!(reply.last_error, Some(TransportError::ReceivingEndMissing));
    }

    #[tokio::test]
    async fn test_close_tab_and_active_tab() {
        let host = MemoryHost::new();
        let background = host.background("ext");
        let tab = host.content_script("ext", 5, "https://a.test");
        tab.add_listener(echo("tab"));

        host.set_active_tab(Some(5));
        assert_eq!(background.active_tab().await, Some(5));

        assert_eq!(host.close_tab(5), 1);
        assert_eq!(host.active_tab(), None);

        let reply = send(&background, Address::Tab(5), Value::Null).await;
        assert_eq!(reply.last_error, Some(TransportError::ReceivingEndMissing));
    }

    #[tokio::test]
    async fn test_disconnected_sender() {
        let host = MemoryHost::new();
        let popup = host.popup("ext");
        assert!(host.disconnect(popup.id()));
        assert!(!host.disconnect(popup.id()));

        let reply = send(&popup, Address::Runtime, Value::Null).await;
        assert!(matches!(reply.last_error, Some(TransportError::Other(_))));
    }

    #[test]
    fn test_delivery_without_runtime_is_inline() {
        let host = MemoryHost::new();
        let popup = host.popup("ext");
        let background = host.background("ext");
        background.add_listener(echo("background"));

        let seen = Arc::new(StdMutex::new(None));
        let sink = Arc::clone(&seen);
        popup.send(
            Address::Runtime,
            Value::Null,
            Box::new(move |reply| *sink.lock().unwrap() = Some(reply)),
        );

        let reply = seen.lock().unwrap().clone().unwrap();
        assert_eq!(reply.response.unwrap()["from"], "background");
    }
}
