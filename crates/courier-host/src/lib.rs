//! In-memory host for courier buses
//!
//! Reproduces the delivery rules of browser extension messaging without a
//! browser: runtime and tab addressing, cross-extension delivery, the
//! first-responder race and the two "nobody answered" failures.

mod exchange;
pub mod host;
pub mod transport;

pub use host::{ContextId, ContextKind, MemoryHost};
pub use transport::MemoryTransport;
