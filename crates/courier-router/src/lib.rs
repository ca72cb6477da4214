//! Courier router
//!
//! A named [`Bus`] serves a tree of handlers to other contexts and calls
//! theirs by path:
//!
//! ```ignore
//! let bus = Bus::builder("popup")
//!     .target("background")
//!     .handler("ping", from_fn(|_data, _ctx| Ok::<_, HandlerError>("pong")))
//!     .build(transport);
//!
//! let tabs = bus.call("tabs/list", Value::Null).await?;
//! let title = bus.call_tab(TabTarget::Active, "page/title", Value::Null).await?;
//! ```

pub mod bus;
pub mod correlator;
mod dispatcher;
pub mod external;
pub mod handlers;
pub mod policy;

pub use bus::{Bus, BusBuilder};
pub use correlator::TabTarget;
pub use external::{ExternalPolicy, ExternalPredicate, PathPattern};
pub use handlers::{
    from_async, from_fn, Handler, HandlerContext, HandlerGroup, HandlerNode, HandlerOutput,
    HandlerResult, HandlerTree,
};
pub use policy::{CustomResolver, OnError};

pub use courier_core::{BusError, BusErrorCode, HandlerError, Request, Response, Result, Value};
