//! Handler registry
//!
//! Handlers live in a [`HandlerTree`] and are addressed by slash-delimited
//! paths.

pub mod handler;
pub mod tree;

pub use handler::{
    from_async, from_fn, Handler, HandlerContext, HandlerGroup, HandlerOutput, HandlerResult,
};
pub use tree::{HandlerNode, HandlerTree, Resolved, PATH_SEPARATOR};
