//! Handler shape
//!
//! A handler takes the request payload and a [`HandlerContext`] and either
//! answers right away or hands back a future. The dispatcher only needs to
//! know which, so it can tell the substrate to keep the channel open.

use courier_core::{HandlerError, SenderInfo, Value};
use futures_util::future::BoxFuture;
use serde::Serialize;
use std::fmt;
use std::future::Future;

use super::tree::{HandlerTree, Resolved};

pub type HandlerResult = Result<Value, HandlerError>;

/// What a handler produced
pub enum HandlerOutput {
    /// Finished synchronously
    Ready(HandlerResult),
    /// Settles later
    Deferred(BoxFuture<'static, HandlerResult>),
}

impl HandlerOutput {
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Ready(Ok(value.into()))
    }

    pub fn error(error: impl Into<HandlerError>) -> Self {
        Self::Ready(Err(error.into()))
    }

    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::Deferred(Box::pin(future))
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }

    /// Awaits the outcome regardless of which branch produced it.
    pub async fn resolve(self) -> HandlerResult {
        match self {
            Self::Ready(result) => result,
            Self::Deferred(future) => future.await,
        }
    }
}

impl fmt::Debug for HandlerOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// Named callable in a handler tree
pub trait Handler: Send + Sync {
    fn call(&self, data: Value, ctx: HandlerContext) -> HandlerOutput;
}

impl<F> Handler for F
where
    F: Fn(Value, HandlerContext) -> HandlerOutput + Send + Sync,
{
    fn call(&self, data: Value, ctx: HandlerContext) -> HandlerOutput {
        (self)(data, ctx)
    }
}

/// Adapts a synchronous closure.
pub fn from_fn<F, T, E>(f: F) -> impl Handler
where
    F: Fn(Value, &HandlerContext) -> Result<T, E> + Send + Sync + 'static,
    T: Serialize + 'static,
    E: Into<HandlerError> + 'static,
{
    move |data: Value, ctx: HandlerContext| {
        let result = f(data, &ctx)
            .map_err(Into::into)
            .and_then(|value| serde_json::to_value(value).map_err(HandlerError::from));
        HandlerOutput::Ready(result)
    }
}

/// Adapts a closure returning a future.
pub fn from_async<F, Fut, T, E>(f: F) -> impl Handler
where
    F: Fn(Value, HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Serialize + 'static,
    E: Into<HandlerError> + 'static,
{
    move |data: Value, ctx: HandlerContext| {
        let future = f(data, ctx);
        HandlerOutput::deferred(async move {
            let value = future.await.map_err(Into::<HandlerError>::into)?;
            serde_json::to_value(value).map_err(HandlerError::from)
        })
    }
}

/// The tree a resolved handler lives in.
///
/// Lets a handler reach its siblings explicitly instead of through an
/// ambient receiver.
#[derive(Clone, Default)]
pub struct HandlerGroup {
    tree: HandlerTree,
}

impl HandlerGroup {
    pub fn new(tree: HandlerTree) -> Self {
        Self { tree }
    }

    /// Resolves a path relative to this group.
    pub fn resolve(&self, path: &str) -> Option<Resolved> {
        self.tree.resolve(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.resolve(path).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.tree.names().map(str::to_string).collect()
    }

    #[cfg(test)]
    pub(crate) fn tree(&self) -> &HandlerTree {
        &self.tree
    }
}

impl fmt::Debug for HandlerGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerGroup")
            .field("names", &self.names())
            .finish()
    }
}

/// Per-invocation context handed to a handler
#[derive(Debug, Clone)]
pub struct HandlerContext {
    sender: SenderInfo,
    source: String,
    path: String,
    group: HandlerGroup,
}

impl HandlerContext {
    pub fn new(
        sender: SenderInfo,
        source: impl Into<String>,
        path: impl Into<String>,
        group: HandlerGroup,
    ) -> Self {
        Self {
            sender,
            source: source.into(),
            path: path.into(),
            group,
        }
    }

    /// Substrate-level information about the caller
    pub fn sender(&self) -> &SenderInfo {
        &self.sender
    }

    /// Name of the calling bus, or `external`
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Path this handler was resolved from
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn group(&self) -> &HandlerGroup {
        &self.group
    }

    /// Invokes a handler in the same group, passing this caller's identity
    /// along. A missing sibling fails with kind `not_found`.
    pub fn call_sibling(&self, path: &str, data: Value) -> HandlerOutput {
        match self.group.resolve(path) {
            Some(resolved) => {
                let ctx = HandlerContext {
                    sender: self.sender.clone(),
                    source: self.source.clone(),
                    path: path.to_string(),
                    group: resolved.group,
                };
                resolved.handler.call(data, ctx)
            }
            None => HandlerOutput::error(
                HandlerError::new(format!("No sibling handler at '{}'", path)).with_kind("not_found"),
            ),
        }
    }
}
