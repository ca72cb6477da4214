//! Request and response envelopes
//!
//! These are the only structures that cross the substrate. Both travel as
//! plain JSON values so that foreign listeners in the same context can
//! ignore them.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::BusError;

/// Target that every listening bus accepts.
pub const WILDCARD: &str = "*";

/// Source stamped on requests that arrived from outside the extension.
pub const EXTERNAL_SOURCE: &str = "external";

/// Outbound call envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Name of the sending bus
    pub source: String,
    /// Bus name, or [`WILDCARD`]
    pub target: String,
    /// Slash-delimited handler path
    pub path: String,
    #[serde(default)]
    pub data: Value,
}

impl Request {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        path: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            path: path.into(),
            data,
        }
    }

    /// Whether the request was addressed to every listening bus.
    pub fn is_broadcast(&self) -> bool {
        self.target == WILDCARD
    }

    /// Whether a bus named `name` should accept this request.
    pub fn addresses(&self, name: &str) -> bool {
        self.is_broadcast() || self.target == name
    }

    /// `target:path`, as used in diagnostics.
    pub fn qualified_path(&self) -> String {
        format!("{}:{}", self.target, self.path)
    }

    pub fn to_value(&self) -> Value {
        json!({
            "source": self.source,
            "target": self.target,
            "path": self.path,
            "data": self.data,
        })
    }

    /// Parses an inbound message. Anything that is not a request envelope
    /// yields `None` so the dispatcher can leave it alone.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        Request::deserialize(value).ok()
    }
}

/// Reply envelope produced by the dispatcher
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Name of the responding bus
    #[serde(default)]
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BusError>,
}

impl Response {
    pub fn success(target: impl Into<String>, result: Value) -> Self {
        Self {
            target: target.into(),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(target: impl Into<String>, error: BusError) -> Self {
        Self {
            target: target.into(),
            result: None,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn to_value(&self) -> Value {
        let mut value = json!({ "target": self.target });
        if let Some(result) = &self.result {
            value["result"] = result.clone();
        }
        if let Some(error) = &self.error {
            let mut err = json!({
                "code": error.code.as_str(),
                "message": error.message,
            });
            if let Some(kind) = &error.kind {
                err["type"] = Value::String(kind.clone());
            }
            value["error"] = err;
        }
        value
    }

    /// Lenient parse: a reply that is not a well-formed envelope reads as
    /// an empty one.
    pub fn from_value(value: &Value) -> Self {
        Response::deserialize(value).unwrap_or_default()
    }
}

/// Splits an optional `target:` prefix off a call path.
///
/// Without a prefix (or with an empty one) the default target is used.
pub fn split_target<'a>(path: &'a str, default_target: &'a str) -> (&'a str, &'a str) {
    match path.split_once(':') {
        Some((target, rest)) if !target.is_empty() => (target, rest),
        Some((_, rest)) => (default_target, rest),
        None => (default_target, path),
    }
}
