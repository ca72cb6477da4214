//! Entry point for calls from other extensions

use std::fmt;
use std::sync::{Arc, Weak};

use courier_config::ExternalAccess;
use courier_core::{Listener, Request, Responder, SenderInfo, Value, EXTERNAL_SOURCE};
use courier_observability::DispatchMetrics;
use tracing::{debug, warn};

use crate::bus::BusInner;
use crate::dispatcher::dispatch;

/// Path pattern: exact, prefix when it ends in `*`, or `*` for everything
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern(String);

impl PathPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    pub fn matches(&self, path: &str) -> bool {
        match self.0.strip_suffix('*') {
            Some(prefix) => path.starts_with(prefix),
            None => self.0 == path,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PathPattern {
    fn from(pattern: &str) -> Self {
        Self::new(pattern)
    }
}

impl From<String> for PathPattern {
    fn from(pattern: String) -> Self {
        Self(pattern)
    }
}

pub type ExternalPredicate = Arc<dyn Fn(&str, &SenderInfo) -> bool + Send + Sync>;

/// Which external calls a bus accepts
#[derive(Clone, Default)]
pub enum ExternalPolicy {
    #[default]
    Disabled,
    AllowAll,
    Paths(Vec<PathPattern>),
    Predicate(ExternalPredicate),
}

impl ExternalPolicy {
    pub fn paths<I, P>(patterns: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathPattern>,
    {
        Self::Paths(patterns.into_iter().map(Into::into).collect())
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&str, &SenderInfo) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }

    pub fn allows(&self, path: &str, sender: &SenderInfo) -> bool {
        match self {
            Self::Disabled => false,
            Self::AllowAll => true,
            Self::Paths(patterns) => patterns.iter().any(|p| p.matches(path)),
            Self::Predicate(f) => f(path, sender),
        }
    }
}

impl From<&ExternalAccess> for ExternalPolicy {
    fn from(access: &ExternalAccess) -> Self {
        match access {
            ExternalAccess::Enabled(true) => Self::AllowAll,
            ExternalAccess::Enabled(false) => Self::Disabled,
            ExternalAccess::Paths(paths) if paths.is_empty() => Self::Disabled,
            ExternalAccess::Paths(paths) => Self::paths(paths.iter().map(String::as_str)),
        }
    }
}

impl fmt::Debug for ExternalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("Disabled"),
            Self::AllowAll => f.write_str("AllowAll"),
            Self::Paths(patterns) => f.debug_tuple("Paths").field(patterns).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Listener registered for other extensions' messages.
///
/// Accepted requests are re-stamped with the `external` source and handed
/// to the same dispatch path as internal traffic.
pub(crate) struct ExternalListener {
    pub(crate) inner: Weak<BusInner>,
}

impl Listener for ExternalListener {
    fn on_message(&self, message: Value, sender: SenderInfo, responder: Responder) -> bool {
        let Some(inner) = self.inner.upgrade() else {
            return false;
        };
        let Some(mut request) = Request::from_value(&message) else {
            debug!(bus = %inner.name, "Ignoring non-request external message");
            return false;
        };

        if !inner.external.allows(&request.path, &sender) {
            warn!(
                bus = %inner.name,
                path = %request.path,
                extension = ?sender.extension_id,
                "External call rejected"
            );
            DispatchMetrics::record_external_rejected(&inner.name);
            return false;
        }

        request.source = EXTERNAL_SOURCE.to_string();
        dispatch(&inner.name, &inner.handlers, request, sender, responder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_patterns() {
        assert!(PathPattern::new("*").matches("anything/at/all"));
        assert!(PathPattern::new("public/*").matches("public/ping"));
        assert!(!PathPattern::new("public/*").matches("private/ping"));
        assert!(PathPattern::new("ping").matches("ping"));
        assert!(!PathPattern::new("ping").matches("ping/more"));
    }

    #[test]
    fn test_policy_allows() {
        let sender = SenderInfo::new().with_extension_id("other");

        assert!(!ExternalPolicy::Disabled.allows("ping", &sender));
        assert!(ExternalPolicy::AllowAll.allows("ping", &sender));

        let paths = ExternalPolicy::paths(["public/*", "version"]);
        assert!(paths.allows("public/ping", &sender));
        assert!(paths.allows("version", &sender));
        assert!(!paths.allows("admin/reset", &sender));

        let trusted = ExternalPolicy::predicate(|_path, sender| {
            sender.extension_id.as_deref() == Some("trusted")
        });
        assert!(!trusted.allows("ping", &sender));
        assert!(trusted.allows("ping", &SenderInfo::new().with_extension_id("trusted")));
    }

    #[test]
    fn test_from_file_access() {
        assert!(!ExternalPolicy::from(&ExternalAccess::Enabled(false)).is_enabled());
        assert!(matches!(
            ExternalPolicy::from(&ExternalAccess::Enabled(true)),
            ExternalPolicy::AllowAll
        ));
        assert!(!ExternalPolicy::from(&ExternalAccess::Paths(vec![])).is_enabled());

        let policy = ExternalPolicy::from(&ExternalAccess::Paths(vec!["public/*".to_string()]));
        assert!(policy.allows("public/x", &SenderInfo::new()));
        assert!(!policy.allows("x", &SenderInfo::new()));
    }
}
