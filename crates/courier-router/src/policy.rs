//! Caller-side error policy

use std::fmt;
use std::sync::Arc;

use courier_config::ErrorPolicy;
use courier_core::{Request, Response, Value};

use crate::bus::Bus;

/// Resolver invoked in place of a failed call's result
pub type CustomResolver = Arc<dyn Fn(&Request, Option<&Response>, &Bus) -> Value + Send + Sync>;

/// What a failed call turns into for the caller
#[derive(Clone, Default)]
pub enum OnError {
    /// Log a warning (except for `no_response`) and resolve to `Null`
    #[default]
    Warn,
    /// Resolve to `Null` without logging
    Silent,
    /// Return the error
    Reject,
    /// Resolve to whatever the function returns
    Custom(CustomResolver),
}

impl OnError {
    /// Wraps a closure as a [`OnError::Custom`] policy.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Request, Option<&Response>, &Bus) -> Value + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Warn => "warn",
            Self::Silent => "silent",
            Self::Reject => "reject",
            Self::Custom(_) => "custom",
        }
    }
}

impl From<ErrorPolicy> for OnError {
    fn from(policy: ErrorPolicy) -> Self {
        match policy {
            ErrorPolicy::Warn => Self::Warn,
            ErrorPolicy::Silent => Self::Silent,
            ErrorPolicy::Reject => Self::Reject,
        }
    }
}

impl fmt::Debug for OnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_file_policy() {
        assert!(matches!(OnError::from(ErrorPolicy::Warn), OnError::Warn));
        assert!(matches!(OnError::from(ErrorPolicy::Silent), OnError::Silent));
        assert!(matches!(OnError::from(ErrorPolicy::Reject), OnError::Reject));
    }

    #[test]
    fn test_custom_debug() {
        let policy = OnError::custom(|_req, _res, _bus| Value::Null);
        assert_eq!(format!("{:?}", policy), "custom");
        assert_eq!(format!("{:?}", OnError::default()), "warn");
    }
}
