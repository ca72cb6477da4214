//! Observability error type

/// Observability error type
#[derive(Debug, thiserror::Error, Clone)]
pub enum ObservabilityError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Logging error: {message}")]
    Logging { message: String },

    #[error("Metrics error: {message}")]
    Metrics { message: String },

    /// The global subscriber or recorder was already installed
    #[error("Initialization error: {message}")]
    Init { message: String },
}

impl ObservabilityError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }

    pub fn metrics(message: impl Into<String>) -> Self {
        Self::Metrics {
            message: message.into(),
        }
    }

    pub fn init(message: impl Into<String>) -> Self {
        Self::Init {
            message: message.into(),
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Logging { .. } => "logging",
            Self::Metrics { .. } => "metrics",
            Self::Init { .. } => "init",
        }
    }
}

pub type Result<T> = std::result::Result<T, ObservabilityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ObservabilityError::logging("bad directive");
        assert!(matches!(err, ObservabilityError::Logging { .. }));
        assert_eq!(err.category(), "logging");
        assert_eq!(err.to_string(), "Logging error: bad directive");
    }
}
