use thiserror::Error;

/// Main error type for the beatscape library
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Insufficient signal: {reason}")]
    InsufficientSignal { reason: String },

    #[error("Numeric instability in {context}: {details}")]
    NumericInstability { context: String, details: String },

    #[error("Analyzer failure in {stage}: {reason}")]
    Internal { stage: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Failed to write configuration file: {path}")]
    WriteFailed { path: String },
}

/// Convenience type alias for Results using AnalysisError
pub type Result<T> = std::result::Result<T, AnalysisError>;

impl AnalysisError {
    /// Create an internal error for a named pipeline stage
    pub fn internal<S: Into<String>, R: Into<String>>(stage: S, reason: R) -> Self {
        Self::Internal {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// True when the caller should still receive a degraded best-effort result
    /// instead of a hard failure.
    pub fn is_degradable(&self) -> bool {
        match self {
            Self::InsufficientSignal { .. } => true,
            Self::NumericInstability { .. } => true,
            Self::Internal { .. } => true,
            Self::Config(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_are_not_degradable() {
        let err = AnalysisError::from(ConfigError::InvalidValue {
            key: "window_size".to_string(),
            value: "0".to_string(),
        });
        assert!(!err.is_degradable());
    }

    #[test]
    fn test_analyzer_errors_are_degradable() {
        let err = AnalysisError::internal("tempo", "empty onset envelope");
        assert!(err.is_degradable());
        let err = AnalysisError::InsufficientSignal {
            reason: "near-silent input".to_string(),
        };
        assert!(err.is_degradable());
    }
}
