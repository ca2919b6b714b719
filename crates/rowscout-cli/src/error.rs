//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// A subcommand needs a feature this binary was built without
    #[error("The {feature} feature is not enabled. Rebuild with --features {feature}")]
    FeatureDisabled {
        /// Cargo feature name
        feature: &'static str,
    },

    /// Ctrl-C during a workflow
    #[error("Interrupted")]
    Interrupted,

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON output error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A workflow ran but its report is a failure
    #[error("Workflow failed: {message}")]
    ReportFailed {
        /// Report message
        message: String,
    },

    /// rowscout library error
    #[error("rowscout error: {0}")]
    Scout(#[from] rowscout::ScoutError),
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a disabled-feature error
    #[must_use]
    pub const fn feature_disabled(feature: &'static str) -> Self {
        Self::FeatureDisabled { feature }
    }

    /// Create a failed-report error
    #[must_use]
    pub fn report_failed(message: impl Into<String>) -> Self {
        Self::ReportFailed {
            message: message.into(),
        }
    }

    /// Whether the failure was already printed as a report status line
    #[must_use]
    pub const fn is_reported(&self) -> bool {
        matches!(self, Self::ReportFailed { .. })
    }

    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let err = CliError::config("missing username");
        assert!(err.to_string().contains("Configuration"));
        assert!(err.to_string().contains("missing username"));
    }

    #[test]
    fn test_feature_disabled_names_feature() {
        let err = CliError::feature_disabled("browser");
        assert_eq!(
            err.to_string(),
            "The browser feature is not enabled. Rebuild with --features browser"
        );
    }

    #[test]
    fn test_invalid_argument_error() {
        let err = CliError::invalid_argument("bad mode");
        assert!(err.to_string().contains("Invalid argument"));
    }

    #[test]
    fn test_report_failed_is_reported() {
        let err = CliError::report_failed("login failed");
        assert_eq!(err.to_string(), "Workflow failed: login failed");
        assert!(err.is_reported());
        assert!(!CliError::Interrupted.is_reported());
    }

    #[test]
    fn test_scout_error_from() {
        let err: CliError = rowscout::ScoutError::driver("tab crashed").into();
        assert!(err.to_string().contains("tab crashed"));
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let cli_err: CliError = io_err.into();
        assert!(cli_err.to_string().contains("I/O"));
    }
}
