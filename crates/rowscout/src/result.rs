//! Result and error types for rowscout.

use thiserror::Error;

/// Result type for rowscout operations
pub type ScoutResult<T> = Result<T, ScoutError>;

/// Configuration errors. Always fatal: surfaced before a session starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("Configuration file {path} could not be read: {message}")]
    MissingFile {
        /// Path that was requested
        path: String,
        /// Error message
        message: String,
    },

    /// Configuration document is not valid YAML or does not match the schema
    #[error("Malformed configuration: {message}")]
    Malformed {
        /// Error message
        message: String,
    },

    /// Requested client key is not present in the document
    #[error("Client '{client}' not found in configuration")]
    MissingClient {
        /// Client name
        client: String,
    },

    /// A session placeholder survived substitution
    #[error("Unresolved placeholder {token} at {path}")]
    UnresolvedToken {
        /// Placeholder text, e.g. `TABLE_ID`
        token: String,
        /// Dotted path of the offending leaf
        path: String,
    },

    /// A field name has no attribute mapping
    #[error("Field '{field}' has no entry in field_attributes")]
    UnknownField {
        /// Display name of the field
        field: String,
    },

    /// A value failed validation after loading
    #[error("Invalid configuration value at {path}: {message}")]
    Invalid {
        /// Dotted path of the offending value
        path: String,
        /// Error message
        message: String,
    },
}

/// Errors that can occur while driving the target system
#[derive(Debug, Error)]
pub enum ScoutError {
    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A wait condition was not met before its deadline
    #[error("Timed out after {ms}ms waiting for {condition}")]
    Timeout {
        /// Description of the condition
        condition: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// A one-shot lookup found nothing
    #[error("Element not found: {locator}")]
    ElementNotFound {
        /// Locator description
        locator: String,
    },

    /// A handle was used after the page re-rendered
    #[error("Stale element handle: {handle}")]
    StaleElement {
        /// Handle id
        handle: String,
    },

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Driver-level failure (CDP error, script error, closed session)
    #[error("Driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// The remote UI returned content that could not be interpreted
    #[error("Unexpected content in {what}: {content:?}")]
    UnexpectedContent {
        /// What was being read
        what: String,
        /// Raw content
        content: String,
    },

    /// A step of a mutating action failed
    #[error("{stage} failed: {source}")]
    Action {
        /// Stage that failed
        stage: crate::actions::ActionStage,
        /// Underlying error
        #[source]
        source: Box<ScoutError>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScoutError {
    /// Create a driver error
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Whether this error is a wait timeout
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether this error is a failed one-shot lookup
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::ElementNotFound { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = ScoutError::Timeout {
            condition: "visibility of css:.rows".to_string(),
            ms: 250,
        };
        assert_eq!(
            err.to_string(),
            "Timed out after 250ms waiting for visibility of css:.rows"
        );
        assert!(err.is_timeout());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_config_error_is_transparent() {
        let err: ScoutError = ConfigError::MissingClient {
            client: "acme".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Client 'acme' not found in configuration");
    }

    #[test]
    fn test_action_error_names_stage() {
        let err = ScoutError::Action {
            stage: crate::actions::ActionStage::Apply,
            source: Box::new(ScoutError::driver("upload rejected")),
        };
        assert!(err.to_string().starts_with("APPLY failed"));
        assert!(err.to_string().contains("upload rejected"));
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ScoutError = io_err.into();
        assert!(err.to_string().contains("I/O"));
    }
}
