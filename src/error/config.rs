//! Sync settings errors.

use std::fmt;

/// Errors caused by missing or invalid sync settings.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Sync has not been enabled.
    SyncDisabled,

    /// The active backend is missing a required setting.
    MissingField { backend: String, field: String },

    /// A setting has an unusable value.
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::SyncDisabled => "Sync is disabled. Enable it in settings first.".to_string(),
            ConfigError::MissingField { backend, field } => {
                format!("The {} backend needs a value for '{}'.", backend, field)
            }
            ConfigError::InvalidValue { field, message } => {
                format!("The setting '{}' is invalid: {}", field, message)
            }
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            ConfigError::SyncDisabled => "E_CFG_DISABLED",
            ConfigError::MissingField { .. } => "E_CFG_MISSING",
            ConfigError::InvalidValue { .. } => "E_CFG_INVALID",
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::SyncDisabled => write!(f, "Sync is disabled"),
            ConfigError::MissingField { backend, field } => {
                write!(f, "{} backend is missing '{}'", backend, field)
            }
            ConfigError::InvalidValue { field, message } => {
                write!(f, "Invalid value for '{}': {}", field, message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
