//! Data integrity errors.
//!
//! Raised by the crypto layer and by payload parsing. A data error means
//! the bytes in hand cannot be trusted; callers abort the operation and
//! surface it as-is rather than discarding the remote copy.

use thiserror::Error;

/// Errors about the content of snapshots and encrypted packages.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DataError {
    /// The package failed structural validation before decryption.
    #[error("Invalid encrypted package: {reason}")]
    InvalidPackage { reason: String },

    /// AEAD tag verification failed: wrong password or tampered data.
    #[error("Authentication failed: wrong password or tampered data")]
    AuthenticationFailed,

    /// Decryption succeeded but the plaintext checksum does not match.
    #[error("Integrity check failed: checksum mismatch")]
    IntegrityCheckFailed,

    /// Serializing or parsing a snapshot failed.
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Encryption failed.
    #[error("Encryption failed: {message}")]
    Encryption { message: String },

    /// Backend returned a payload in an unexpected shape.
    #[error("Unexpected remote payload: {message}")]
    UnexpectedPayload { message: String },
}

impl DataError {
    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            DataError::InvalidPackage { reason } => {
                format!("The remote sync data is malformed ({}).", reason)
            }
            DataError::AuthenticationFailed => {
                "The remote sync data could not be decrypted. The master password may differ from the one used on your other device, or the data was modified.".to_string()
            }
            DataError::IntegrityCheckFailed => {
                "The remote sync data failed its integrity check and was not applied.".to_string()
            }
            DataError::Serialization { .. } => {
                "The configuration could not be read or written.".to_string()
            }
            DataError::Encryption { .. } => {
                "The configuration could not be encrypted.".to_string()
            }
            DataError::UnexpectedPayload { .. } => {
                "The sync backend returned data in an unexpected format.".to_string()
            }
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            DataError::InvalidPackage { .. } => "E_DATA_INVALID_PACKAGE",
            DataError::AuthenticationFailed => "E_DATA_AUTH_FAILED",
            DataError::IntegrityCheckFailed => "E_DATA_INTEGRITY",
            DataError::Serialization { .. } => "E_DATA_SERDE",
            DataError::Encryption { .. } => "E_DATA_ENCRYPT",
            DataError::UnexpectedPayload { .. } => "E_DATA_PAYLOAD",
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::Serialization {
            message: err.to_string(),
        }
    }
}
