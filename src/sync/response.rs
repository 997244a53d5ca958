//! Uniform `{success, data?, error?}` envelope for UI-facing callers.

use serde::Serialize;

use crate::error::{SyncError, SyncResult};

/// Serializable description of a failed call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub code: String,
    pub category: String,
    pub message: String,
    pub recovery_hint: String,
    pub requires_reauth: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
}

impl From<&SyncError> for ErrorPayload {
    fn from(err: &SyncError) -> Self {
        let context = err.context();
        Self {
            code: err.error_code().to_string(),
            category: err.category().to_string(),
            message: err.inner().user_message(),
            recovery_hint: err.recovery_hint().to_string(),
            requires_reauth: err.requires_reauth(),
            operation: context.map(|c| c.operation.clone()),
            backend: context.and_then(|c| c.backend.clone()),
        }
    }
}

/// Result envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

impl<T> SyncResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: &SyncError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn from_result(result: SyncResult<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::err(&e),
        }
    }
}

impl<T> From<SyncResult<T>> for SyncResponse<T> {
    fn from(result: SyncResult<T>) -> Self {
        Self::from_result(result)
    }
}
