use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Raw error surfaced by the API collaborator: HTTP status plus whatever the
/// backend put in the response body.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("api error: status {status}")]
pub struct ApiError {
    pub status: u16,
    #[serde(default)]
    pub body: Value,
}

impl ApiError {
    pub fn new(status: u16, body: Value) -> Self {
        ApiError { status, body }
    }

    /// The raw shape carried in `meta.apiError` of FAILURE actions.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// User-facing error derived from the fixed message catalog. The `message`
/// never echoes the raw backend body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        ErrorInfo {
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(message: impl Into<String>, status: u16) -> Self {
        ErrorInfo {
            message: message.into(),
            status: Some(status),
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} ({})", self.message, status),
            None => write!(f, "{}", self.message),
        }
    }
}
