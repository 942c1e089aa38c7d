//! RPC error shape: `{code, message, retryable, details?}`.

use serde::Serialize;
use serde_json::Value;

use tk_domain::error::Error;

pub const ERROR_INVALID_REQUEST: &str = "INVALID_REQUEST";
pub const ERROR_NOT_FOUND: &str = "NOT_FOUND";
pub const ERROR_UNAVAILABLE: &str = "UNAVAILABLE";
pub const ERROR_INTERNAL: &str = "INTERNAL_ERROR";

#[derive(Debug, Clone, Serialize)]
pub struct RpcError {
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl RpcError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retryable: code == ERROR_UNAVAILABLE,
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ERROR_INVALID_REQUEST, message)
    }
}

impl From<Error> for RpcError {
    fn from(e: Error) -> Self {
        match e {
            Error::InvalidRequest(m) => Self::new(ERROR_INVALID_REQUEST, m),
            Error::NotFound(m) => Self::new(ERROR_NOT_FOUND, m),
            Error::Unavailable(m) | Error::Timeout(m) => Self::new(ERROR_UNAVAILABLE, m),
            other => {
                tracing::error!(error = %other, "rpc internal error");
                Self::new(ERROR_INTERNAL, other.to_string())
            }
        }
    }
}
