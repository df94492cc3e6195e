//! Request error handling
//!
//! Every API call fails with one [`RequestError`]. The three kinds differ by
//! what came back: nothing (`Network`), a non-success status (`Http`), or a
//! success status with a body we could not use (`Parse`).

use serde_json::Value;
use thiserror::Error;

/// Message substituted when an error body is not JSON
pub const GENERIC_NETWORK_ERROR: &str = "Network error";

/// Errors that can occur during an API call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    /// No response was received
    #[error("Network error: {message}")]
    Network { message: String },

    /// The server answered with a non-success status
    #[error("Request failed with status {status}: {message}")]
    Http {
        status: u16,
        /// Error body, when it parsed as JSON
        payload: Option<Value>,
        /// Server-provided message, or the generic network error text
        message: String,
    },

    /// The response body was not valid JSON or lacked expected fields
    #[error("Invalid response from server: {details}")]
    Parse { status: Option<u16>, details: String },
}

impl RequestError {
    /// Build the error for a non-success response
    pub fn from_http(status: u16, payload: Option<Value>) -> Self {
        let message = payload
            .as_ref()
            .map(server_message)
            .unwrap_or_else(|| GENERIC_NETWORK_ERROR.to_string());
        RequestError::Http {
            status,
            payload,
            message,
        }
    }

    pub(crate) fn missing_data() -> Self {
        RequestError::Parse {
            status: None,
            details: "response has no data".to_string(),
        }
    }

    /// HTTP status, absent for network failures
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Network { .. } => None,
            RequestError::Http { status, .. } => Some(*status),
            RequestError::Parse { status, .. } => *status,
        }
    }

    /// Structured error body sent by the server
    pub fn payload(&self) -> Option<&Value> {
        match self {
            RequestError::Http { payload, .. } => payload.as_ref(),
            _ => None,
        }
    }

    /// The server rejected our credential
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

/// Pull a readable message out of an error body
fn server_message(payload: &Value) -> String {
    let field = payload
        .get("error")
        .filter(|v| !v.is_null())
        .or_else(|| payload.get("message").filter(|v| !v.is_null()));

    match field {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => payload.to_string(),
    }
}
