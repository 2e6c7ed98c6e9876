//! Normalized API failures.
//!
//! ERROR HANDLING
//! ==============
//! Every failure an HTTP call can produce maps to exactly one [`ApiError`]
//! variant by status. Views show [`ApiError::user_message`]; code branches on
//! the variant.

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;

use super::transport::TransportError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("request rejected with status {status}")]
    Validation { status: u16, message: Option<String>, fields: BTreeMap<String, String> },
    #[error("authentication required")]
    Authentication { message: Option<String> },
    #[error("forbidden")]
    Authorization { message: Option<String> },
    #[error("server error {status}")]
    Server { status: u16, message: Option<String> },
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Classify a non-2xx response.
    #[must_use]
    pub fn from_status(status: u16, body: Option<&Value>) -> Self {
        let message = body.and_then(server_message);
        match status {
            401 => Self::Authentication { message },
            403 => Self::Authorization { message },
            408 => Self::Timeout(Duration::ZERO),
            500..=599 => Self::Server { status, message },
            _ => Self::Validation { status, message, fields: body.map(field_errors).unwrap_or_default() },
        }
    }

    #[must_use]
    pub fn from_transport(error: TransportError, timeout: Duration) -> Self {
        match error {
            TransportError::TimedOut => Self::Timeout(timeout),
            TransportError::Connect(e) | TransportError::Build(e) | TransportError::Other(e) => Self::Network(e),
        }
    }

    /// HTTP status this error stands for. `0` for network failures.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::Network(_) | Self::Decode(_) => 0,
            Self::Timeout(_) => 408,
            Self::Validation { status, .. } | Self::Server { status, .. } => *status,
            Self::Authentication { .. } => 401,
            Self::Authorization { .. } => 403,
        }
    }

    /// Message suitable for `Session.error`.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => "Network error, check your connection".to_owned(),
            Self::Timeout(_) => "The request timed out, please try again".to_owned(),
            Self::Authentication { .. } => "Your session has expired, please sign in again".to_owned(),
            Self::Authorization { .. } => "You are not allowed to perform this action".to_owned(),
            Self::Server { .. } => "Server error, please try again later".to_owned(),
            Self::Decode(_) => "An unexpected error occurred".to_owned(),
            Self::Validation { status, message, .. } => match status {
                400 => message.clone().unwrap_or_else(|| "Invalid request".to_owned()),
                404 => "The requested content was not found".to_owned(),
                429 => "Too many requests, please wait a moment".to_owned(),
                _ => message.clone().unwrap_or_else(|| "An unexpected error occurred".to_owned()),
            },
        }
    }

    /// Field-level messages for form display. Empty unless the server sent them.
    #[must_use]
    pub fn field_errors(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Self::Validation { fields, .. } if !fields.is_empty() => Some(fields),
            _ => None,
        }
    }
}

fn server_message(body: &Value) -> Option<String> {
    let text = |v: &Value| v.as_str().filter(|s| !s.trim().is_empty()).map(str::to_owned);
    body.get("message")
        .and_then(text)
        .or_else(|| body.get("error").and_then(text))
        .or_else(|| body.get("error").and_then(|e| e.get("message")).and_then(text))
}

fn field_errors(body: &Value) -> BTreeMap<String, String> {
    let Some(errors) = body.get("errors").and_then(Value::as_object) else {
        return BTreeMap::new();
    };
    errors
        .iter()
        .filter_map(|(field, value)| {
            let message = match value {
                Value::String(s) => s.clone(),
                Value::Array(items) => items.iter().find_map(Value::as_str)?.to_owned(),
                _ => return None,
            };
            Some((field.clone(), message))
        })
        .collect()
}
