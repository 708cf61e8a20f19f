//! Dispatch error taxonomy.
//!
//! Every failure the engine can produce, and its serialization into the
//! GraphQL-shaped error body returned to the transport.

use crate::config::MockResponse;
use serde_json::{json, Value};
use thiserror::Error;

/// Transport status used for every protocol-level error.
///
/// Mirrors the GraphQL-over-HTTP convention of surfacing errors in the
/// response body: the mock's own declared status never leaks into the
/// transport framing of a failure.
pub const ERROR_STATUS: u16 = 500;

/// Failure produced while dispatching an intercepted request.
#[derive(Debug, Error)]
pub enum MockError {
    /// Payload could not be parsed, or carried no routable operation name.
    #[error("{0}")]
    MalformedRequest(String),

    /// No record is registered under the requested operation name.
    #[error("{0}")]
    NoMockFound(String),

    /// Records exist for the operation but none matches the variables.
    #[error("{0}")]
    VariablesMismatch(String),

    /// A matched record intentionally declares a failure status.
    #[error("Request for operation \"{operation}\" failed with status {status}, as declared by its mock")]
    DeclaredFailure {
        operation: String,
        status: u16,
        payload: Option<Value>,
    },

    /// A custom handler or response transform failed.
    #[error("Custom responder failed: {0}")]
    CustomResponder(anyhow::Error),
}

impl MockError {
    /// Serialize to the single entry placed in the response `errors` array.
    ///
    /// A declared failure with an error payload passes it through verbatim;
    /// everything else becomes a plain `{ "message": .. }` object, so no
    /// non-serializable detail survives the boundary.
    pub fn to_error_entry(&self) -> Value {
        match self {
            MockError::DeclaredFailure {
                payload: Some(payload),
                ..
            } => payload.clone(),
            other => json!({ "message": other.to_string() }),
        }
    }

    /// Convert into the transport response tuple.
    pub fn into_response(self) -> MockResponse {
        (ERROR_STATUS, json!({ "errors": [self.to_error_entry()] }))
    }
}
