//! Dispatch engine and public mocking handle.
//!
//! [`QueryMock`] is the registration surface test code declares mocks on,
//! and the handler the interception transport drives once per request.

use crate::config::{
    MockFixtureFile, MockResponse, QueryMockConfig, RequestContext, ResponseTransform,
};
use crate::diagnostics;
use crate::error::MockError;
use crate::gate::{MockResolver, ResolutionGate};
use crate::matcher::extract_operation_name;
use crate::registry::{CallRecord, LookupOutcome, MockRecord, RegistryState};
use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tracing::{debug, warn};

const INVALID_PAYLOAD_MESSAGE: &str =
    "Invalid request payload. Make sure the request actually carries a GraphQL JSON body";

const NO_OPERATION_NAME_MESSAGE: &str =
    "Could not find an operation name in the request query. Make sure the request actually carries the query text";

/// Raw request payload handed over by the transport.
#[derive(Debug, Clone)]
pub enum RequestPayload {
    /// Already-parsed JSON body.
    Structured(Value),
    /// Raw text body. The JSON payload is extracted from it: multipart
    /// envelopes wrap the body in surrounding annotations.
    Text(String),
}

/// One intercepted request.
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    /// Target URI of the intercepted call.
    pub uri: String,
    /// Raw request payload.
    pub payload: RequestPayload,
    /// Request headers, single-valued.
    pub headers: HashMap<String, String>,
}

/// Handler the interception transport drives.
#[async_trait]
pub trait TransportHandler {
    /// Resolve one intercepted request to a status/body pair.
    ///
    /// Resolves exactly once per request. Failures come back as an
    /// error-shaped body, never as a panic across the transport boundary.
    async fn on_request(&self, request: InterceptedRequest) -> MockResponse;
}

/// GraphQL mocking engine.
///
/// Cheap to clone; clones share the same registry and call log, so the
/// test side registering mocks and the transport side resolving requests
/// can each hold their own handle.
#[derive(Clone, Default)]
pub struct QueryMock {
    state: Arc<Mutex<RegistryState>>,
}

impl QueryMock {
    /// Create an empty mock registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mock described by `config`.
    ///
    /// # Panics
    ///
    /// Panics if `config.operation_name` is empty.
    pub fn mock_query(&self, config: QueryMockConfig) {
        self.register(config, None);
    }

    /// Register a mock whose response is held back until the returned
    /// resolver is invoked.
    pub fn mock_query_with_controlled_resolution(&self, config: QueryMockConfig) -> MockResolver {
        let gate = ResolutionGate::new();
        self.register(config, Some(gate.clone()));
        MockResolver::new(gate)
    }

    /// Register every fixture in a YAML document, in order.
    pub fn mock_from_yaml(&self, yaml: &str) -> anyhow::Result<()> {
        let file = MockFixtureFile::from_yaml(yaml)?;
        for fixture in file.mocks {
            self.mock_query(fixture.into_config());
        }
        Ok(())
    }

    /// Register every fixture from a YAML file, in order.
    pub fn mock_from_file(&self, path: &Path) -> anyhow::Result<()> {
        let file = MockFixtureFile::from_file(path)?;
        for fixture in file.mocks {
            self.mock_query(fixture.into_config());
        }
        Ok(())
    }

    /// Set the transform applied to responses whose record does not carry
    /// its own `change_server_response`.
    pub fn set_default_response_transform(&self, transform: ResponseTransform) {
        self.lock_state().default_transform = Some(transform);
    }

    /// Drop all registered mocks, the call log, and the default transform.
    ///
    /// Intended to run between independent test cases.
    pub fn reset(&self) {
        debug!("Mock registry reset");
        self.lock_state().reset();
    }

    /// Ordered log of every successfully dispatched call.
    pub fn calls(&self) -> Vec<CallRecord> {
        self.lock_state().calls.clone()
    }

    /// Number of successfully dispatched calls.
    pub fn call_count(&self) -> usize {
        self.lock_state().calls.len()
    }

    /// Resolve one intercepted request to a status/body pair.
    ///
    /// Every failure is converted into `(500, { "errors": [..] })`; the
    /// returned future always resolves with a response.
    pub async fn handle_request(&self, request: InterceptedRequest) -> MockResponse {
        debug!(uri = %request.uri, "Intercepted request");
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(error) => {
                warn!(error = %error, "Dispatch failed");
                error.into_response()
            }
        }
    }

    fn register(&self, config: QueryMockConfig, gate: Option<ResolutionGate>) {
        assert!(
            !config.operation_name.is_empty(),
            "mocked operation name must not be empty"
        );
        let record = MockRecord::from_config(config, gate);
        self.lock_state().register(record);
    }

    fn lock_state(&self) -> MutexGuard<'_, RegistryState> {
        self.state
            .lock()
            .expect("registry lock poisoned - a prior dispatch panicked")
    }

    async fn dispatch(&self, request: InterceptedRequest) -> Result<MockResponse, MockError> {
        let payload = parse_payload(request.payload)?;

        let query = payload
            .get("query")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let operation_name = extract_operation_name(query)
            .ok_or_else(|| MockError::MalformedRequest(NO_OPERATION_NAME_MESSAGE.to_string()))?;

        let variables = match payload.get("variables") {
            Some(value @ Value::Object(_)) => value.clone(),
            _ => json!({}),
        };

        let record = {
            let mut state = self.lock_state();
            match state.lookup(&operation_name, &variables) {
                LookupOutcome::NotFound => {
                    return Err(MockError::NoMockFound(diagnostics::no_mock_found_message(
                        &state,
                        &operation_name,
                        &variables,
                    )));
                }
                LookupOutcome::Mismatch(candidate) => {
                    // A declared failure on the first candidate wins over
                    // the mismatch diagnostic.
                    if candidate.status >= 400 {
                        return Err(declared_failure(&candidate));
                    }
                    return Err(MockError::VariablesMismatch(
                        diagnostics::variables_mismatch_message(
                            &candidate,
                            &operation_name,
                            &variables,
                        ),
                    ));
                }
                LookupOutcome::Matched(record) => record,
            }
        };

        debug!(operation = %operation_name, "Request matched mock");

        if record.status >= 400 {
            return Err(declared_failure(&record));
        }

        let base_response = json!({ "data": record.data.clone() });
        let transform = record
            .change_server_response
            .clone()
            .or_else(|| self.lock_state().default_transform.clone());
        let body = match transform {
            Some(transform) => {
                transform(&record, base_response).map_err(MockError::CustomResponder)?
            }
            None => base_response,
        };

        let mut response: MockResponse = (record.status, body);

        if let Some(handler) = record.custom_handler.clone() {
            let context = RequestContext {
                query: query.to_string(),
                operation_name: operation_name.clone(),
                variables: variables.clone(),
            };
            response = handler(context).await.map_err(MockError::CustomResponder)?;
        }

        self.lock_state().record_call(CallRecord {
            operation_name,
            variables,
            headers: request.headers,
            response: response.1.clone(),
            at: Utc::now(),
        });

        // Delivery is held back only after the call is logged, so tests
        // can observe that the request was accepted while it is pending.
        if let Some(gate) = &record.resolution_gate {
            gate.wait().await;
        }

        Ok(response)
    }
}

#[async_trait]
impl TransportHandler for QueryMock {
    async fn on_request(&self, request: InterceptedRequest) -> MockResponse {
        self.handle_request(request).await
    }
}

fn declared_failure(record: &MockRecord) -> MockError {
    MockError::DeclaredFailure {
        operation: record.operation_name.clone(),
        status: record.status,
        payload: record.error.clone(),
    }
}

fn embedded_json_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("embedded payload pattern is valid"))
}

/// Normalize the transport payload into a JSON object.
///
/// Text bodies contribute their first top-level brace-delimited substring.
fn parse_payload(payload: RequestPayload) -> Result<Value, MockError> {
    let malformed = || MockError::MalformedRequest(INVALID_PAYLOAD_MESSAGE.to_string());

    let value = match payload {
        RequestPayload::Structured(value) => value,
        RequestPayload::Text(text) => {
            let embedded = embedded_json_regex().find(&text).ok_or_else(malformed)?;
            serde_json::from_str(embedded.as_str()).map_err(|_| malformed())?
        }
    };

    if value.is_object() {
        Ok(value)
    } else {
        Err(malformed())
    }
}
