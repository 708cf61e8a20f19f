//! GraphQL Query Mocking
//!
//! Resolves intercepted GraphQL-over-HTTP requests against a registry of
//! declared mock responses instead of a real server. Pure pattern matching
//! over request metadata: no schema, no resolvers, no HTTP of its own.
//!
//! # Features
//!
//! - **Operation Routing**: requests route by GraphQL operation name
//! - **Variable Matching**: structural equality, ignored keys, or custom predicates
//! - **Ordered Registration**: first matching mock wins; one-shot mocks consume in order
//! - **Response Shaping**: rewrite assembled responses or replace them entirely
//! - **Controlled Resolution**: hold a matched response until the test releases it
//! - **Call Log**: every dispatched call recorded for assertions
//! - **Failure Mocks**: declared error statuses with custom error payloads
//! - **YAML Fixtures**: data-only mocks loadable from fixture files
//!
//! # Example
//!
//! ```
//! use graphql_query_mock::{InterceptedRequest, QueryMock, QueryMockConfig, RequestPayload};
//! use serde_json::json;
//! use std::collections::HashMap;
//!
//! let mock = QueryMock::new();
//! mock.mock_query(QueryMockConfig {
//!     operation_name: "Viewer".to_string(),
//!     data: json!({ "viewer": { "id": "1" } }),
//!     ..QueryMockConfig::default()
//! });
//!
//! let (status, body) = tokio_test::block_on(mock.handle_request(InterceptedRequest {
//!     uri: "/graphql".to_string(),
//!     payload: RequestPayload::Structured(json!({
//!         "query": "query Viewer { viewer { id } }"
//!     })),
//!     headers: HashMap::new(),
//! }));
//!
//! assert_eq!(status, 200);
//! assert_eq!(body["data"]["viewer"]["id"], "1");
//! ```

pub mod config;
pub mod diagnostics;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod matcher;
pub mod registry;

pub use config::{
    CustomHandler, CustomHandlerFuture, MockFixture, MockFixtureFile, MockResponse,
    QueryMockConfig, RequestContext, ResponseTransform,
};
pub use dispatch::{InterceptedRequest, QueryMock, RequestPayload, TransportHandler};
pub use error::MockError;
pub use gate::{MockResolver, ResolutionGate};
pub use matcher::{extract_operation_name, VariablesMatch, VariablesPredicate};
pub use registry::{CallRecord, LookupOutcome, MockRecord, RegistryState};
