//! Mock registration configuration.
//!
//! Defines the explicit configuration accepted by the registration API and
//! the data-only fixture form loadable from YAML files.

use crate::matcher::VariablesPredicate;
use crate::registry::MockRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

/// Status/body pair handed back to the transport layer.
pub type MockResponse = (u16, Value);

/// Request details passed to a custom handler.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Raw query text from the request payload.
    pub query: String,
    /// Operation name the request was routed by.
    pub operation_name: String,
    /// Resolved request variables.
    pub variables: Value,
}

/// Hook rewriting the assembled response body before delivery.
///
/// Receives the matched record and the assembled `{ "data": .. }` body and
/// returns the body to deliver.
pub type ResponseTransform =
    Arc<dyn Fn(&MockRecord, Value) -> anyhow::Result<Value> + Send + Sync>;

/// Future returned by a [`CustomHandler`].
pub type CustomHandlerFuture = Pin<Box<dyn Future<Output = anyhow::Result<MockResponse>> + Send>>;

/// Hook that fully replaces the assembled status/body pair.
pub type CustomHandler = Arc<dyn Fn(RequestContext) -> CustomHandlerFuture + Send + Sync>;

/// Configuration for one mock registration.
///
/// Only `operation_name` and `data` are required; every other field has a
/// default, so configs are usually written with struct update syntax:
///
/// ```
/// use graphql_query_mock::QueryMockConfig;
/// use serde_json::json;
///
/// let config = QueryMockConfig {
///     operation_name: "Viewer".to_string(),
///     data: json!({ "viewer": { "id": "1" } }),
///     ..QueryMockConfig::default()
/// };
/// assert!(config.persist);
/// assert_eq!(config.status, 200);
/// ```
#[derive(Clone)]
pub struct QueryMockConfig {
    /// Operation name the mock answers for. Required, non-empty.
    pub operation_name: String,
    /// Payload placed under the response `data` field.
    pub data: Value,
    /// Expected variables for structural matching.
    pub variables: Option<Value>,
    /// Custom variables predicate. Wins over `variables` when both are set.
    pub match_variables: Option<VariablesPredicate>,
    /// Set to `false` to answer regardless of request variables.
    pub match_on_variables: bool,
    /// Top-level keys excluded from structural comparison.
    pub ignored_variable_keys: Vec<String>,
    /// Whether the mock survives being matched once.
    pub persist: bool,
    /// Response status; `>= 400` declares an intentional failure.
    pub status: u16,
    /// Error body entry used verbatim when `status >= 400`.
    pub error: Option<Value>,
    /// Hook rewriting the assembled response before delivery.
    pub change_server_response: Option<ResponseTransform>,
    /// Hook replacing the status/body pair entirely.
    pub custom_handler: Option<CustomHandler>,
}

impl Default for QueryMockConfig {
    fn default() -> Self {
        Self {
            operation_name: String::new(),
            data: Value::Null,
            variables: None,
            match_variables: None,
            match_on_variables: true,
            ignored_variable_keys: Vec::new(),
            persist: true,
            status: 200,
            error: None,
            change_server_response: None,
            custom_handler: None,
        }
    }
}

impl fmt::Debug for QueryMockConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryMockConfig")
            .field("operation_name", &self.operation_name)
            .field("data", &self.data)
            .field("variables", &self.variables)
            .field("match_variables", &self.match_variables.is_some())
            .field("match_on_variables", &self.match_on_variables)
            .field("ignored_variable_keys", &self.ignored_variable_keys)
            .field("persist", &self.persist)
            .field("status", &self.status)
            .field("error", &self.error)
            .field("change_server_response", &self.change_server_response.is_some())
            .field("custom_handler", &self.custom_handler.is_some())
            .finish()
    }
}

/// A file of declarative mock fixtures.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct MockFixtureFile {
    /// Mock definitions, registered in order.
    #[serde(default)]
    pub mocks: Vec<MockFixture>,
}

impl MockFixtureFile {
    /// Load fixtures from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse fixtures from a YAML string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let file: Self = serde_yaml::from_str(yaml)?;
        file.validate()?;
        Ok(file)
    }

    /// Validate every fixture.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (i, fixture) in self.mocks.iter().enumerate() {
            fixture
                .validate()
                .map_err(|e| anyhow::anyhow!("Mock {}: {}", i, e))?;
        }
        Ok(())
    }
}

/// The data-only subset of [`QueryMockConfig`], usable from fixture files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MockFixture {
    /// Operation name the mock answers for.
    pub operation_name: String,

    /// Payload placed under the response `data` field.
    pub data: Value,

    /// Expected variables for structural matching.
    #[serde(default)]
    pub variables: Option<Value>,

    /// Set to `false` to answer regardless of request variables.
    #[serde(default = "default_true")]
    pub match_on_variables: bool,

    /// Top-level keys excluded from structural comparison.
    #[serde(default)]
    pub ignored_variable_keys: Vec<String>,

    /// Whether the mock survives being matched once.
    #[serde(default = "default_true")]
    pub persist: bool,

    /// Response status; `>= 400` declares an intentional failure.
    #[serde(default = "default_status")]
    pub status: u16,

    /// Error body entry used verbatim when `status >= 400`.
    #[serde(default)]
    pub error: Option<Value>,
}

fn default_true() -> bool {
    true
}

fn default_status() -> u16 {
    200
}

impl MockFixture {
    /// Validate the fixture definition.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.operation_name.is_empty() {
            anyhow::bail!("operation_name cannot be empty");
        }
        if self.status < 100 || self.status > 599 {
            anyhow::bail!("Invalid status code: {}", self.status);
        }
        Ok(())
    }

    /// Expand into a full registration config.
    pub fn into_config(self) -> QueryMockConfig {
        QueryMockConfig {
            operation_name: self.operation_name,
            data: self.data,
            variables: self.variables,
            match_on_variables: self.match_on_variables,
            ignored_variable_keys: self.ignored_variable_keys,
            persist: self.persist,
            status: self.status,
            error: self.error,
            ..QueryMockConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_defaults() {
        let config = QueryMockConfig::default();
        assert!(config.match_on_variables);
        assert!(config.persist);
        assert_eq!(config.status, 200);
        assert!(config.variables.is_none());
        assert!(config.error.is_none());
    }

    #[test]
    fn test_parse_simple_fixture() {
        let yaml = r#"
mocks:
  - operation_name: Viewer
    data:
      viewer:
        id: "1"
"#;
        let file = MockFixtureFile::from_yaml(yaml).unwrap();
        assert_eq!(file.mocks.len(), 1);
        assert_eq!(file.mocks[0].operation_name, "Viewer");
        assert!(file.mocks[0].persist);
        assert!(file.mocks[0].match_on_variables);
        assert_eq!(file.mocks[0].status, 200);
    }

    #[test]
    fn test_parse_fixture_with_variables_and_error() {
        let yaml = r#"
mocks:
  - operation_name: UpdateUser
    data: {}
    variables:
      id: "42"
    ignored_variable_keys: [requestId]
    persist: false
    status: 400
    error:
      message: "update rejected"
"#;
        let file = MockFixtureFile::from_yaml(yaml).unwrap();
        let fixture = &file.mocks[0];
        assert_eq!(fixture.variables, Some(json!({ "id": "42" })));
        assert_eq!(fixture.ignored_variable_keys, vec!["requestId".to_string()]);
        assert!(!fixture.persist);
        assert_eq!(fixture.status, 400);
        assert_eq!(fixture.error, Some(json!({ "message": "update rejected" })));
    }

    #[test]
    fn test_fixture_rejects_unknown_fields() {
        let yaml = r#"
mocks:
  - operation_name: Viewer
    data: {}
    custom_handler: nope
"#;
        assert!(MockFixtureFile::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_fixture_rejects_empty_operation_name() {
        let yaml = r#"
mocks:
  - operation_name: ""
    data: {}
"#;
        assert!(MockFixtureFile::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_fixture_rejects_invalid_status() {
        let yaml = r#"
mocks:
  - operation_name: Viewer
    data: {}
    status: 99
"#;
        assert!(MockFixtureFile::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_fixture_into_config_keeps_fields() {
        let fixture = MockFixture {
            operation_name: "Viewer".to_string(),
            data: json!({ "viewer": null }),
            variables: Some(json!({ "id": 1 })),
            match_on_variables: false,
            ignored_variable_keys: vec!["nonce".to_string()],
            persist: false,
            status: 201,
            error: None,
        };

        let config = fixture.into_config();
        assert_eq!(config.operation_name, "Viewer");
        assert_eq!(config.variables, Some(json!({ "id": 1 })));
        assert!(!config.match_on_variables);
        assert!(!config.persist);
        assert_eq!(config.status, 201);
        assert!(config.match_variables.is_none());
        assert!(config.custom_handler.is_none());
    }
}
