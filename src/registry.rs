//! Mock record storage and lookup.
//!
//! Holds an ordered sequence of records per operation name. Lookup scans a
//! sequence in registration order and the first record whose variables
//! match wins; non-persistent records are consumed by the same scan.

use crate::config::{CustomHandler, QueryMockConfig, ResponseTransform};
use crate::gate::ResolutionGate;
use crate::matcher::{variables_match, VariablesMatch};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;

/// One registered mock, ready for matching.
#[derive(Clone)]
pub struct MockRecord {
    /// Operation name the record answers for.
    pub operation_name: String,
    /// Payload placed under the response `data` field.
    pub data: Value,
    /// How request variables are matched.
    pub match_mode: VariablesMatch,
    /// Top-level keys excluded from object comparison.
    pub ignored_variable_keys: HashSet<String>,
    /// Whether the record survives being matched once.
    pub persist: bool,
    /// Response status; `>= 400` declares an intentional failure.
    pub status: u16,
    /// Error body entry used verbatim when `status >= 400`.
    pub error: Option<Value>,
    /// Hook rewriting the assembled response before delivery.
    pub change_server_response: Option<ResponseTransform>,
    /// Hook replacing the status/body pair entirely.
    pub custom_handler: Option<CustomHandler>,
    /// Gate delaying delivery until externally completed.
    pub resolution_gate: Option<ResolutionGate>,
}

impl MockRecord {
    /// Build a record from a registration config, resolving the match mode.
    ///
    /// `match_on_variables = false`, or a config with neither a variables
    /// value nor a predicate, yields [`VariablesMatch::Any`]; otherwise a
    /// predicate wins over a variables value.
    pub(crate) fn from_config(config: QueryMockConfig, gate: Option<ResolutionGate>) -> Self {
        let match_mode = if !config.match_on_variables {
            VariablesMatch::Any
        } else if let Some(predicate) = config.match_variables {
            VariablesMatch::Predicate(predicate)
        } else if let Some(variables) = config.variables {
            VariablesMatch::Object(variables)
        } else {
            VariablesMatch::Any
        };

        Self {
            operation_name: config.operation_name,
            data: config.data,
            match_mode,
            ignored_variable_keys: config.ignored_variable_keys.into_iter().collect(),
            persist: config.persist,
            status: config.status,
            error: config.error,
            change_server_response: config.change_server_response,
            custom_handler: config.custom_handler,
            resolution_gate: gate,
        }
    }

    /// Whether the given request variables satisfy this record.
    pub fn matches(&self, request_variables: &Value) -> bool {
        variables_match(&self.match_mode, &self.ignored_variable_keys, request_variables)
    }
}

impl fmt::Debug for MockRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockRecord")
            .field("operation_name", &self.operation_name)
            .field("match_mode", &self.match_mode)
            .field("persist", &self.persist)
            .field("status", &self.status)
            .field("change_server_response", &self.change_server_response.is_some())
            .field("custom_handler", &self.custom_handler.is_some())
            .field("resolution_gate", &self.resolution_gate.is_some())
            .finish_non_exhaustive()
    }
}

/// Log entry for one successfully dispatched request.
#[derive(Debug, Clone, Serialize)]
pub struct CallRecord {
    /// Operation name the request was routed by.
    pub operation_name: String,
    /// Resolved request variables.
    pub variables: Value,
    /// Request headers as seen by the transport.
    pub headers: HashMap<String, String>,
    /// Response body that was delivered.
    pub response: Value,
    /// When the call was dispatched.
    pub at: DateTime<Utc>,
}

/// Result of scanning the registry for a request.
#[derive(Debug)]
pub enum LookupOutcome {
    /// First record in registration order whose variables matched.
    Matched(MockRecord),
    /// Records exist for the name but none matched. Carries a clone of the
    /// first candidate, which drives diagnostics and declared-failure
    /// precedence; nothing is consumed.
    Mismatch(MockRecord),
    /// No record at all under the name.
    NotFound,
}

/// Process-wide mock and call-log state.
#[derive(Default)]
pub struct RegistryState {
    pub(crate) queues: HashMap<String, Vec<MockRecord>>,
    pub(crate) calls: Vec<CallRecord>,
    pub(crate) default_transform: Option<ResponseTransform>,
}

impl RegistryState {
    /// Append a record to the sequence for its operation name.
    ///
    /// No de-duplication: identical registrations coexist as independent
    /// queue slots.
    pub fn register(&mut self, record: MockRecord) {
        debug!(operation = %record.operation_name, "Mock registered");
        self.queues
            .entry(record.operation_name.clone())
            .or_default()
            .push(record);
    }

    /// Find the first record matching the request.
    ///
    /// A matched record with `persist = false` is removed from its sequence
    /// as part of this scan; a sequence emptied that way is dropped so the
    /// operation name no longer counts as registered.
    pub fn lookup(&mut self, operation_name: &str, request_variables: &Value) -> LookupOutcome {
        let Some(queue) = self.queues.get_mut(operation_name) else {
            return LookupOutcome::NotFound;
        };
        if queue.is_empty() {
            self.queues.remove(operation_name);
            return LookupOutcome::NotFound;
        }

        let outcome = match queue.iter().position(|record| record.matches(request_variables)) {
            Some(index) => {
                let record = if queue[index].persist {
                    queue[index].clone()
                } else {
                    queue.remove(index)
                };
                LookupOutcome::Matched(record)
            }
            None => LookupOutcome::Mismatch(queue[0].clone()),
        };

        if queue.is_empty() {
            self.queues.remove(operation_name);
        }
        outcome
    }

    /// Append a call-log entry.
    pub fn record_call(&mut self, entry: CallRecord) {
        self.calls.push(entry);
    }

    /// Drop all mocks, the call log, and the default response transform.
    pub fn reset(&mut self) {
        self.queues.clear();
        self.calls.clear();
        self.default_transform = None;
    }

    /// Registered records sorted by operation name, keeping registration
    /// order within a name. Used for deterministic diagnostics.
    pub(crate) fn sorted_records(&self) -> Vec<&MockRecord> {
        let mut names: Vec<&String> = self.queues.keys().collect();
        names.sort();
        names
            .into_iter()
            .flat_map(|name| self.queues[name].iter())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(operation_name: &str, data: Value) -> MockRecord {
        MockRecord::from_config(
            QueryMockConfig {
                operation_name: operation_name.to_string(),
                data,
                ..QueryMockConfig::default()
            },
            None,
        )
    }

    fn record_with(config: QueryMockConfig) -> MockRecord {
        MockRecord::from_config(config, None)
    }

    #[test]
    fn test_match_mode_resolution() {
        let any = record_with(QueryMockConfig {
            operation_name: "Q".to_string(),
            data: json!({}),
            ..QueryMockConfig::default()
        });
        assert!(matches!(any.match_mode, VariablesMatch::Any));

        let object = record_with(QueryMockConfig {
            operation_name: "Q".to_string(),
            data: json!({}),
            variables: Some(json!({ "a": 1 })),
            ..QueryMockConfig::default()
        });
        assert!(matches!(object.match_mode, VariablesMatch::Object(_)));

        let bypassed = record_with(QueryMockConfig {
            operation_name: "Q".to_string(),
            data: json!({}),
            variables: Some(json!({ "a": 1 })),
            match_on_variables: false,
            ..QueryMockConfig::default()
        });
        assert!(matches!(bypassed.match_mode, VariablesMatch::Any));

        let predicate = record_with(QueryMockConfig {
            operation_name: "Q".to_string(),
            data: json!({}),
            variables: Some(json!({ "a": 1 })),
            match_variables: Some(std::sync::Arc::new(|_| true)),
            ..QueryMockConfig::default()
        });
        assert!(matches!(predicate.match_mode, VariablesMatch::Predicate(_)));
    }

    #[test]
    fn test_lookup_returns_first_match_in_registration_order() {
        let mut state = RegistryState::default();
        state.register(record("TestQuery", json!({ "first": true })));
        state.register(record("TestQuery", json!({ "second": true })));

        match state.lookup("TestQuery", &json!({})) {
            LookupOutcome::Matched(record) => assert_eq!(record.data, json!({ "first": true })),
            other => panic!("expected a match, got {:?}", other),
        }
    }

    #[test]
    fn test_lookup_selects_by_variables_regardless_of_order() {
        let mut state = RegistryState::default();
        state.register(record_with(QueryMockConfig {
            operation_name: "TestQuery".to_string(),
            data: json!({ "first": true }),
            variables: Some(json!({ "first": true })),
            ..QueryMockConfig::default()
        }));
        state.register(record_with(QueryMockConfig {
            operation_name: "TestQuery".to_string(),
            data: json!({ "second": true }),
            variables: Some(json!({ "second": true })),
            ..QueryMockConfig::default()
        }));

        match state.lookup("TestQuery", &json!({ "second": true })) {
            LookupOutcome::Matched(record) => assert_eq!(record.data, json!({ "second": true })),
            other => panic!("expected a match, got {:?}", other),
        }
        match state.lookup("TestQuery", &json!({ "first": true })) {
            LookupOutcome::Matched(record) => assert_eq!(record.data, json!({ "first": true })),
            other => panic!("expected a match, got {:?}", other),
        }
    }

    #[test]
    fn test_non_persistent_records_consume_in_order() {
        let mut state = RegistryState::default();
        for data in [json!({ "first": true }), json!({ "second": true })] {
            state.register(record_with(QueryMockConfig {
                operation_name: "TestQuery".to_string(),
                data,
                persist: false,
                ..QueryMockConfig::default()
            }));
        }

        match state.lookup("TestQuery", &json!({})) {
            LookupOutcome::Matched(record) => assert_eq!(record.data, json!({ "first": true })),
            other => panic!("expected a match, got {:?}", other),
        }
        match state.lookup("TestQuery", &json!({})) {
            LookupOutcome::Matched(record) => assert_eq!(record.data, json!({ "second": true })),
            other => panic!("expected a match, got {:?}", other),
        }
        assert!(matches!(
            state.lookup("TestQuery", &json!({})),
            LookupOutcome::NotFound
        ));
    }

    #[test]
    fn test_persistent_record_matches_repeatedly() {
        let mut state = RegistryState::default();
        state.register(record("TestQuery", json!({ "test": "data" })));

        for _ in 0..3 {
            assert!(matches!(
                state.lookup("TestQuery", &json!({})),
                LookupOutcome::Matched(_)
            ));
        }
    }

    #[test]
    fn test_mismatch_carries_first_candidate_and_consumes_nothing() {
        let mut state = RegistryState::default();
        state.register(record_with(QueryMockConfig {
            operation_name: "TestQuery".to_string(),
            data: json!({ "first": true }),
            variables: Some(json!({ "expected": 1 })),
            persist: false,
            ..QueryMockConfig::default()
        }));
        state.register(record_with(QueryMockConfig {
            operation_name: "TestQuery".to_string(),
            data: json!({ "second": true }),
            variables: Some(json!({ "expected": 2 })),
            ..QueryMockConfig::default()
        }));

        match state.lookup("TestQuery", &json!({ "expected": 3 })) {
            LookupOutcome::Mismatch(candidate) => {
                assert_eq!(candidate.data, json!({ "first": true }));
            }
            other => panic!("expected a mismatch, got {:?}", other),
        }
        assert_eq!(state.queues["TestQuery"].len(), 2);
    }

    #[test]
    fn test_unknown_operation_is_not_found() {
        let mut state = RegistryState::default();
        state.register(record("Known", json!({})));
        assert!(matches!(
            state.lookup("Unknown", &json!({})),
            LookupOutcome::NotFound
        ));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut state = RegistryState::default();
        state.register(record("TestQuery", json!({})));
        state.record_call(CallRecord {
            operation_name: "TestQuery".to_string(),
            variables: json!({}),
            headers: HashMap::new(),
            response: json!({ "data": {} }),
            at: Utc::now(),
        });
        state.default_transform = Some(std::sync::Arc::new(|_, response| Ok(response)));

        state.reset();
        assert!(state.queues.is_empty());
        assert!(state.calls.is_empty());
        assert!(state.default_transform.is_none());
    }

    #[test]
    fn test_sorted_records_are_deterministic() {
        let mut state = RegistryState::default();
        state.register(record("Zebra", json!({})));
        state.register(record("Alpha", json!({ "a": 1 })));
        state.register(record("Alpha", json!({ "a": 2 })));

        let names: Vec<&str> = state
            .sorted_records()
            .iter()
            .map(|record| record.operation_name.as_str())
            .collect();
        assert_eq!(names, vec!["Alpha", "Alpha", "Zebra"]);
    }
}
