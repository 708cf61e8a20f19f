//! Operation and variable matching logic.
//!
//! Extracts the routing identity from raw GraphQL documents and decides
//! whether a request's variables satisfy a mock's matching criteria.

use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Predicate deciding whether request variables satisfy a mock.
pub type VariablesPredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// How a mock record matches request variables.
#[derive(Clone, Default)]
pub enum VariablesMatch {
    /// Any variables satisfy the mock.
    #[default]
    Any,
    /// Structural comparison against a stored variables value.
    Object(Value),
    /// Delegates to a caller-supplied predicate.
    Predicate(VariablesPredicate),
}

impl fmt::Debug for VariablesMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariablesMatch::Any => write!(f, "Any"),
            VariablesMatch::Object(value) => f.debug_tuple("Object").field(value).finish(),
            VariablesMatch::Predicate(_) => write!(f, "Predicate(..)"),
        }
    }
}

fn operation_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:query|mutation|subscription)\s+([_A-Za-z][_0-9A-Za-z]*)")
            .expect("operation name pattern is valid")
    })
}

/// Extract the operation name from a raw GraphQL document.
///
/// Returns the identifier when the document begins with an operation
/// keyword followed by a name token. Anonymous operations and non-GraphQL
/// text yield `None`; the remainder of the document is not validated.
pub fn extract_operation_name(query: &str) -> Option<String> {
    operation_name_regex()
        .captures(query)
        .map(|captures| captures[1].to_string())
}

/// Decide whether request variables satisfy a matching mode.
///
/// For [`VariablesMatch::Object`], every key in `ignored_keys` is stripped
/// at the top level of both sides first. Object fields compare independent
/// of key order; array elements compare per index, so a reordered list is
/// a mismatch.
pub fn variables_match(
    mode: &VariablesMatch,
    ignored_keys: &HashSet<String>,
    request_variables: &Value,
) -> bool {
    match mode {
        VariablesMatch::Any => true,
        VariablesMatch::Predicate(matches) => matches(request_variables),
        VariablesMatch::Object(expected) => {
            strip_ignored_keys(request_variables, ignored_keys)
                == strip_ignored_keys(expected, ignored_keys)
        }
    }
}

/// Remove ignored top-level keys from a variables object.
pub(crate) fn strip_ignored_keys(value: &Value, ignored_keys: &HashSet<String>) -> Value {
    match value {
        Value::Object(map) if !ignored_keys.is_empty() => Value::Object(
            map.iter()
                .filter(|(key, _)| !ignored_keys.contains(key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}
