//! Failure diagnostics.
//!
//! Builds the human-readable messages attached to "no mock found" and
//! "variables mismatch" errors, so test authors can see what is registered
//! versus what was actually sent.

use crate::matcher::{strip_ignored_keys, VariablesMatch};
use crate::registry::{MockRecord, RegistryState};
use serde_json::Value;
use std::fmt::Write;

/// Message for a request whose operation name has no registered mock.
///
/// Enumerates every currently-registered mock, sorted by operation name so
/// the output is deterministic.
pub fn no_mock_found_message(
    state: &RegistryState,
    operation_name: &str,
    request_variables: &Value,
) -> String {
    let mut message = format!(
        "No mock registered for operation \"{}\".\n\nRequested variables:\n{}\n\nCurrently registered mocks:",
        operation_name,
        pretty(request_variables),
    );

    let records = state.sorted_records();
    if records.is_empty() {
        message.push_str("\n  (none)");
    } else {
        for record in records {
            let _ = write!(message, "\n  - {}", describe_record(record));
        }
    }
    message
}

fn describe_record(record: &MockRecord) -> String {
    match &record.match_mode {
        VariablesMatch::Any => format!("\"{}\" (any variables)", record.operation_name),
        VariablesMatch::Object(expected) => format!(
            "\"{}\" with variables {}",
            record.operation_name, expected
        ),
        VariablesMatch::Predicate(_) => format!(
            "\"{}\" with a custom variables matcher",
            record.operation_name
        ),
    }
}

/// Message for a request whose variables no registered record accepts.
///
/// `candidate` is the first record registered under the operation name:
/// object-matched candidates get a structural diff, predicate-matched ones
/// a fixed note that the custom function rejected the input.
pub fn variables_mismatch_message(
    candidate: &MockRecord,
    operation_name: &str,
    request_variables: &Value,
) -> String {
    match &candidate.match_mode {
        VariablesMatch::Predicate(_) => format!(
            "Variables do not match for operation \"{}\": the mock's custom match function rejected the request variables",
            operation_name
        ),
        VariablesMatch::Object(expected) => {
            let requested =
                strip_ignored_keys(request_variables, &candidate.ignored_variable_keys);
            let expected = strip_ignored_keys(expected, &candidate.ignored_variable_keys);
            let mut message = format!(
                "Variables do not match for operation \"{}\".\n\nRequested variables:\n{}\n\nExpected variables:\n{}",
                operation_name,
                pretty(&requested),
                pretty(&expected),
            );

            let differences = diff_top_level(&requested, &expected);
            if !differences.is_empty() {
                message.push_str("\n\nDifference:");
                for line in differences {
                    let _ = write!(message, "\n  - {}", line);
                }
            }
            message
        }
        VariablesMatch::Any => format!(
            "Variables do not match for operation \"{}\"",
            operation_name
        ),
    }
}

/// Per-top-level-key differences between two variables values.
fn diff_top_level(requested: &Value, expected: &Value) -> Vec<String> {
    match (requested, expected) {
        (Value::Object(requested), Value::Object(expected)) => {
            let mut keys: Vec<&String> = expected.keys().chain(requested.keys()).collect();
            keys.sort();
            keys.dedup();

            let mut lines = Vec::new();
            for key in keys {
                match (requested.get(key.as_str()), expected.get(key.as_str())) {
                    (Some(actual), Some(wanted)) if actual != wanted => {
                        lines.push(format!("{}: expected {}, got {}", key, wanted, actual));
                    }
                    (None, Some(wanted)) => {
                        lines.push(format!(
                            "{}: expected {}, missing from request",
                            key, wanted
                        ));
                    }
                    (Some(actual), None) => {
                        lines.push(format!("{}: not expected, got {}", key, actual));
                    }
                    _ => {}
                }
            }
            lines
        }
        _ if requested != expected => {
            vec![format!("expected {}, got {}", expected, requested)]
        }
        _ => Vec::new(),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
