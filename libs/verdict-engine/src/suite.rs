/// Test Suite Parser - Loose Requirements to Typed Suite
///
/// Challenge requirements are stored as free-form JSON. This module pulls a
/// `TestSuite` out of them and never fails the caller: anything it cannot
/// interpret yields an empty suite for the challenge (which grades to a score
/// of 0) and a warning in the log.
///
/// Recognized keys:
/// - `testCases`: array of objects; per-case keys `id`, `name`,
///   `description`, `input`, `expectedOutput`, `isHidden`/`hidden`, `order`,
///   `metadata`. Missing keys default to null/false/0.
/// - `timeout`: seconds, folded into the suite constraints
/// - `setupCode`, `teardownCode`: snippets placed around the submission

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use verdict_common::testing::{
    TestCase, TestConstraints, TestSuite, DEFAULT_TEST_CPU_CORES, DEFAULT_TEST_MEMORY_MB,
};

/// Parse a requirements document. Blank input is an empty suite.
pub fn parse(requirements: &str, challenge_id: &str, challenge_title: Option<&str>) -> TestSuite {
    if requirements.trim().is_empty() {
        debug!(challenge_id, "No requirements, empty test suite");
        return TestSuite::empty(challenge_id, challenge_title);
    }

    let parsed = serde_json::from_str::<Value>(requirements)
        .context("Requirements are not valid JSON")
        .and_then(|value| build_suite(&value, challenge_id, challenge_title));

    or_empty(parsed, challenge_id, challenge_title)
}

/// Same as [`parse`] for an already-decoded payload
pub fn from_value(
    requirements: &Value,
    challenge_id: &str,
    challenge_title: Option<&str>,
) -> TestSuite {
    if requirements.is_null() {
        return TestSuite::empty(challenge_id, challenge_title);
    }
    or_empty(
        build_suite(requirements, challenge_id, challenge_title),
        challenge_id,
        challenge_title,
    )
}

fn or_empty(
    parsed: Result<TestSuite>,
    challenge_id: &str,
    challenge_title: Option<&str>,
) -> TestSuite {
    match parsed {
        Ok(suite) => {
            debug!(challenge_id, cases = suite.test_cases.len(), "Parsed test suite");
            suite
        }
        Err(e) => {
            warn!(
                challenge_id,
                error = %format!("{:#}", e),
                "Unusable requirements, grading against an empty test suite"
            );
            TestSuite::empty(challenge_id, challenge_title)
        }
    }
}

fn build_suite(
    value: &Value,
    challenge_id: &str,
    challenge_title: Option<&str>,
) -> Result<TestSuite> {
    let Some(root) = value.as_object() else {
        bail!("Requirements must be a JSON object");
    };

    let test_cases = match root.get("testCases") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(entries)) => entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                parse_case(entry).with_context(|| format!("Invalid test case at index {}", index))
            })
            .collect::<Result<Vec<_>>>()?,
        Some(_) => bail!("testCases must be an array"),
    };

    Ok(TestSuite {
        challenge_id: challenge_id.to_string(),
        challenge_title: challenge_title.map(str::to_string),
        test_cases,
        constraints: parse_constraints(root)?,
        setup_code: optional_text(root, "setupCode")?,
        teardown_code: optional_text(root, "teardownCode")?,
    })
}

fn parse_case(entry: &Value) -> Result<TestCase> {
    let Some(fields) = entry.as_object() else {
        bail!("test case must be an object");
    };

    let is_hidden = ["isHidden", "hidden"]
        .iter()
        .any(|key| fields.get(*key) == Some(&Value::Bool(true)));

    let order = match fields.get("order") {
        None | Some(Value::Null) => 0,
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(_) => bail!("order must be a number"),
    };

    let metadata = match fields.get("metadata") {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map.clone()),
        Some(_) => bail!("metadata must be an object"),
    };

    Ok(TestCase {
        id: optional_text(fields, "id")?,
        name: optional_text(fields, "name")?,
        description: optional_text(fields, "description")?,
        input: optional_text(fields, "input")?,
        expected_output: optional_text(fields, "expectedOutput")?,
        is_hidden,
        order,
        metadata,
    })
}

fn parse_constraints(root: &Map<String, Value>) -> Result<TestConstraints> {
    match root.get("timeout") {
        None | Some(Value::Null) => Ok(TestConstraints::default()),
        Some(Value::Number(n)) => {
            let whole = n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64);
            let Some(seconds) = n.as_u64().or(whole) else {
                bail!("timeout must not be negative");
            };
            Ok(TestConstraints {
                timeout_seconds: seconds,
                max_memory_mb: DEFAULT_TEST_MEMORY_MB,
                max_cpu_cores: DEFAULT_TEST_CPU_CORES,
            })
        }
        Some(_) => bail!("timeout must be a number"),
    }
}

/// Strings as-is; numbers and booleans in their JSON spelling
fn optional_text(fields: &Map<String, Value>, key: &str) -> Result<Option<String>> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(v @ (Value::Number(_) | Value::Bool(_))) => Ok(Some(v.to_string())),
        Some(_) => bail!("{} must be a string", key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use verdict_common::testing::DEFAULT_TEST_TIMEOUT_SECONDS;

    #[test]
    fn test_full_document() {
        let suite = parse(
            r#"{
                "timeout": 4,
                "setupCode": "import sys",
                "teardownCode": null,
                "testCases": [
                    {"id": "1", "name": "small", "input": "2 3", "expectedOutput": "5", "order": 1},
                    {"id": 2, "name": "big", "input": "10 20", "expectedOutput": 30,
                     "isHidden": true, "metadata": {"weight": 2}}
                ]
            }"#,
            "ch-1",
            Some("Sum"),
        );

        assert_eq!(suite.challenge_id, "ch-1");
        assert_eq!(suite.challenge_title.as_deref(), Some("Sum"));
        assert_eq!(suite.test_cases.len(), 2);
        assert_eq!(suite.constraints.timeout_seconds, 4);
        assert_eq!(suite.constraints.max_memory_mb, 256);
        assert_eq!(suite.setup_code.as_deref(), Some("import sys"));
        assert!(suite.teardown_code.is_none());

        let first = &suite.test_cases[0];
        assert_eq!(first.input.as_deref(), Some("2 3"));
        assert_eq!(first.order, 1);
        assert!(!first.is_hidden);

        let second = &suite.test_cases[1];
        assert_eq!(second.id.as_deref(), Some("2"));
        assert_eq!(second.expected_output.as_deref(), Some("30"));
        assert!(second.is_hidden);
        assert_eq!(second.metadata.as_ref().unwrap()["weight"], 2);
    }

    #[test]
    fn test_missing_fields_default() {
        let suite = parse(r#"{"testCases": [{}]}"#, "c", None);

        let case = &suite.test_cases[0];
        assert!(case.id.is_none());
        assert!(case.input.is_none());
        assert!(case.expected_output.is_none());
        assert!(!case.is_hidden);
        assert_eq!(case.order, 0);
        assert_eq!(suite.constraints, TestConstraints::default());
        assert_eq!(suite.constraints.timeout_seconds, DEFAULT_TEST_TIMEOUT_SECONDS);
    }

    #[test]
    fn test_hidden_alias_and_non_boolean_hidden() {
        let suite = parse(
            r#"{"testCases": [{"hidden": true}, {"isHidden": "yes"}, {"isHidden": false}]}"#,
            "c",
            None,
        );

        let hidden: Vec<bool> = suite.test_cases.iter().map(|c| c.is_hidden).collect();
        assert_eq!(hidden, vec![true, false, false]);
    }

    #[test]
    fn test_case_order_is_preserved() {
        let suite = parse(
            r#"{"testCases": [{"id": "b", "order": 2}, {"id": "a", "order": 1}]}"#,
            "c",
            None,
        );

        let ids: Vec<_> = suite.test_cases.iter().filter_map(|c| c.id.as_deref()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_malformed_payloads_yield_empty_suite() {
        let payloads = [
            "{not json",
            "[1, 2, 3]",
            r#"{"testCases": "nope"}"#,
            r#"{"testCases": [42]}"#,
            r#"{"testCases": [{"input": [1, 2]}]}"#,
            r#"{"testCases": [{"order": "first"}]}"#,
            r#"{"testCases": [{"metadata": 5}]}"#,
            r#"{"timeout": "ten", "testCases": [{}]}"#,
            r#"{"timeout": -1, "testCases": [{}]}"#,
            r#"{"setupCode": {"a": 1}}"#,
        ];

        for payload in payloads {
            let suite = parse(payload, "c", Some("T"));
            assert!(suite.test_cases.is_empty(), "payload: {}", payload);
            assert_eq!(suite.challenge_id, "c");
            assert_eq!(suite.challenge_title.as_deref(), Some("T"));
            assert_eq!(suite.constraints, TestConstraints::default());
        }
    }

    #[test]
    fn test_blank_and_null_requirements() {
        assert!(parse("", "c", None).test_cases.is_empty());
        assert!(parse("   \n", "c", None).test_cases.is_empty());
        assert!(from_value(&Value::Null, "c", None).test_cases.is_empty());
    }

    #[test]
    fn test_from_value() {
        let suite = from_value(
            &json!({"testCases": [{"input": "1", "expectedOutput": "1"}], "timeout": 2.9}),
            "c",
            None,
        );

        assert_eq!(suite.test_cases.len(), 1);
        assert_eq!(suite.constraints.timeout_seconds, 2);
    }
}
