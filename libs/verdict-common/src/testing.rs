//! Test-suite data model: what a challenge is graded against and what
//! grading produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::ExecutionConstraints;

pub const DEFAULT_TEST_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_TEST_MEMORY_MB: u64 = 256;
pub const DEFAULT_TEST_CPU_CORES: u32 = 1;

/// Message recorded on a case whose program ran but printed the wrong thing
pub const OUTPUT_MISMATCH: &str = "Output mismatch";

/// Replaces the error text of a hidden case that did not pass
pub const HIDDEN_CASE_FAILED: &str = "Hidden test case failed";

/// One (input, expected-output) pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Fed to the program's stdin
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub expected_output: Option<String>,
    #[serde(default, alias = "hidden")]
    pub is_hidden: bool,
    #[serde(default)]
    pub order: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl TestCase {
    pub fn visible(id: &str, name: &str, input: &str, expected_output: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            name: Some(name.to_string()),
            input: Some(input.to_string()),
            expected_output: Some(expected_output.to_string()),
            ..Default::default()
        }
    }

    pub fn hidden(id: &str, name: &str, input: &str, expected_output: &str) -> Self {
        Self {
            is_hidden: true,
            ..Self::visible(id, name, input, expected_output)
        }
    }
}

/// Suite-wide resource bounds, applied to every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConstraints {
    pub timeout_seconds: u64,
    pub max_memory_mb: u64,
    pub max_cpu_cores: u32,
}

impl Default for TestConstraints {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_TEST_TIMEOUT_SECONDS,
            max_memory_mb: DEFAULT_TEST_MEMORY_MB,
            max_cpu_cores: DEFAULT_TEST_CPU_CORES,
        }
    }
}

impl From<TestConstraints> for ExecutionConstraints {
    fn from(c: TestConstraints) -> Self {
        ExecutionConstraints::new(c.timeout_seconds, c.max_memory_mb, c.max_cpu_cores)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSuite {
    pub challenge_id: String,
    #[serde(default)]
    pub challenge_title: Option<String>,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
    #[serde(default)]
    pub constraints: TestConstraints,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teardown_code: Option<String>,
}

impl TestSuite {
    pub fn empty(challenge_id: &str, challenge_title: Option<&str>) -> Self {
        Self {
            challenge_id: challenge_id.to_string(),
            challenge_title: challenge_title.map(str::to_string),
            ..Default::default()
        }
    }

    /// Setup, submission and teardown joined into one source unit.
    /// Blank snippets are skipped.
    pub fn full_code(&self, user_code: &str) -> String {
        let mut full = String::with_capacity(user_code.len());

        if let Some(setup) = self.setup_code.as_deref().filter(|s| !s.trim().is_empty()) {
            full.push_str(setup);
            full.push('\n');
        }

        full.push_str(user_code);

        if let Some(teardown) = self.teardown_code.as_deref().filter(|s| !s.trim().is_empty()) {
            full.push('\n');
            full.push_str(teardown);
        }

        full
    }
}

/// Outcome of one test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    pub test_case_id: Option<String>,
    pub test_case_name: Option<String>,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub execution_time_ms: u64,
    pub is_hidden: bool,
}

impl TestCaseResult {
    pub fn passed(test_case: &TestCase, execution_time_ms: u64) -> Self {
        Self {
            test_case_id: test_case.id.clone(),
            test_case_name: test_case.name.clone(),
            passed: true,
            expected_output: None,
            actual_output: None,
            error_message: None,
            execution_time_ms,
            is_hidden: test_case.is_hidden,
        }
    }

    pub fn failed(
        test_case: &TestCase,
        expected: String,
        actual: String,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            passed: false,
            expected_output: Some(expected),
            actual_output: Some(actual),
            error_message: Some(OUTPUT_MISMATCH.to_string()),
            ..Self::passed(test_case, execution_time_ms)
        }
    }

    pub fn error(test_case: &TestCase, error: impl Into<String>, execution_time_ms: u64) -> Self {
        Self {
            passed: false,
            error_message: Some(error.into()),
            ..Self::passed(test_case, execution_time_ms)
        }
    }

    /// The representation safe to show the submitting user.
    ///
    /// Hidden cases keep only their pass/fail state and timing.
    pub fn redacted(&self) -> Self {
        if !self.is_hidden {
            return self.clone();
        }
        Self {
            expected_output: None,
            actual_output: None,
            error_message: (!self.passed).then(|| HIDDEN_CASE_FAILED.to_string()),
            ..self.clone()
        }
    }
}

/// Suite-level verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestExecutionResult {
    pub challenge_id: String,
    pub submission_id: String,
    pub passed: bool,
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    pub results: Vec<TestCaseResult>,
    /// Integer percentage of passing cases, 0 for an empty suite
    pub score: u32,
    pub total_execution_time_ms: u64,
    pub executed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl TestExecutionResult {
    pub fn from_results(
        challenge_id: &str,
        submission_id: &str,
        results: Vec<TestCaseResult>,
        total_execution_time_ms: u64,
    ) -> Self {
        let total_tests = results.len();
        let passed_tests = results.iter().filter(|r| r.passed).count();

        Self {
            challenge_id: challenge_id.to_string(),
            submission_id: submission_id.to_string(),
            passed: passed_tests == total_tests,
            total_tests,
            passed_tests,
            failed_tests: total_tests - passed_tests,
            results,
            score: score(passed_tests, total_tests),
            total_execution_time_ms,
            executed_at: Utc::now(),
            error_message: None,
        }
    }

    /// A suite that could not be run at all
    pub fn failure(challenge_id: &str, submission_id: &str, error: impl Into<String>) -> Self {
        Self {
            passed: false,
            error_message: Some(error.into()),
            ..Self::from_results(challenge_id, submission_id, Vec::new(), 0)
        }
    }

    /// Copy with every hidden case redacted
    pub fn public_view(&self) -> Self {
        Self {
            results: self.results.iter().map(TestCaseResult::redacted).collect(),
            ..self.clone()
        }
    }
}

/// `floor(passed * 100 / total)`, 0 when there is nothing to grade
pub fn score(passed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    // passed <= total, so the quotient is at most 100
    ((passed * 100) / total) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(id: &str, hidden: bool) -> TestCase {
        if hidden {
            TestCase::hidden(id, id, "in", "out")
        } else {
            TestCase::visible(id, id, "in", "out")
        }
    }

    #[test]
    fn test_score_floor() {
        assert_eq!(score(0, 0), 0);
        assert_eq!(score(1, 2), 50);
        assert_eq!(score(1, 3), 33);
        assert_eq!(score(2, 3), 66);
        assert_eq!(score(3, 3), 100);
    }

    #[test]
    fn test_empty_suite_is_vacuously_passed_with_zero_score() {
        let result = TestExecutionResult::from_results("c1", "s1", Vec::new(), 0);

        assert!(result.passed);
        assert_eq!(result.total_tests, 0);
        assert_eq!(result.score, 0);
        assert!(result.error_message.is_none());
    }

    #[test]
    fn test_failure_carries_message() {
        let result = TestExecutionResult::failure("c1", "s1", "Code execution is disabled");

        assert!(!result.passed);
        assert_eq!(result.score, 0);
        assert_eq!(result.error_message.as_deref(), Some("Code execution is disabled"));
    }

    #[test]
    fn test_counts_and_score() {
        let a = case("a", false);
        let b = case("b", false);
        let results = vec![
            TestCaseResult::passed(&a, 10),
            TestCaseResult::failed(&b, "1".into(), "2".into(), 12),
        ];

        let result = TestExecutionResult::from_results("c1", "s1", results, 22);

        assert!(!result.passed);
        assert_eq!(result.passed_tests, 1);
        assert_eq!(result.failed_tests, 1);
        assert_eq!(result.score, 50);
        assert_eq!(result.total_execution_time_ms, 22);
    }

    #[test]
    fn test_hidden_failure_is_redacted() {
        let hidden = case("h", true);
        let result = TestCaseResult::failed(&hidden, "secret".into(), "guess".into(), 3);

        let public = result.redacted();

        assert!(!public.passed);
        assert!(public.expected_output.is_none());
        assert!(public.actual_output.is_none());
        assert_eq!(public.error_message.as_deref(), Some(HIDDEN_CASE_FAILED));

        let json = serde_json::to_value(&public).unwrap();
        assert!(json.get("expectedOutput").is_none());
        assert!(json.get("actualOutput").is_none());
    }

    #[test]
    fn test_visible_failure_is_not_redacted() {
        let visible = case("v", false);
        let result = TestCaseResult::failed(&visible, "1".into(), "2".into(), 3);

        assert_eq!(result.redacted(), result);
    }

    #[test]
    fn test_public_view_keeps_score() {
        let hidden = case("h", true);
        let visible = case("v", false);
        let results = vec![
            TestCaseResult::passed(&visible, 1),
            TestCaseResult::error(&hidden, "Traceback: secret input", 1),
        ];
        let full = TestExecutionResult::from_results("c1", "s1", results, 2);

        let public = full.public_view();

        assert_eq!(public.score, full.score);
        assert_eq!(public.results[1].error_message.as_deref(), Some(HIDDEN_CASE_FAILED));
    }

    #[test]
    fn test_full_code_joins_snippets() {
        let suite = TestSuite {
            setup_code: Some("import sys".into()),
            teardown_code: Some("print('done')".into()),
            ..TestSuite::empty("c1", None)
        };

        assert_eq!(suite.full_code("x = 1"), "import sys\nx = 1\nprint('done')");
    }

    #[test]
    fn test_full_code_skips_blank_snippets() {
        let suite = TestSuite {
            setup_code: Some("   ".into()),
            teardown_code: None,
            ..TestSuite::empty("c1", None)
        };

        assert_eq!(suite.full_code("x = 1"), "x = 1");
    }

    #[test]
    fn test_test_case_accepts_hidden_alias() {
        let tc: TestCase =
            serde_json::from_str(
                r#"{"id": "1", "input": "2 3", "expectedOutput": "5", "hidden": true}"#,
            )
                .unwrap();

        assert!(tc.is_hidden);
        assert_eq!(tc.order, 0);
        assert!(tc.name.is_none());
    }
}
