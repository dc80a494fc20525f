/// Test Evaluator - Language-Agnostic Verdict Logic
///
/// **Core Responsibility:**
/// Turn one execution result plus one test case into a pass/fail/error verdict.
///
/// **Critical Properties:**
/// - Knows nothing about processes or interpreters
/// - Knows nothing about the dispatcher
/// - Pure function: (execution result, test case) -> TestCaseResult
///
/// **Verdict Rules:**
/// - `COMPLETED` and matching output: passed
/// - `COMPLETED` and different output: failed, with both normalized texts
/// - Any other status: error, carrying the executor's message verbatim
///
/// **Normalization Rules (Applied to All Languages):**
/// - Trim leading and trailing whitespace: YES
/// - `\r\n` and lone `\r` become `\n`: YES
/// - Case sensitivity: YES (exact match required)
/// - Internal whitespace: preserved
/// - Floating-point tolerance: NO

use verdict_common::testing::{TestCase, TestCaseResult};
use verdict_common::types::ExecutionResult;

/// Fallback when a failed execution carries no message
pub const EXECUTION_FAILED: &str = "Execution failed";

/// Normalize output for comparison. Absent output normalizes to `""`.
pub fn normalize_output(output: Option<&str>) -> String {
    output
        .unwrap_or_default()
        .trim()
        .replace("\r\n", "\n")
        .replace('\r', "\n")
}

/// Evaluate a single test case execution
///
/// ## Arguments
/// * `result` - What the dispatcher returned for this case
/// * `test_case` - Expected test case definition
/// * `execution_time_ms` - Wall-clock time measured around the dispatch
pub fn evaluate_case(
    result: &ExecutionResult,
    test_case: &TestCase,
    execution_time_ms: u64,
) -> TestCaseResult {
    if !result.is_completed() {
        let message = result
            .error
            .clone()
            .unwrap_or_else(|| EXECUTION_FAILED.to_string());
        return TestCaseResult::error(test_case, message, execution_time_ms);
    }

    let actual = normalize_output(result.output.as_deref());
    let expected = normalize_output(test_case.expected_output.as_deref());

    if actual == expected {
        TestCaseResult::passed(test_case, execution_time_ms)
    } else {
        TestCaseResult::failed(test_case, expected, actual, execution_time_ms)
    }
}
