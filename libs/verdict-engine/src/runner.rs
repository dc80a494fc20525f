/// Test Runner - Sequential Suite Execution and Aggregation
///
/// **Core Responsibility:**
/// Run one submission against every case of a suite, in suite order, and
/// fold the per-case verdicts into a `TestExecutionResult`.
///
/// **Execution Model:**
/// - One dispatch per test case, strictly sequential
/// - Setup and teardown snippets are concatenated around the submission once
/// - Suite constraints apply to every case
/// - Each case is timed around its dispatch; the suite total is the sum
///
/// **Fault Isolation:**
/// A panic while orchestrating one case is recorded as that case's error and
/// the remaining cases still run.

use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use verdict_common::testing::{
    TestCase, TestCaseResult, TestConstraints, TestExecutionResult, TestSuite,
};
use verdict_common::types::{ExecutionConstraints, ExecutionRequest, Language};

use crate::dispatcher::{unsupported_message, Dispatcher, DISABLED_MESSAGE};
use crate::evaluator::evaluate_case;
use crate::panic_message;

#[derive(Clone)]
pub struct TestRunner {
    dispatcher: Arc<Dispatcher>,
}

impl TestRunner {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Grade `code` against every case of `suite`.
    ///
    /// A disabled subsystem or an unsupported language fails the whole suite
    /// up front with `error_message` set; no case is dispatched.
    #[tracing::instrument(
        skip(self, code, suite),
        fields(
            challenge_id = %suite.challenge_id,
            submission_id = %submission_id,
            language = %language,
            cases = suite.test_cases.len()
        )
    )]
    pub async fn run_tests(
        &self,
        language: Language,
        code: &str,
        suite: &TestSuite,
        submission_id: &str,
    ) -> TestExecutionResult {
        if !self.dispatcher.is_enabled() {
            warn!("Grading requested while execution is disabled");
            return TestExecutionResult::failure(
                &suite.challenge_id,
                submission_id,
                DISABLED_MESSAGE,
            );
        }
        if !self.dispatcher.is_supported(language) {
            warn!("Grading requested for unsupported language");
            return TestExecutionResult::failure(
                &suite.challenge_id,
                submission_id,
                unsupported_message(language),
            );
        }

        info!("Running test suite");

        let full_code = suite.full_code(code);
        let constraints = ExecutionConstraints::from(suite.constraints);
        let mut results = Vec::with_capacity(suite.test_cases.len());
        let mut total_execution_time_ms = 0u64;

        for (index, test_case) in suite.test_cases.iter().enumerate() {
            let result = self
                .run_guarded(language, &full_code, test_case, constraints)
                .await;

            debug!(
                test_index = index + 1,
                test_id = ?test_case.id,
                passed = result.passed,
                hidden = result.is_hidden,
                execution_ms = result.execution_time_ms,
                "Test case finished"
            );

            total_execution_time_ms =
                total_execution_time_ms.saturating_add(result.execution_time_ms);
            results.push(result);
        }

        let verdict = TestExecutionResult::from_results(
            &suite.challenge_id,
            submission_id,
            results,
            total_execution_time_ms,
        );

        info!(
            passed = verdict.passed,
            passed_tests = verdict.passed_tests,
            total_tests = verdict.total_tests,
            score = verdict.score,
            total_execution_ms = verdict.total_execution_time_ms,
            "Test suite finished"
        );

        verdict
    }

    /// Run one ad-hoc case. Missing constraints fall back to the suite
    /// defaults (10s, 256MB, 1 core).
    #[tracing::instrument(
        skip(self, code, test_case, constraints),
        fields(language = %language, test_id = ?test_case.id)
    )]
    pub async fn run_single_test(
        &self,
        language: Language,
        code: &str,
        test_case: &TestCase,
        constraints: Option<&TestConstraints>,
    ) -> TestCaseResult {
        let constraints = constraints.copied().unwrap_or_default();
        self.run_guarded(language, code, test_case, constraints.into())
            .await
    }

    async fn run_guarded(
        &self,
        language: Language,
        code: &str,
        test_case: &TestCase,
        constraints: ExecutionConstraints,
    ) -> TestCaseResult {
        match AssertUnwindSafe(self.run_case(language, code, test_case, constraints))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload);
                error!(
                    test_id = ?test_case.id,
                    panic = %message,
                    "Test case orchestration panicked"
                );
                TestCaseResult::error(test_case, format!("Test execution error: {}", message), 0)
            }
        }
    }

    async fn run_case(
        &self,
        language: Language,
        code: &str,
        test_case: &TestCase,
        constraints: ExecutionConstraints,
    ) -> TestCaseResult {
        let mut request = ExecutionRequest::new(language, code).with_constraints(constraints);
        if let Some(input) = &test_case.input {
            request = request.with_input(input.clone());
        }

        let start = Instant::now();
        let execution = self.dispatcher.execute(&request).await;
        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        evaluate_case(&execution, test_case, elapsed_ms)
    }
}
