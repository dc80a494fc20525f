// HTTP route handlers for the execution surface

use axum::extract::{Query, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use verdict_common::testing::{TestCase, TestCaseResult, TestConstraints, TestExecutionResult};
use verdict_common::types::{
    ExecutionConstraints, ExecutionRequest, ExecutionResult, Language, ValidationResult,
};
use verdict_engine::dispatcher::DISABLED_MESSAGE;
use verdict_engine::suite;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ValidateParams {
    pub language: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub enabled: bool,
    pub languages: Vec<Language>,
}

/// Language tags are taken as free text so an unknown tag is answered with a
/// typed result rather than a rejected body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteBody {
    pub code: String,
    pub language: String,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub constraints: Option<ExecutionConstraints>,
    #[serde(default)]
    pub environment_variables: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRequest {
    pub language: String,
    pub code: String,
    pub challenge_id: String,
    #[serde(default)]
    pub challenge_title: Option<String>,
    #[serde(default)]
    pub submission_id: Option<String>,
    /// Loose requirements document; an object or its JSON text
    #[serde(default)]
    pub requirements: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleTestRequest {
    pub language: String,
    pub code: String,
    pub test_case: TestCase,
    #[serde(default)]
    pub constraints: Option<TestConstraints>,
}

/// Resolve a request's language tag. The error is the message to report:
/// a disabled subsystem takes precedence over an unknown tag.
fn resolve_language(state: &AppState, tag: &str) -> Result<Language, String> {
    if !state.dispatcher.is_enabled() {
        return Err(DISABLED_MESSAGE.to_string());
    }
    tag.parse::<Language>().map_err(|e| {
        warn!(language = %tag, "Request for unknown language tag");
        e.to_string()
    })
}

/// POST /execution/execute - Run code once
pub async fn execute_code(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ExecuteBody>,
) -> Json<ExecutionResult> {
    let language = match resolve_language(&state, &body.language) {
        Ok(language) => language,
        Err(message) => return Json(ExecutionResult::internal_error(message)),
    };

    let defaults = state.config.default_constraints();
    let request = ExecutionRequest {
        code: body.code,
        language,
        input: body.input,
        constraints: Some(body.constraints.map_or(defaults, |c| c.or_defaults(defaults))),
        environment_variables: body.environment_variables,
    };

    let result = state.dispatcher.execute(&request).await;

    info!(
        language = %request.language,
        status = ?result.status,
        execution_ms = ?result.execution_time_ms,
        "Execute request served"
    );

    Json(result)
}

/// POST /execution/validate?language=X - Syntax check a raw code body
pub async fn validate_code(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ValidateParams>,
    code: String,
) -> Json<ValidationResult> {
    match resolve_language(&state, &params.language) {
        Ok(language) => Json(state.dispatcher.validate(&code, language).await),
        Err(message) => Json(ValidationResult::failure(message)),
    }
}

/// GET /execution/languages
pub async fn supported_languages(State(state): State<Arc<AppState>>) -> Json<Vec<Language>> {
    Json(state.dispatcher.supported_languages())
}

/// GET /execution/health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "UP",
        enabled: state.dispatcher.is_enabled(),
        languages: state.dispatcher.supported_languages(),
    })
}

/// POST /execution/test - Grade a submission against a challenge's requirements
pub async fn run_tests(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<GradeRequest>,
) -> Json<TestExecutionResult> {
    let submission_id = payload
        .submission_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let title = payload.challenge_title.as_deref();

    let language = match resolve_language(&state, &payload.language) {
        Ok(language) => language,
        Err(message) => {
            return Json(TestExecutionResult::failure(
                &payload.challenge_id,
                &submission_id,
                message,
            ))
        }
    };

    let test_suite = match &payload.requirements {
        Value::String(text) => suite::parse(text, &payload.challenge_id, title),
        other => suite::from_value(other, &payload.challenge_id, title),
    };

    let result = state
        .runner
        .run_tests(language, &payload.code, &test_suite, &submission_id)
        .await;

    info!(
        challenge_id = %payload.challenge_id,
        submission_id = %submission_id,
        score = result.score,
        passed = result.passed,
        "Grading request served"
    );

    Json(result.public_view())
}

/// POST /execution/test/single - Run one ad-hoc test case
pub async fn run_single_test(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SingleTestRequest>,
) -> Json<TestCaseResult> {
    let language = match resolve_language(&state, &payload.language) {
        Ok(language) => language,
        Err(message) => {
            return Json(TestCaseResult::error(&payload.test_case, message, 0).redacted())
        }
    };

    let result = state
        .runner
        .run_single_test(
            language,
            &payload.code,
            &payload.test_case,
            payload.constraints.as_ref(),
        )
        .await;

    Json(result.redacted())
}
