// CLI commands over the execution engine
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use verdict_common::testing::TestExecutionResult;
use verdict_common::types::{ExecutionConstraints, ExecutionRequest, Language};
use verdict_common::ExecutionConfig;
use verdict_engine::{suite, Dispatcher, TestRunner};

pub struct Engine {
    config: Arc<ExecutionConfig>,
    dispatcher: Arc<Dispatcher>,
    runner: TestRunner,
}

impl Engine {
    pub fn new(config: ExecutionConfig) -> Self {
        let config = Arc::new(config);
        let dispatcher = Arc::new(Dispatcher::new(config.clone()));
        Self {
            runner: TestRunner::new(dispatcher.clone()),
            dispatcher,
            config,
        }
    }

    pub fn from_default_config() -> Result<Self> {
        let config = ExecutionConfig::load_default().context("Failed to load execution config")?;
        Ok(Self::new(config))
    }
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize result")?;
    println!("{}", json);
    Ok(())
}

/// Build the request the `run` command executes
pub fn build_run_request(
    config: &ExecutionConfig,
    language: Language,
    code: String,
    input: Option<String>,
    timeout: Option<u64>,
    memory: Option<u64>,
) -> ExecutionRequest {
    let constraints = ExecutionConstraints {
        timeout_seconds: timeout,
        max_memory_mb: memory,
        max_cpu_cores: None,
    }
    .or_defaults(config.default_constraints());

    let request = ExecutionRequest::new(language, code).with_constraints(constraints);
    match input {
        Some(input) => request.with_input(input),
        None => request,
    }
}

pub async fn run(
    engine: &Engine,
    language: Language,
    file: &Path,
    input: Option<&Path>,
    timeout: Option<u64>,
    memory: Option<u64>,
) -> Result<()> {
    let code = read_file(file)?;
    let input = input.map(read_file).transpose()?;

    let request = build_run_request(&engine.config, language, code, input, timeout, memory);
    let result = engine.dispatcher.execute(&request).await;

    info!(status = ?result.status, "Run finished");
    print_json(&result)
}

pub async fn validate(engine: &Engine, language: Language, file: &Path) -> Result<()> {
    let code = read_file(file)?;
    let result = engine.dispatcher.validate(&code, language).await;
    print_json(&result)
}

pub async fn grade(
    engine: &Engine,
    language: Language,
    file: &Path,
    suite_path: &Path,
    challenge_id: &str,
    show_hidden: bool,
) -> Result<()> {
    let code = read_file(file)?;
    let requirements = read_file(suite_path)?;
    let title = suite_path.file_stem().and_then(|s| s.to_str());

    let test_suite = suite::parse(&requirements, challenge_id, title);
    let submission_id = uuid::Uuid::new_v4().to_string();

    let result = engine
        .runner
        .run_tests(language, &code, &test_suite, &submission_id)
        .await;

    print_json(&presented(result, show_hidden))
}

fn presented(result: TestExecutionResult, show_hidden: bool) -> TestExecutionResult {
    if show_hidden {
        result
    } else {
        result.public_view()
    }
}

pub fn languages(engine: &Engine) -> Result<()> {
    print_json(&engine.dispatcher.supported_languages())
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_common::testing::{TestCase, TestCaseResult};

    #[test]
    fn test_run_request_fills_missing_limits_from_config() {
        let config = ExecutionConfig {
            default_timeout_seconds: 7,
            max_memory_mb: 64,
            ..Default::default()
        };

        let request = build_run_request(
            &config,
            Language::Python,
            "print(1)".into(),
            Some("x".into()),
            Some(2),
            None,
        );

        assert_eq!(request.constraints, Some(ExecutionConstraints::new(2, 64, 1)));
        assert_eq!(request.input.as_deref(), Some("x"));
    }

    #[test]
    fn test_hidden_cases_redacted_unless_requested() {
        let case = TestCase::hidden("h", "h", "1", "2");
        let result = TestExecutionResult::from_results(
            "c",
            "s",
            vec![TestCaseResult::failed(&case, "2".into(), "3".into(), 1)],
            1,
        );

        assert!(presented(result.clone(), false).results[0].expected_output.is_none());
        assert_eq!(
            presented(result, true).results[0].expected_output.as_deref(),
            Some("2")
        );
    }

    #[tokio::test]
    async fn test_missing_source_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::new(ExecutionConfig {
            work_dir: dir.path().to_path_buf(),
            ..Default::default()
        });

        let result = validate(&engine, Language::Python, &dir.path().join("missing.py")).await;

        assert!(result.is_err());
    }
}
