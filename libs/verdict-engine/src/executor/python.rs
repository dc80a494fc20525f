use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;
use verdict_common::types::{ExecutionRequest, ExecutionResult, Language, ValidationResult};
use verdict_common::ExecutionConfig;

use super::LanguageExecutor;
use crate::sandbox::{self, Interpreter, ResourceLimits};

const PYTHON: &str = "python3";

/// Compiles stdin without running it
const COMPILE_CHECK: &str = "import sys; compile(sys.stdin.read(), '<submission>', 'exec')";

/// Runs `.py` files with `python3`. Timeout and memory are enforced with
/// `ulimit -t` and `ulimit -v`.
pub struct PythonExecutor {
    work_dir: PathBuf,
}

impl PythonExecutor {
    pub fn new(config: &ExecutionConfig) -> Self {
        Self {
            work_dir: config.work_dir.clone(),
        }
    }
}

#[async_trait]
impl LanguageExecutor for PythonExecutor {
    fn language(&self) -> Language {
        Language::Python
    }

    fn file_extension(&self) -> &'static str {
        ".py"
    }

    async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        if let Some(cores) = request.constraints.and_then(|c| c.max_cpu_cores) {
            debug!(cores, "CPU core limit is advisory and not applied");
        }

        sandbox::execute_source(
            &self.work_dir,
            self.file_extension(),
            &Interpreter::new(PYTHON),
            ResourceLimits::from_request(request),
            request,
        )
        .await
    }

    async fn validate(&self, code: &str) -> ValidationResult {
        sandbox::check_syntax(PYTHON, &["-c", COMPILE_CHECK], code).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_common::types::{ExecutionConstraints, ExecutionStatus};

    fn python_available() -> bool {
        std::process::Command::new(PYTHON)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn executor(dir: &tempfile::TempDir) -> PythonExecutor {
        PythonExecutor::new(&ExecutionConfig {
            work_dir: dir.path().to_path_buf(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_sum_from_stdin() {
        if !python_available() {
            eprintln!("python3 not installed, skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let request = ExecutionRequest::new(
            Language::Python,
            "a, b = map(int, input().split())\nprint(a + b)",
        )
        .with_input("2 3")
        .with_constraints(ExecutionConstraints::new(5, 256, 1));

        let result = executor(&dir).execute(&request).await;

        assert!(result.is_completed(), "{:?}", result);
        assert_eq!(result.output.as_deref(), Some("5\n"));
        assert_eq!(result.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_exception_is_runtime_error() {
        if !python_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let request = ExecutionRequest::new(Language::Python, "raise ValueError('bad')");

        let result = executor(&dir).execute(&request).await;

        assert_eq!(result.status, ExecutionStatus::RuntimeError);
        assert_eq!(result.exit_code, Some(1));
        assert!(result.error.unwrap().contains("ValueError: bad"));
    }

    #[tokio::test]
    async fn test_infinite_loop_times_out() {
        if !python_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let request = ExecutionRequest::new(Language::Python, "while True:\n    pass")
            .with_constraints(ExecutionConstraints::new(1, 256, 1));

        let result = executor(&dir).execute(&request).await;

        assert_eq!(result.status, ExecutionStatus::Timeout);
        assert_eq!(result.error.as_deref(), Some("Execution timeout exceeded"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_validate() {
        if !python_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let executor = executor(&dir);

        assert!(executor.validate("print('ok')").await.valid);

        let invalid = executor.validate("def broken(:\n    pass").await;
        assert!(!invalid.valid);
        assert!(invalid.errors[0].contains("SyntaxError"));
    }
}
