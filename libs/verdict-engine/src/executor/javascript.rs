use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;
use verdict_common::types::{ExecutionRequest, ExecutionResult, Language, ValidationResult};
use verdict_common::ExecutionConfig;

use super::LanguageExecutor;
use crate::sandbox::{self, Interpreter, ResourceLimits};

const NODE: &str = "node";

/// Runs `.js` files with `node`.
///
/// V8 reserves a large virtual range at startup and aborts under `ulimit -v`,
/// so memory is capped through `--max-old-space-size` instead; the CPU-time
/// cap still comes from `ulimit -t`.
pub struct JavaScriptExecutor {
    work_dir: PathBuf,
}

impl JavaScriptExecutor {
    pub fn new(config: &ExecutionConfig) -> Self {
        Self {
            work_dir: config.work_dir.clone(),
        }
    }

    fn interpreter(request: &ExecutionRequest) -> Interpreter {
        let node = Interpreter::new(NODE);
        match request.max_memory_mb() {
            Some(mb) => node.arg(format!("--max-old-space-size={}", mb)),
            None => node,
        }
    }

    fn limits(request: &ExecutionRequest) -> ResourceLimits {
        ResourceLimits {
            address_space_kb: None,
            ..ResourceLimits::from_request(request)
        }
    }
}

#[async_trait]
impl LanguageExecutor for JavaScriptExecutor {
    fn language(&self) -> Language {
        Language::Javascript
    }

    fn file_extension(&self) -> &'static str {
        ".js"
    }

    async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        if let Some(cores) = request.constraints.and_then(|c| c.max_cpu_cores) {
            debug!(cores, "CPU core limit is advisory and not applied");
        }

        sandbox::execute_source(
            &self.work_dir,
            self.file_extension(),
            &Self::interpreter(request),
            Self::limits(request),
            request,
        )
        .await
    }

    async fn validate(&self, code: &str) -> ValidationResult {
        sandbox::check_syntax(NODE, &["--check", "-"], code).await
    }
}
