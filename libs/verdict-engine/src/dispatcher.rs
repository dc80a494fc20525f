/// Execution Dispatcher - Language Routing and Fault Isolation
///
/// **Core Responsibility:**
/// The single entry point for running or validating code. Owns the executor
/// registry and the subsystem kill-switch.
///
/// **Guarantees:**
/// - Never fails and never panics outward: a disabled subsystem, an unknown
///   language and a panicking executor all become `INTERNAL_ERROR` results
/// - Holds no per-request state; concurrent calls are independent
///
/// The registry is built once from `executor::builtin_executors()` and never
/// mutated afterwards.

use futures_util::FutureExt;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, warn};
use verdict_common::types::{ExecutionRequest, ExecutionResult, Language, ValidationResult};
use verdict_common::ExecutionConfig;

use crate::executor::{builtin_executors, LanguageExecutor};
use crate::panic_message;

pub const DISABLED_MESSAGE: &str = "Code execution is disabled";

pub fn unsupported_message(language: Language) -> String {
    format!("Unsupported language: {}", language)
}

pub struct Dispatcher {
    config: Arc<ExecutionConfig>,
    executors: BTreeMap<Language, Arc<dyn LanguageExecutor>>,
}

impl Dispatcher {
    /// Dispatcher over every built-in executor
    pub fn new(config: Arc<ExecutionConfig>) -> Self {
        let executors = builtin_executors()
            .iter()
            .map(|(_, factory)| factory(&config))
            .collect();
        Self::with_executors(config, executors)
    }

    /// Dispatcher over an explicit executor set. A later executor for the
    /// same language replaces an earlier one.
    pub fn with_executors(
        config: Arc<ExecutionConfig>,
        executors: Vec<Arc<dyn LanguageExecutor>>,
    ) -> Self {
        let executors: BTreeMap<_, _> = executors
            .into_iter()
            .map(|executor| (executor.language(), executor))
            .collect();

        info!(
            enabled = config.enabled,
            languages = ?executors.keys().collect::<Vec<_>>(),
            "Execution dispatcher ready"
        );

        Self { config, executors }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn is_supported(&self, language: Language) -> bool {
        self.executors.contains_key(&language)
    }

    /// Sorted, without duplicates
    pub fn supported_languages(&self) -> Vec<Language> {
        self.executors.keys().copied().collect()
    }

    #[tracing::instrument(
        skip(self, request),
        fields(language = %request.language, code_size = request.code.len())
    )]
    pub async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        if !self.config.enabled {
            warn!("Execution requested while disabled");
            return ExecutionResult::internal_error(DISABLED_MESSAGE);
        }

        let Some(executor) = self.executors.get(&request.language) else {
            warn!("No executor for language");
            return ExecutionResult::internal_error(unsupported_message(request.language));
        };

        info!("Executing code");

        match AssertUnwindSafe(executor.execute(request)).catch_unwind().await {
            Ok(result) => {
                info!(
                    status = ?result.status,
                    execution_time_ms = ?result.execution_time_ms,
                    "Execution finished"
                );
                result
            }
            Err(payload) => {
                let message = panic_message(payload);
                error!(panic = %message, "Executor panicked");
                ExecutionResult::internal_error(format!("Execution failed: {}", message))
            }
        }
    }

    #[tracing::instrument(skip(self, code), fields(language = %language, code_size = code.len()))]
    pub async fn validate(&self, code: &str, language: Language) -> ValidationResult {
        if !self.config.enabled {
            return ValidationResult::failure(DISABLED_MESSAGE);
        }

        let Some(executor) = self.executors.get(&language) else {
            return ValidationResult::failure(unsupported_message(language));
        };

        match AssertUnwindSafe(executor.validate(code)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload);
                error!(panic = %message, "Validator panicked");
                ValidationResult::success().with_warning(format!("Validation failed: {}", message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use verdict_common::types::ExecutionStatus;

    /// Echoes the input back, or panics when the code says so
    struct FakeExecutor {
        language: Language,
    }

    #[async_trait]
    impl LanguageExecutor for FakeExecutor {
        fn language(&self) -> Language {
            self.language
        }

        fn file_extension(&self) -> &'static str {
            ".fake"
        }

        async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
            if request.code == "panic" {
                panic!("executor exploded");
            }
            ExecutionResult::success(request.input.clone().unwrap_or_default(), 1)
        }

        async fn validate(&self, code: &str) -> ValidationResult {
            if code == "panic" {
                panic!("validator exploded");
            }
            ValidationResult::success()
        }
    }

    fn dispatcher(enabled: bool, languages: &[Language]) -> Dispatcher {
        let config = ExecutionConfig {
            enabled,
            ..Default::default()
        };
        let executors = languages
            .iter()
            .map(|&language| Arc::new(FakeExecutor { language }) as Arc<dyn LanguageExecutor>)
            .collect();
        Dispatcher::with_executors(Arc::new(config), executors)
    }

    #[tokio::test]
    async fn test_routes_to_executor() {
        let d = dispatcher(true, &[Language::Python]);
        let request = ExecutionRequest::new(Language::Python, "echo").with_input("hi");

        let result = d.execute(&request).await;

        assert!(result.is_completed());
        assert_eq!(result.output.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn test_disabled() {
        let d = dispatcher(false, &[Language::Python]);

        let result = d.execute(&ExecutionRequest::new(Language::Python, "x")).await;

        assert_eq!(result.status, ExecutionStatus::InternalError);
        assert_eq!(result.error.as_deref(), Some("Code execution is disabled"));

        let validation = d.validate("x", Language::Python).await;
        assert!(!validation.valid);
    }

    #[tokio::test]
    async fn test_unsupported_language() {
        let d = dispatcher(true, &[Language::Python]);

        let result = d.execute(&ExecutionRequest::new(Language::Cplusplus, "x")).await;

        assert_eq!(result.status, ExecutionStatus::InternalError);
        assert_eq!(result.error.as_deref(), Some("Unsupported language: CPLUSPLUS"));

        let validation = d.validate("x", Language::Ruby).await;
        assert!(!validation.valid);
        assert_eq!(validation.errors, vec!["Unsupported language: RUBY".to_string()]);
    }

    #[tokio::test]
    async fn test_executor_panic_is_contained() {
        let d = dispatcher(true, &[Language::Python]);

        let result = d.execute(&ExecutionRequest::new(Language::Python, "panic")).await;

        assert_eq!(result.status, ExecutionStatus::InternalError);
        assert_eq!(result.error.as_deref(), Some("Execution failed: executor exploded"));

        let validation = d.validate("panic", Language::Python).await;
        assert!(validation.valid);
        assert_eq!(validation.warnings.len(), 1);
    }

    #[test]
    fn test_supported_languages_sorted_and_unique() {
        let d = dispatcher(
            true,
            &[Language::Python, Language::Javascript, Language::Python],
        );

        assert_eq!(
            d.supported_languages(),
            vec![Language::Javascript, Language::Python]
        );
        assert!(d.is_supported(Language::Python));
        assert!(!d.is_supported(Language::Go));
    }

    #[test]
    fn test_builtin_registry() {
        let d = Dispatcher::new(Arc::new(ExecutionConfig::default()));

        assert_eq!(
            d.supported_languages(),
            vec![Language::Javascript, Language::Python]
        );
        assert!(d.is_enabled());
    }
}
