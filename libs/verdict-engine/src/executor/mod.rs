/// Language Executors - One Implementation Per Supported Language
///
/// Each executor knows how to run and syntax-check source for exactly one
/// language. Process handling itself is shared through `crate::sandbox`;
/// an executor only decides the interpreter, its flags and which OS caps apply.
///
/// **Contract:**
/// - `execute` never fails; every fault is folded into an `ExecutionResult`
/// - `validate` is advisory; an unavailable checker reports the code valid
/// - Executors are stateless apart from config and safe to share across tasks
///
/// Adding a language means adding a module here and one line to
/// `builtin_executors`.

use async_trait::async_trait;
use std::sync::Arc;
use verdict_common::types::{ExecutionRequest, ExecutionResult, Language, ValidationResult};
use verdict_common::ExecutionConfig;

pub mod javascript;
pub mod python;

pub use javascript::JavaScriptExecutor;
pub use python::PythonExecutor;

#[async_trait]
pub trait LanguageExecutor: Send + Sync {
    /// The single language this executor serves
    fn language(&self) -> Language;

    /// Extension for temp source files, including the dot
    fn file_extension(&self) -> &'static str;

    async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult;

    async fn validate(&self, code: &str) -> ValidationResult;
}

pub type ExecutorFactory = fn(&ExecutionConfig) -> Arc<dyn LanguageExecutor>;

const BUILTIN_EXECUTORS: &[(Language, ExecutorFactory)] = &[
    (Language::Python, python_executor),
    (Language::Javascript, javascript_executor),
];

fn python_executor(config: &ExecutionConfig) -> Arc<dyn LanguageExecutor> {
    Arc::new(PythonExecutor::new(config))
}

fn javascript_executor(config: &ExecutionConfig) -> Arc<dyn LanguageExecutor> {
    Arc::new(JavaScriptExecutor::new(config))
}

/// Every executor compiled into this build
pub fn builtin_executors() -> &'static [(Language, ExecutorFactory)] {
    BUILTIN_EXECUTORS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_factories_match_their_language() {
        let config = ExecutionConfig::default();

        for (language, factory) in builtin_executors() {
            let executor = factory(&config);
            assert_eq!(executor.language(), *language);
            assert!(executor.file_extension().starts_with('.'));
        }
    }

    #[test]
    fn test_builtin_languages_are_unique() {
        let mut languages: Vec<Language> = builtin_executors().iter().map(|(l, _)| *l).collect();
        let before = languages.len();
        languages.sort();
        languages.dedup();

        assert_eq!(languages.len(), before);
    }
}
