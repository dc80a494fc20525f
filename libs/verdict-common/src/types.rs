use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Language tags accepted by the execution surface.
///
/// Every tag is a well-formed request; whether it can actually run depends on
/// which executors the dispatcher was built with. Tags are read
/// case-insensitively, both from JSON and through `FromStr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Language {
    Javascript,
    Typescript,
    Python,
    Java,
    CSharp,
    Go,
    Rust,
    Php,
    Cplusplus,
    Kotlin,
    Swift,
    Dart,
    Ruby,
    Other,
}

impl Language {
    /// Returns all language variants
    pub fn all_variants() -> &'static [Language] {
        &[
            Language::Javascript,
            Language::Typescript,
            Language::Python,
            Language::Java,
            Language::CSharp,
            Language::Go,
            Language::Rust,
            Language::Php,
            Language::Cplusplus,
            Language::Kotlin,
            Language::Swift,
            Language::Dart,
            Language::Ruby,
            Language::Other,
        ]
    }

    /// Wire tag, e.g. `PYTHON` or `C_SHARP`
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Javascript => "JAVASCRIPT",
            Language::Typescript => "TYPESCRIPT",
            Language::Python => "PYTHON",
            Language::Java => "JAVA",
            Language::CSharp => "C_SHARP",
            Language::Go => "GO",
            Language::Rust => "RUST",
            Language::Php => "PHP",
            Language::Cplusplus => "CPLUSPLUS",
            Language::Kotlin => "KOTLIN",
            Language::Swift => "SWIFT",
            Language::Dart => "DART",
            Language::Ruby => "RUBY",
            Language::Other => "OTHER",
        }
    }
}

/// A language tag outside the known set. Displays as the unsupported-language
/// message, with the tag upper-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLanguage(pub String);

impl fmt::Display for UnknownLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unsupported language: {}", self.0)
    }
}

impl std::error::Error for UnknownLanguage {}

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_uppercase();
        Language::all_variants()
            .iter()
            .copied()
            .find(|lang| lang.as_str() == tag)
            .ok_or(UnknownLanguage(tag))
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        tag.parse().map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource bounds for one execution. Absent fields fall back to the
/// executor's own defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_memory_mb: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cpu_cores: Option<u32>,
}

impl ExecutionConstraints {
    pub fn new(timeout_seconds: u64, max_memory_mb: u64, max_cpu_cores: u32) -> Self {
        Self {
            timeout_seconds: Some(timeout_seconds),
            max_memory_mb: Some(max_memory_mb),
            max_cpu_cores: Some(max_cpu_cores),
        }
    }

    /// Fill every absent field from `defaults`
    pub fn or_defaults(self, defaults: ExecutionConstraints) -> Self {
        Self {
            timeout_seconds: self.timeout_seconds.or(defaults.timeout_seconds),
            max_memory_mb: self.max_memory_mb.or(defaults.max_memory_mb),
            max_cpu_cores: self.max_cpu_cores.or(defaults.max_cpu_cores),
        }
    }
}

/// One execution request. Constructed fresh per call, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    pub code: String,
    pub language: Language,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<ExecutionConstraints>,
    /// Advisory only; not applied to the child process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_variables: Option<HashMap<String, String>>,
}

impl ExecutionRequest {
    pub fn new(language: Language, code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            language,
            input: None,
            constraints: None,
            environment_variables: None,
        }
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn with_constraints(mut self, constraints: ExecutionConstraints) -> Self {
        self.constraints = Some(constraints);
        self
    }

    /// Requested wall-clock bound, ignoring a zero value
    pub fn timeout_seconds(&self) -> Option<u64> {
        self.constraints
            .and_then(|c| c.timeout_seconds)
            .filter(|t| *t > 0)
    }

    /// Requested memory cap, ignoring a zero value
    pub fn max_memory_mb(&self) -> Option<u64> {
        self.constraints
            .and_then(|c| c.max_memory_mb)
            .filter(|m| *m > 0)
    }
}

/// Terminal outcome classification of one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Timeout,
    /// Reserved. Address-space violations surface as runtime errors.
    MemoryLimitExceeded,
    RuntimeError,
    CompilationError,
    InternalError,
}

/// Outcome of one process run.
///
/// `status == Completed` iff `success`; the constructors below are the only
/// way this crate builds one, and each keeps that pairing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_used_mb: Option<u64>,
    pub executed_at: DateTime<Utc>,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl ExecutionResult {
    fn base(success: bool, status: ExecutionStatus) -> Self {
        Self {
            success,
            output: None,
            error: None,
            exit_code: None,
            execution_time_ms: None,
            memory_used_mb: None,
            executed_at: Utc::now(),
            status,
            stderr: None,
        }
    }

    pub fn success(output: impl Into<String>, execution_time_ms: u64) -> Self {
        Self {
            output: Some(output.into()),
            exit_code: Some(0),
            execution_time_ms: Some(execution_time_ms),
            ..Self::base(true, ExecutionStatus::Completed)
        }
    }

    /// Failure with an arbitrary non-completed status.
    /// A `Completed` status is downgraded to `InternalError`.
    pub fn error(message: impl Into<String>, status: ExecutionStatus) -> Self {
        let status = match status {
            ExecutionStatus::Completed => ExecutionStatus::InternalError,
            other => other,
        };
        Self {
            error: Some(message.into()),
            ..Self::base(false, status)
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::error(message, ExecutionStatus::InternalError)
    }

    pub fn timeout() -> Self {
        Self::error("Execution timeout exceeded", ExecutionStatus::Timeout)
    }

    pub fn runtime_error(error: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stderr: Some(stderr.into()),
            ..Self::error(error, ExecutionStatus::RuntimeError)
        }
    }

    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = Some(exit_code);
        self
    }

    pub fn with_execution_time(mut self, execution_time_ms: u64) -> Self {
        self.execution_time_ms = Some(execution_time_ms);
        self
    }

    pub fn is_completed(&self) -> bool {
        self.success && self.status == ExecutionStatus::Completed
    }
}

/// Result of a syntax check. Advisory: callers never treat it as fatal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn success() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            errors: vec![error.into()],
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_serialization() {
        let json = serde_json::to_string(&Language::Python).unwrap();
        assert_eq!(json, "\"PYTHON\"");

        let json = serde_json::to_string(&Language::CSharp).unwrap();
        assert_eq!(json, "\"C_SHARP\"");

        let deserialized: Language = serde_json::from_str("\"JAVASCRIPT\"").unwrap();
        assert_eq!(deserialized, Language::Javascript);
    }

    #[test]
    fn test_language_from_str() {
        assert_eq!("python".parse::<Language>(), Ok(Language::Python));
        assert_eq!("Python".parse::<Language>(), Ok(Language::Python));
        assert_eq!("JAVASCRIPT".parse::<Language>(), Ok(Language::Javascript));
        assert_eq!(" c_sharp ".parse::<Language>(), Ok(Language::CSharp));
        assert_eq!(
            "cobol".parse::<Language>(),
            Err(UnknownLanguage("COBOL".to_string()))
        );
        assert!("".parse::<Language>().is_err());
    }

    #[test]
    fn test_unknown_language_message() {
        let err = "cobol".parse::<Language>().unwrap_err();

        assert_eq!(err.to_string(), "Unsupported language: COBOL");
    }

    #[test]
    fn test_language_deserializes_case_insensitively() {
        let lang: Language = serde_json::from_str("\"python\"").unwrap();
        assert_eq!(lang, Language::Python);

        let err = serde_json::from_str::<Language>("\"COBOL\"").unwrap_err();
        assert!(err.to_string().contains("Unsupported language: COBOL"));
    }

    #[test]
    fn test_language_tags_match_serde() {
        for lang in Language::all_variants() {
            let json = serde_json::to_string(lang).unwrap();
            assert_eq!(json, format!("\"{}\"", lang.as_str()));
        }
    }

    #[test]
    fn test_request_defaults_when_fields_missing() {
        let request: ExecutionRequest =
            serde_json::from_str(r#"{"code": "print(1)", "language": "PYTHON"}"#).unwrap();

        assert_eq!(request.language, Language::Python);
        assert!(request.input.is_none());
        assert!(request.constraints.is_none());
        assert!(request.environment_variables.is_none());
        assert_eq!(request.timeout_seconds(), None);
    }

    #[test]
    fn test_zero_constraints_are_ignored() {
        let request = ExecutionRequest::new(Language::Python, "")
            .with_constraints(ExecutionConstraints::new(0, 0, 1));

        assert_eq!(request.timeout_seconds(), None);
        assert_eq!(request.max_memory_mb(), None);
    }

    #[test]
    fn test_constraints_or_defaults() {
        let partial = ExecutionConstraints {
            timeout_seconds: Some(3),
            ..Default::default()
        };
        let filled = partial.or_defaults(ExecutionConstraints::new(10, 256, 1));

        assert_eq!(filled, ExecutionConstraints::new(3, 256, 1));
    }

    #[test]
    fn test_status_success_pairing() {
        assert!(ExecutionResult::success("ok", 5).is_completed());
        assert_eq!(ExecutionResult::timeout().status, ExecutionStatus::Timeout);
        assert!(!ExecutionResult::timeout().success);

        let downgraded = ExecutionResult::error("odd", ExecutionStatus::Completed);
        assert_eq!(downgraded.status, ExecutionStatus::InternalError);
        assert!(!downgraded.success);
    }

    #[test]
    fn test_result_omits_absent_fields() {
        let json = serde_json::to_value(ExecutionResult::timeout()).unwrap();

        assert_eq!(json["status"], "TIMEOUT");
        assert_eq!(json["success"], false);
        assert!(json.get("output").is_none());
        assert!(json.get("memoryUsedMb").is_none());
        assert!(json.get("executedAt").is_some());
    }

    #[test]
    fn test_validation_result_constructors() {
        let ok = ValidationResult::success();
        assert!(ok.valid && ok.errors.is_empty());

        let bad = ValidationResult::failure("SyntaxError");
        assert!(!bad.valid);
        assert_eq!(bad.errors, vec!["SyntaxError".to_string()]);
    }
}
