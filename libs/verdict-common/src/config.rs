// Execution subsystem configuration
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::ExecutionConstraints;

pub const DEFAULT_CONFIG_PATH: &str = "config/execution.json";
pub const CONFIG_PATH_ENV: &str = "CODE_EXECUTION_CONFIG";

const ENABLED_ENV: &str = "CODE_EXECUTION_ENABLED";
const DEFAULT_TIMEOUT_ENV: &str = "CODE_EXECUTION_DEFAULT_TIMEOUT";
const MAX_MEMORY_ENV: &str = "CODE_EXECUTION_MAX_MEMORY_MB";
const MAX_CPU_ENV: &str = "CODE_EXECUTION_MAX_CPU_CORES";
const WORK_DIR_ENV: &str = "CODE_EXECUTION_WORK_DIR";

/// Read once at startup and injected wherever it is needed; never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutionConfig {
    /// Kill-switch for the whole subsystem
    pub enabled: bool,
    pub default_timeout_seconds: u64,
    pub max_memory_mb: u64,
    pub max_cpu_cores: u32,
    /// Root for temporary source files
    pub work_dir: PathBuf,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_timeout_seconds: 10,
            max_memory_mb: 256,
            max_cpu_cores: 1,
            work_dir: std::env::temp_dir().join("verdict-exec"),
        }
    }
}

impl ExecutionConfig {
    /// Load configuration from a JSON file. Missing keys keep their defaults.
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Execution config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))
    }

    /// Defaults, then the config file if one exists, then environment overrides.
    ///
    /// The file is `$CODE_EXECUTION_CONFIG` when set (and must then exist),
    /// otherwise `config/execution.json` when present.
    pub fn load_default() -> Result<Self> {
        let base = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::load(Path::new(&path))?,
            Err(_) => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::load(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        base.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `CODE_EXECUTION_*` overrides supplied by `lookup`
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENABLED_ENV) {
            self.enabled = parse_bool(&value)
                .with_context(|| format!("Invalid {}: {}", ENABLED_ENV, value))?;
        }
        if let Some(value) = lookup(DEFAULT_TIMEOUT_ENV) {
            self.default_timeout_seconds = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}: {}", DEFAULT_TIMEOUT_ENV, value))?;
        }
        if let Some(value) = lookup(MAX_MEMORY_ENV) {
            self.max_memory_mb = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}: {}", MAX_MEMORY_ENV, value))?;
        }
        if let Some(value) = lookup(MAX_CPU_ENV) {
            self.max_cpu_cores = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}: {}", MAX_CPU_ENV, value))?;
        }
        if let Some(value) = lookup(WORK_DIR_ENV) {
            self.work_dir = PathBuf::from(value);
        }
        Ok(self)
    }

    /// Constraints applied server-side when a request omits them
    pub fn default_constraints(&self) -> ExecutionConstraints {
        ExecutionConstraints::new(
            self.default_timeout_seconds,
            self.max_memory_mb,
            self.max_cpu_cores,
        )
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got '{}'", other),
    }
}
