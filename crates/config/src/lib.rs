//! Configuration loading, validation, and management for actloop.
//!
//! Loads configuration from `.actloop.toml` in the working directory, falling
//! back to `~/.actloop/config.toml`, then applies environment variable
//! overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable that disables every approval prompt.
pub const DISABLE_APPROVAL_ENV: &str = "ACTLOOP_DISABLE_APPROVAL";

/// How often a human must confirm an action. Fixed for the whole session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalLevel {
    /// Confirm every command and write
    Safe,
    /// Confirm only risky commands and large or unsized writes
    #[default]
    Balanced,
    /// Never confirm
    Auto,
}

/// Post-edit checks to run once per turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifyMode {
    #[default]
    None,
    Lint,
    Test,
    Both,
}

impl fmt::Display for ApprovalLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Safe => "safe",
            Self::Balanced => "balanced",
            Self::Auto => "auto",
        })
    }
}

impl FromStr for ApprovalLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "safe" => Ok(Self::Safe),
            "balanced" => Ok(Self::Balanced),
            "auto" => Ok(Self::Auto),
            other => Err(ConfigError::ValidationError(format!(
                "unknown approval level '{other}' (expected safe, balanced or auto)"
            ))),
        }
    }
}

impl fmt::Display for VerifyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Lint => "lint",
            Self::Test => "test",
            Self::Both => "both",
        })
    }
}

impl FromStr for VerifyMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "lint" => Ok(Self::Lint),
            "test" => Ok(Self::Test),
            "both" => Ok(Self::Both),
            other => Err(ConfigError::ValidationError(format!(
                "unknown verify mode '{other}' (expected none, lint, test or both)"
            ))),
        }
    }
}

/// The root configuration structure.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// OpenAI-compatible base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Stream responses token by token
    #[serde(default = "default_true")]
    pub stream: bool,

    /// Request the model's reasoning trace when available
    #[serde(default)]
    pub want_reasoning: bool,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub verify: VerifyConfig,

    #[serde(default)]
    pub session_log: SessionLogConfig,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_true() -> bool {
    true
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("stream", &self.stream)
            .field("want_reasoning", &self.want_reasoning)
            .field("agent", &self.agent)
            .field("tools", &self.tools)
            .field("verify", &self.verify)
            .field("session_log", &self.session_log)
            .finish()
    }
}

/// Turn orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub approval_level: ApprovalLevel,

    #[serde(default)]
    pub verify_mode: VerifyMode,

    /// Upper bound on submit→dispatch→observe passes per user turn
    #[serde(default = "default_max_passes")]
    pub max_passes: u32,

    /// Observation bodies are tail-truncated to this many bytes
    #[serde(default = "default_observation_body_limit")]
    pub observation_body_limit: usize,

    /// Suppress all approval prompts. Only ever set from
    /// [`DISABLE_APPROVAL_ENV`]; never read from or written to a file.
    #[serde(skip)]
    pub disable_approval: bool,
}

fn default_max_passes() -> u32 {
    2
}
fn default_observation_body_limit() -> usize {
    4000
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            approval_level: ApprovalLevel::default(),
            verify_mode: VerifyMode::default(),
            max_passes: default_max_passes(),
            observation_body_limit: default_observation_body_limit(),
            disable_approval: false,
        }
    }
}

/// Built-in tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Root the file tools are confined to (default: current directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    /// Default timeout for `run` when the action gives none
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,

    /// Per-stream cap on captured stdout/stderr (tail kept)
    #[serde(default = "default_output_limit")]
    pub output_limit_bytes: usize,

    /// `open_file` returns at most this many bytes
    #[serde(default = "default_open_file_max")]
    pub open_file_max_bytes: usize,
}

fn default_run_timeout() -> u64 {
    120
}
fn default_output_limit() -> usize {
    64 * 1024
}
fn default_open_file_max() -> usize {
    200 * 1024
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            workspace_root: None,
            run_timeout_secs: default_run_timeout(),
            output_limit_bytes: default_output_limit(),
            open_file_max_bytes: default_open_file_max(),
        }
    }
}

impl ToolsConfig {
    /// The configured workspace root, or the current directory.
    pub fn resolved_workspace_root(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }
}

/// Verification settings. Explicit commands win over discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lint_command: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_command: Option<String>,

    #[serde(default = "default_verify_timeout")]
    pub timeout_secs: u64,
}

fn default_verify_timeout() -> u64 {
    600
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            lint_command: None,
            test_command: None,
            timeout_secs: default_verify_timeout(),
        }
    }
}

/// Where session records go. `None` keeps them in memory and in the trace log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionLogConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration: project `.actloop.toml` if present, else the global
    /// file, then environment overrides.
    ///
    /// Environment variables:
    /// - `ACTLOOP_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `ACTLOOP_BASE_URL`, `ACTLOOP_MODEL`
    /// - `ACTLOOP_APPROVAL`, `ACTLOOP_VERIFY`
    /// - `ACTLOOP_DISABLE_APPROVAL=1`
    pub fn load() -> Result<Self, ConfigError> {
        let project = PathBuf::from(".actloop.toml");
        let path = if project.exists() {
            project
        } else {
            Self::config_dir().join("config.toml")
        };
        let mut config = Self::load_from(&path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(key) = lookup("ACTLOOP_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(url) = lookup("ACTLOOP_BASE_URL") {
            self.base_url = url;
        }
        if let Some(model) = lookup("ACTLOOP_MODEL") {
            self.model = model;
        }
        if let Some(level) = lookup("ACTLOOP_APPROVAL") {
            self.agent.approval_level = level.parse()?;
        }
        if let Some(mode) = lookup("ACTLOOP_VERIFY") {
            self.agent.verify_mode = mode.parse()?;
        }
        self.agent.disable_approval = lookup(DISABLE_APPROVAL_ENV)
            .is_some_and(|v| matches!(v.trim(), "1" | "true" | "yes"));
        if self.agent.disable_approval {
            tracing::warn!("{DISABLE_APPROVAL_ENV} is set: every action runs without confirmation");
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".actloop")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.agent.max_passes == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_passes must be at least 1".into(),
            ));
        }
        if self.tools.run_timeout_secs == 0 || self.verify.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "timeouts must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            stream: true,
            want_reasoning: false,
            agent: AgentConfig::default(),
            tools: ToolsConfig::default(),
            verify: VerifyConfig::default(),
            session_log: SessionLogConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.agent.approval_level, ApprovalLevel::Balanced);
        assert_eq!(config.agent.verify_mode, VerifyMode::None);
        assert_eq!(config.agent.max_passes, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let toml_str = AppConfig::default_toml();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model, AppConfig::default().model);
        assert!(toml_str.contains("balanced"));
    }

    #[test]
    fn parses_levels_and_modes_from_toml() {
        let config: AppConfig = toml::from_str(
            r#"
model = "deepseek-chat"

[agent]
approval_level = "safe"
verify_mode = "both"
max_passes = 4

[verify]
test_command = "make check"
"#,
        )
        .unwrap();
        assert_eq!(config.agent.approval_level, ApprovalLevel::Safe);
        assert_eq!(config.agent.verify_mode, VerifyMode::Both);
        assert_eq!(config.agent.max_passes, 4);
        assert_eq!(config.verify.test_command.as_deref(), Some("make check"));
    }

    #[test]
    fn disable_approval_cannot_come_from_file() {
        let config: AppConfig = toml::from_str(
            r#"
[agent]
disable_approval = true
"#,
        )
        .unwrap();
        assert!(!config.agent.disable_approval);
    }

    #[test]
    fn env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("OPENAI_API_KEY", "sk-test"),
                ("ACTLOOP_APPROVAL", "auto"),
                ("ACTLOOP_VERIFY", "test"),
                (DISABLE_APPROVAL_ENV, "1"),
            ]))
            .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.agent.approval_level, ApprovalLevel::Auto);
        assert_eq!(config.agent.verify_mode, VerifyMode::Test);
        assert!(config.agent.disable_approval);
    }

    #[test]
    fn bad_env_level_is_rejected() {
        let mut config = AppConfig::default();
        assert!(config.apply_env(env(&[("ACTLOOP_APPROVAL", "yolo")])).is_err());
    }

    #[test]
    fn zero_passes_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_passes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.model, "gpt-4o-mini");
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "model = \"local\"\n[tools]\nrun_timeout_secs = 5\n").unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.model, "local");
        assert_eq!(config.tools.run_timeout_secs, 5);
        assert_eq!(config.tools.output_limit_bytes, 64 * 1024);
    }

    #[test]
    fn unparseable_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "model = [").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }
}
