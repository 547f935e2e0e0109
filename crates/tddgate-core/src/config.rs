use crate::error::{GateError, Result};
use crate::paths;
use crate::reporter::ReportFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// PolicyConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    /// Every implementation change must be preceded by a failing test.
    #[default]
    Strict,
    /// A green suite also permits implementation changes.
    Lenient,
}

impl PolicyMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PolicyMode::Strict => "strict",
            PolicyMode::Lenient => "lenient",
        }
    }
}

impl fmt::Display for PolicyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PolicyMode {
    type Err = GateError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "strict" => Ok(PolicyMode::Strict),
            "lenient" => Ok(PolicyMode::Lenient),
            _ => Err(GateError::InvalidMode(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub mode: PolicyMode,
    /// A red record older than this no longer authorizes implementation writes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_record_age_minutes: Option<u32>,
}

// ---------------------------------------------------------------------------
// TestFilesConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestFilesConfig {
    /// Regexes matched against the root-relative, forward-slash path.
    #[serde(default = "default_test_patterns")]
    pub patterns: Vec<String>,
}

fn default_test_patterns() -> Vec<String> {
    [
        r"(^|/)__tests__/",
        r"\.(test|spec)\.[cm]?[jt]sx?$",
        r"(^|/)tests?/",
        r"_test\.(go|py|rs)$",
        r"(^|/)test_[^/]*\.py$",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for TestFilesConfig {
    fn default() -> Self {
        Self {
            patterns: default_test_patterns(),
        }
    }
}

// ---------------------------------------------------------------------------
// RunnerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default)]
    pub format: ReportFormat,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
}

fn default_timeout() -> u32 {
    300
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            command: None,
            format: ReportFormat::default(),
            timeout_seconds: default_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session-start sources (`startup`, `resume`, `clear`, `compact`) that
    /// discard the stored test run.
    #[serde(default = "default_reset_sources")]
    pub reset_sources: Vec<String>,
}

fn default_reset_sources() -> Vec<String> {
    vec!["clear".to_string()]
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reset_sources: default_reset_sources(),
        }
    }
}

impl SessionConfig {
    pub fn resets_on(&self, source: &str) -> bool {
        self.reset_sources.iter().any(|s| s == source)
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub test_files: TestFilesConfig,
    /// Globs for non-test infrastructure files (config, docs) exempt from the guard.
    #[serde(default = "default_allow_list")]
    pub allow_list: Vec<String>,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

fn default_version() -> u32 {
    1
}

fn default_enabled() -> bool {
    true
}

fn default_allow_list() -> Vec<String> {
    [
        "*.md",
        "*.json",
        "*.yaml",
        "*.yml",
        "*.toml",
        ".gitignore",
        "docs/**",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            enabled: default_enabled(),
            policy: PolicyConfig::default(),
            test_files: TestFilesConfig::default(),
            allow_list: default_allow_list(),
            runner: RunnerConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl Config {
    /// Load `.tddgate/config.yaml`, falling back to defaults when absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.test_files.patterns.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "test_files.patterns is empty: no file counts as a test".to_string(),
            });
        }
        for pattern in &self.test_files.patterns {
            if let Err(e) = regex::Regex::new(pattern) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("invalid regex '{pattern}' in test_files.patterns: {e}"),
                });
            }
        }

        for glob in &self.allow_list {
            if let Err(e) = glob::Pattern::new(glob) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("invalid glob '{glob}' in allow_list: {}", e.msg),
                });
            }
        }

        if self.runner.timeout_seconds == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "runner.timeout_seconds must be greater than 0".to_string(),
            });
        }
        if let Some(cmd) = &self.runner.command {
            if cmd.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: "runner.command is empty".to_string(),
                });
            }
        }

        if self.policy.max_record_age_minutes == Some(0) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "policy.max_record_age_minutes is 0: every red record is stale"
                    .to_string(),
            });
        }

        const SOURCES: [&str; 4] = ["startup", "resume", "clear", "compact"];
        for source in &self.session.reset_sources {
            if !SOURCES.contains(&source.as_str()) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("unknown session source '{source}' in session.reset_sources"),
                });
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
