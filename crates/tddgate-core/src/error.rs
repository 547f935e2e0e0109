use thiserror::Error;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("invalid test file pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid allow-list glob '{pattern}': {reason}")]
    InvalidGlob { pattern: String, reason: String },

    #[error("invalid report format: {0} (expected jest-json or libtest)")]
    InvalidFormat(String),

    #[error("invalid test report: {0}")]
    InvalidReport(String),

    #[error("coverage value for {metric} out of range: {value}")]
    CoverageOutOfRange { metric: String, value: f64 },

    #[error("invalid policy mode: {0} (expected strict or lenient)")]
    InvalidMode(String),

    #[error("invalid host settings: {0}")]
    InvalidSettings(String),

    #[error("no test command configured: set runner.command in .tddgate/config.yaml")]
    NoTestCommand,

    #[error("failed to spawn test command: {0}")]
    RunnerSpawn(String),

    #[error("failed to read test output: {0}")]
    RunnerOutput(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GateError>;
