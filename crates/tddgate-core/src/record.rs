use crate::error::{GateError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ---------------------------------------------------------------------------
// TestStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Passing,
    Failing,
    Error,
    Missing,
}

impl TestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TestStatus::Passing => "passing",
            TestStatus::Failing => "failing",
            TestStatus::Error => "error",
            TestStatus::Missing => "missing",
        }
    }

    /// A red state: at least one test fails, or the suite could not run.
    pub fn is_red(self) -> bool {
        matches!(self, TestStatus::Failing | TestStatus::Error)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Coverage
// ---------------------------------------------------------------------------

/// Percentages in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coverage {
    pub lines: f64,
    pub branches: f64,
    pub functions: f64,
    pub statements: f64,
}

impl Coverage {
    pub fn new(lines: f64, branches: f64, functions: f64, statements: f64) -> Result<Self> {
        let cov = Self {
            lines,
            branches,
            functions,
            statements,
        };
        cov.validate()?;
        Ok(cov)
    }

    pub fn validate(&self) -> Result<()> {
        for (metric, value) in [
            ("lines", self.lines),
            ("branches", self.branches),
            ("functions", self.functions),
            ("statements", self.statements),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(GateError::CoverageOutOfRange {
                    metric: metric.to_string(),
                    value,
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TestRunRecord
// ---------------------------------------------------------------------------

/// Outcome of one test-suite execution. Each run supersedes the previous
/// record entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRunRecord {
    pub timestamp: DateTime<Utc>,
    pub status: TestStatus,
    #[serde(default)]
    pub failing_tests: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<Coverage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl TestRunRecord {
    /// Build a record for a completed run. A passing run never carries
    /// failing test ids.
    pub fn new(
        timestamp: DateTime<Utc>,
        status: TestStatus,
        failing_tests: impl IntoIterator<Item = String>,
    ) -> Self {
        let failing_tests = if status == TestStatus::Passing {
            BTreeSet::new()
        } else {
            failing_tests.into_iter().collect()
        };
        Self {
            timestamp,
            status,
            failing_tests,
            coverage: None,
            detail: None,
        }
    }

    pub fn passing(timestamp: DateTime<Utc>) -> Self {
        Self::new(timestamp, TestStatus::Passing, [])
    }

    pub fn failing(
        timestamp: DateTime<Utc>,
        failing_tests: impl IntoIterator<Item = String>,
    ) -> Self {
        Self::new(timestamp, TestStatus::Failing, failing_tests)
    }

    pub fn error(timestamp: DateTime<Utc>, detail: impl Into<String>) -> Self {
        Self::new(timestamp, TestStatus::Error, []).with_detail(detail)
    }

    /// Sentinel used when no run has been recorded or the record is unreadable.
    pub fn missing() -> Self {
        Self {
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            status: TestStatus::Missing,
            failing_tests: BTreeSet::new(),
            coverage: None,
            detail: None,
        }
    }

    pub fn with_coverage(mut self, coverage: Coverage) -> Self {
        self.coverage = Some(coverage);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn has_failing_tests(&self) -> bool {
        !self.failing_tests.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
