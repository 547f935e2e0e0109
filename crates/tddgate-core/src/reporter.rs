//! Test run reporting: turns test-runner output into a [`TestRunRecord`].
//!
//! Two result formats are understood:
//! - `jest-json`: the JSON document written by `jest --json` and
//!   `vitest run --reporter=json`.
//! - `libtest`: the plain-text output of `cargo test`.
//!
//! Coverage comes from an Istanbul `coverage-summary.json`.

use crate::error::{GateError, Result};
use crate::record::{Coverage, TestRunRecord, TestStatus};
use crate::runner::{self, RunOutput};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// ReportFormat
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportFormat {
    #[default]
    JestJson,
    Libtest,
}

impl ReportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportFormat::JestJson => "jest-json",
            ReportFormat::Libtest => "libtest",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = GateError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "jest-json" | "jest" | "vitest" => Ok(ReportFormat::JestJson),
            "libtest" | "cargo" => Ok(ReportFormat::Libtest),
            _ => Err(GateError::InvalidFormat(s.to_string())),
        }
    }
}

/// Parse a complete test report into a record stamped `completed_at`.
pub fn parse_report(
    format: ReportFormat,
    input: &str,
    completed_at: DateTime<Utc>,
) -> Result<TestRunRecord> {
    match format {
        ReportFormat::JestJson => parse_jest_json(input, completed_at),
        ReportFormat::Libtest => parse_libtest(input, completed_at),
    }
}

/// Build the record for a test command executed by [`crate::runner`].
///
/// Timeouts, unparseable output and a non-zero exit over an otherwise clean
/// report record `error`. A run that collected no tests stays `missing`.
pub fn record_from_run(
    format: ReportFormat,
    run: &RunOutput,
    completed_at: DateTime<Utc>,
) -> TestRunRecord {
    if run.timed_out {
        return TestRunRecord::error(
            completed_at,
            format!("timed out after {}s", run.duration.as_secs()),
        );
    }
    let parsed = match parse_report(format, &run.stdout, completed_at) {
        Ok(record) => record,
        Err(_) if run.truncated => {
            return TestRunRecord::error(
                completed_at,
                format!(
                    "test output exceeded {} MiB and could not be parsed",
                    runner::MAX_CAPTURE / (1024 * 1024)
                ),
            )
        }
        Err(e) => {
            return TestRunRecord::error(completed_at, format!("could not parse test output: {e}"))
        }
    };
    // No tests collected keeps the gate closed, whatever the exit code.
    if parsed.status == TestStatus::Missing {
        return parsed;
    }
    if !run.success && parsed.status == TestStatus::Passing {
        let code = run
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        return TestRunRecord::error(completed_at, format!("test command exited with {code}"));
    }
    parsed
}

// ---------------------------------------------------------------------------
// jest-json
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JestReport {
    #[serde(default)]
    num_total_tests: Option<u64>,
    #[serde(default)]
    num_runtime_error_test_suites: u64,
    #[serde(default)]
    test_results: Vec<JestSuite>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JestSuite {
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    assertion_results: Vec<JestAssertion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JestAssertion {
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    status: String,
}

fn parse_jest_json(input: &str, completed_at: DateTime<Utc>) -> Result<TestRunRecord> {
    // Runners invoked through npm scripts print a banner before the document.
    let start = input
        .find('{')
        .ok_or_else(|| GateError::InvalidReport("no JSON object found".to_string()))?;
    let report: JestReport = serde_json::Deserializer::from_str(&input[start..])
        .into_iter::<JestReport>()
        .next()
        .ok_or_else(|| GateError::InvalidReport("empty JSON report".to_string()))??;

    let mut failing = BTreeSet::new();
    let mut broken_suites = Vec::new();
    let mut assertions = 0u64;

    for suite in &report.test_results {
        let mut suite_failures = 0usize;
        for a in &suite.assertion_results {
            assertions += 1;
            if a.status == "failed" {
                suite_failures += 1;
                let id = if a.full_name.is_empty() {
                    a.title.clone()
                } else {
                    a.full_name.clone()
                };
                failing.insert(id);
            }
        }
        if suite.status == "failed" && suite_failures == 0 {
            broken_suites.push(suite);
        }
    }

    let total = report.num_total_tests.unwrap_or(assertions);
    let suite_errors = broken_suites
        .len()
        .max(report.num_runtime_error_test_suites as usize);

    let record = if !failing.is_empty() {
        let record = TestRunRecord::failing(completed_at, failing);
        if suite_errors > 0 {
            record.with_detail(format!("{suite_errors} test suite(s) failed to run"))
        } else {
            record
        }
    } else if suite_errors > 0 {
        let detail = broken_suites
            .first()
            .map(|s| suite_error_detail(s))
            .unwrap_or_else(|| format!("{suite_errors} test suite(s) failed to run"));
        TestRunRecord::error(completed_at, detail)
    } else if total == 0 {
        TestRunRecord::new(completed_at, TestStatus::Missing, []).with_detail("no tests found")
    } else {
        TestRunRecord::passing(completed_at)
    };
    Ok(record)
}

fn suite_error_detail(suite: &JestSuite) -> String {
    let first_line = suite
        .message
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("failed to run");
    format!("{}: {first_line}", suite.name)
}

// ---------------------------------------------------------------------------
// libtest
// ---------------------------------------------------------------------------

static LIBTEST_LINE_RE: OnceLock<Regex> = OnceLock::new();
static LIBTEST_RUNNING_RE: OnceLock<Regex> = OnceLock::new();

fn libtest_line_re() -> &'static Regex {
    LIBTEST_LINE_RE
        .get_or_init(|| Regex::new(r"^test (.+?) \.\.\. (ok|FAILED|ignored)").unwrap())
}

fn libtest_running_re() -> &'static Regex {
    LIBTEST_RUNNING_RE.get_or_init(|| Regex::new(r"^running \d+ tests?$").unwrap())
}

fn parse_libtest(input: &str, completed_at: DateTime<Utc>) -> Result<TestRunRecord> {
    let mut failing = BTreeSet::new();
    let mut results = 0usize;
    let mut saw_harness = false;
    let mut compile_error: Option<String> = None;

    for line in input.lines() {
        let line = line.trim_end();
        if let Some(caps) = libtest_line_re().captures(line) {
            results += 1;
            if &caps[2] == "FAILED" {
                failing.insert(caps[1].to_string());
            }
        } else if libtest_running_re().is_match(line) {
            saw_harness = true;
        } else if compile_error.is_none()
            && (line.starts_with("error[E") || line.starts_with("error: could not compile"))
        {
            compile_error = Some(line.to_string());
        }
    }

    if !failing.is_empty() {
        return Ok(TestRunRecord::failing(completed_at, failing));
    }
    if let Some(err) = compile_error {
        return Ok(TestRunRecord::error(completed_at, err));
    }
    if results > 0 {
        return Ok(TestRunRecord::passing(completed_at));
    }
    if saw_harness {
        return Ok(
            TestRunRecord::new(completed_at, TestStatus::Missing, []).with_detail("no tests found")
        );
    }
    Err(GateError::InvalidReport("no libtest output found".to_string()))
}

// ---------------------------------------------------------------------------
// Coverage
// ---------------------------------------------------------------------------

/// Read `total.{lines,branches,functions,statements}.pct` from an Istanbul
/// `coverage-summary.json`. Istanbul reports `"Unknown"` when nothing was
/// instrumented; that reads as 0.
pub fn parse_coverage_summary(input: &str) -> Result<Coverage> {
    let value: serde_json::Value = serde_json::from_str(input)?;
    let total = value
        .get("total")
        .ok_or_else(|| GateError::InvalidReport("coverage summary has no 'total'".to_string()))?;

    let pct = |metric: &str| -> Result<f64> {
        let entry = total.get(metric).ok_or_else(|| {
            GateError::InvalidReport(format!("coverage summary missing total.{metric}"))
        })?;
        match entry.get("pct") {
            Some(serde_json::Value::Number(n)) => n.as_f64().ok_or_else(|| {
                GateError::InvalidReport(format!("total.{metric}.pct is not a number"))
            }),
            Some(serde_json::Value::String(s)) if s == "Unknown" => Ok(0.0),
            _ => Err(GateError::InvalidReport(format!(
                "total.{metric}.pct is not a number"
            ))),
        }
    };

    Coverage::new(
        pct("lines")?,
        pct("branches")?,
        pct("functions")?,
        pct("statements")?,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    const JEST_FAILING: &str = r#"{
      "numTotalTests": 2,
      "numFailedTests": 1,
      "numRuntimeErrorTestSuites": 0,
      "success": false,
      "testResults": [{
        "name": "/app/src/__tests__/greeting.test.ts",
        "status": "failed",
        "message": "",
        "assertionResults": [
          {"fullName": "Greeting renders greeting", "title": "renders greeting", "status": "failed"},
          {"fullName": "Greeting renders name", "title": "renders name", "status": "passed"}
        ]
      }]
    }"#;

    #[test]
    fn jest_failing_assertions() {
        let rec = parse_report(ReportFormat::JestJson, JEST_FAILING, now()).unwrap();
        assert_eq!(rec.status, TestStatus::Failing);
        assert_eq!(
            rec.failing_tests.iter().collect::<Vec<_>>(),
            vec!["Greeting renders greeting"]
        );
        assert_eq!(rec.timestamp, now());
    }

    #[test]
    fn jest_passing() {
        let json = r#"{"numTotalTests":1,"testResults":[{"name":"a.test.ts","status":"passed",
            "assertionResults":[{"fullName":"adds","title":"adds","status":"passed"}]}]}"#;
        let rec = parse_report(ReportFormat::JestJson, json, now()).unwrap();
        assert_eq!(rec.status, TestStatus::Passing);
        assert!(rec.failing_tests.is_empty());
    }

    #[test]
    fn jest_suite_that_failed_to_run_is_error() {
        let json = r#"{"numTotalTests":0,"numRuntimeErrorTestSuites":1,"testResults":[
            {"name":"/app/src/__tests__/greeting.test.ts","status":"failed",
             "message":"\n  Cannot find module '../Greeting'\n","assertionResults":[]}]}"#;
        let rec = parse_report(ReportFormat::JestJson, json, now()).unwrap();
        assert_eq!(rec.status, TestStatus::Error);
        let detail = rec.detail.unwrap();
        assert!(detail.contains("greeting.test.ts"));
        assert!(detail.contains("Cannot find module"));
    }

    #[test]
    fn jest_no_tests_is_missing() {
        let json = r#"{"numTotalTests":0,"testResults":[]}"#;
        let rec = parse_report(ReportFormat::JestJson, json, now()).unwrap();
        assert_eq!(rec.status, TestStatus::Missing);
    }

    #[test]
    fn jest_tolerates_banner_and_trailing_text() {
        let input = format!(
            "> app@1.0.0 test\n> vitest run --reporter=json\n\n{JEST_FAILING}\nDone.\n"
        );
        let rec = parse_report(ReportFormat::JestJson, &input, now()).unwrap();
        assert_eq!(rec.status, TestStatus::Failing);
    }

    #[test]
    fn jest_garbage_is_invalid() {
        assert!(parse_report(ReportFormat::JestJson, "segfault", now()).is_err());
        assert!(parse_report(ReportFormat::JestJson, "{ truncated", now()).is_err());
    }

    const LIBTEST_OUTPUT: &str = "\
running 3 tests
test store::tests::roundtrip ... ok
test policy::tests::denies_missing ... FAILED
test slow ... ignored

failures:

---- policy::tests::denies_missing stdout ----
thread 'policy::tests::denies_missing' panicked at src/policy.rs:10:5

test result: FAILED. 1 passed; 1 failed; 1 ignored; 0 measured; 0 filtered out
";

    #[test]
    fn libtest_failures() {
        let rec = parse_report(ReportFormat::Libtest, LIBTEST_OUTPUT, now()).unwrap();
        assert_eq!(rec.status, TestStatus::Failing);
        assert!(rec.failing_tests.contains("policy::tests::denies_missing"));
        assert_eq!(rec.failing_tests.len(), 1);
    }

    #[test]
    fn libtest_all_ok() {
        let out = "running 1 test\ntest a ... ok\n\ntest result: ok. 1 passed; 0 failed\n";
        let rec = parse_report(ReportFormat::Libtest, out, now()).unwrap();
        assert_eq!(rec.status, TestStatus::Passing);
    }

    #[test]
    fn libtest_compile_error() {
        let out = "error[E0425]: cannot find value `x` in this scope\n\
                   error: could not compile `app`\n";
        let rec = parse_report(ReportFormat::Libtest, out, now()).unwrap();
        assert_eq!(rec.status, TestStatus::Error);
        assert!(rec.detail.unwrap().starts_with("error[E0425]"));
    }

    #[test]
    fn libtest_zero_tests_is_missing() {
        let out = "running 0 tests\n\ntest result: ok. 0 passed; 0 failed\n";
        let rec = parse_report(ReportFormat::Libtest, out, now()).unwrap();
        assert_eq!(rec.status, TestStatus::Missing);
    }

    #[test]
    fn libtest_unrecognized_output_is_invalid() {
        assert!(parse_report(ReportFormat::Libtest, "hello", now()).is_err());
    }

    #[test]
    fn format_from_str() {
        assert_eq!("jest-json".parse::<ReportFormat>().unwrap(), ReportFormat::JestJson);
        assert_eq!("vitest".parse::<ReportFormat>().unwrap(), ReportFormat::JestJson);
        assert_eq!("libtest".parse::<ReportFormat>().unwrap(), ReportFormat::Libtest);
        assert!("junit".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn coverage_summary_totals() {
        let json = r#"{"total":{
            "lines":{"total":10,"covered":8,"skipped":0,"pct":80},
            "statements":{"pct":79.5},
            "functions":{"pct":100},
            "branches":{"pct":"Unknown"}}}"#;
        let cov = parse_coverage_summary(json).unwrap();
        assert_eq!(cov.lines, 80.0);
        assert_eq!(cov.statements, 79.5);
        assert_eq!(cov.functions, 100.0);
        assert_eq!(cov.branches, 0.0);
    }

    #[test]
    fn coverage_summary_rejects_out_of_range() {
        let json = r#"{"total":{"lines":{"pct":120},"statements":{"pct":1},
            "functions":{"pct":1},"branches":{"pct":1}}}"#;
        assert!(matches!(
            parse_coverage_summary(json),
            Err(GateError::CoverageOutOfRange { .. })
        ));
    }

    #[test]
    fn coverage_summary_requires_total() {
        assert!(parse_coverage_summary("{}").is_err());
    }

    fn run_output(stdout: &str, success: bool, timed_out: bool) -> RunOutput {
        RunOutput {
            success,
            exit_code: if success { Some(0) } else { Some(1) },
            stdout: stdout.to_string(),
            stderr: String::new(),
            timed_out,
            truncated: false,
            duration: Duration::from_secs(5),
        }
    }

    #[test]
    fn run_timeout_records_error() {
        let rec = record_from_run(ReportFormat::Libtest, &run_output("", false, true), now());
        assert_eq!(rec.status, TestStatus::Error);
        assert_eq!(rec.detail.as_deref(), Some("timed out after 5s"));
    }

    #[test]
    fn run_crash_records_error() {
        let rec = record_from_run(
            ReportFormat::JestJson,
            &run_output("Segmentation fault", false, false),
            now(),
        );
        assert_eq!(rec.status, TestStatus::Error);
        assert!(rec.detail.unwrap().contains("could not parse"));
    }

    #[test]
    fn run_nonzero_exit_with_clean_report_records_error() {
        let out = "running 1 test\ntest a ... ok\n";
        let rec = record_from_run(ReportFormat::Libtest, &run_output(out, false, false), now());
        assert_eq!(rec.status, TestStatus::Error);
        assert_eq!(rec.detail.as_deref(), Some("test command exited with 1"));
    }

    #[test]
    fn run_without_tests_stays_missing_on_nonzero_exit() {
        let out = r#"{"numTotalTests":0,"testResults":[]}"#;
        let rec = record_from_run(ReportFormat::JestJson, &run_output(out, false, false), now());
        assert_eq!(rec.status, TestStatus::Missing);
        assert_eq!(rec.detail.as_deref(), Some("no tests found"));

        let out = "running 0 tests\n\ntest result: ok. 0 passed\n";
        let rec = record_from_run(ReportFormat::Libtest, &run_output(out, false, false), now());
        assert_eq!(rec.status, TestStatus::Missing);
    }

    #[test]
    fn run_truncated_output_names_the_limit() {
        let mut run = run_output(r#"{"numTotalTests":3,"testResults":[{"#, false, false);
        run.truncated = true;
        let rec = record_from_run(ReportFormat::JestJson, &run, now());
        assert_eq!(rec.status, TestStatus::Error);
        assert!(rec.detail.unwrap().contains("exceeded"));
    }

    #[test]
    fn run_failing_tests_keep_failing_status() {
        let rec = record_from_run(
            ReportFormat::Libtest,
            &run_output(LIBTEST_OUTPUT, false, false),
            now(),
        );
        assert_eq!(rec.status, TestStatus::Failing);
    }
}
