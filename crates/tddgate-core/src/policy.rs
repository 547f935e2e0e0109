//! Write policy: decides whether a file mutation may proceed given the
//! latest test run.
//!
//! [`decide`] is pure. Everything it depends on (the request, the record,
//! the policy settings and the request time) is passed in, so the same
//! inputs always produce the same decision.

use crate::config::{PolicyConfig, PolicyMode};
use crate::matcher::FileMatcher;
use crate::paths;
use crate::record::{TestRunRecord, TestStatus};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

// ---------------------------------------------------------------------------
// WriteRequest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteRequest {
    pub target_path: String,
    pub is_test_file: bool,
    pub is_exempt: bool,
    /// Target is one of the guard's own files.
    #[serde(default)]
    pub is_protected: bool,
    pub requested_at: DateTime<Utc>,
}

impl WriteRequest {
    /// Classify `target` (absolute or root-relative) against `matcher`.
    pub fn classify(
        root: &Path,
        target: &str,
        matcher: &FileMatcher,
        requested_at: DateTime<Utc>,
    ) -> Self {
        let target_path = paths::relative_target(root, target);
        Self {
            is_test_file: matcher.is_test_file(&target_path),
            is_exempt: matcher.is_exempt(&target_path),
            is_protected: paths::is_protected(&target_path),
            target_path,
            requested_at,
        }
    }
}

// ---------------------------------------------------------------------------
// PolicyDecision
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Allow,
    Deny,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Allow => "allow",
            Outcome::Deny => "deny",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub outcome: Outcome,
    pub reason: String,
    /// Stable identifier of the rule that produced this decision.
    pub rule: String,
}

impl PolicyDecision {
    pub fn allow(rule: &str, reason: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Allow,
            reason: reason.into(),
            rule: rule.to_string(),
        }
    }

    pub fn deny(rule: &str, reason: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Deny,
            reason: reason.into(),
            rule: rule.to_string(),
        }
    }

    pub fn is_allow(&self) -> bool {
        self.outcome == Outcome::Allow
    }

    /// Denial for a request that cannot be evaluated at all.
    pub fn invalid(detail: &str) -> Self {
        Self::deny("invalid_request", format!("invalid request: {detail}"))
    }
}

// ---------------------------------------------------------------------------
// decide
// ---------------------------------------------------------------------------

pub fn decide(
    request: &WriteRequest,
    record: &TestRunRecord,
    policy: &PolicyConfig,
) -> PolicyDecision {
    let target = request.target_path.trim();
    if target.is_empty() {
        return PolicyDecision::invalid("empty target path");
    }

    if request.is_protected {
        return PolicyDecision::deny(
            "protected_path",
            format!(
                "{target} belongs to tddgate; record test runs with \
                 `tddgate report` or `tddgate run`"
            ),
        );
    }

    if request.is_test_file {
        return PolicyDecision::allow(
            "test_file",
            format!("{target} is a test file; tests are never blocked"),
        );
    }

    if request.is_exempt {
        return PolicyDecision::allow(
            "allow_list",
            format!("{target} matches the allow-list"),
        );
    }

    match record.status {
        TestStatus::Missing => PolicyDecision::deny(
            "no_tests",
            format!(
                "no tests have been run yet. Write a failing test for {target} \
                 and run the suite before changing implementation code"
            ),
        ),
        TestStatus::Passing => match policy.mode {
            PolicyMode::Strict => PolicyDecision::deny(
                "green_state",
                format!(
                    "all tests are passing and no failing test precedes this change. \
                     Add a failing test that {target} should satisfy first"
                ),
            ),
            PolicyMode::Lenient => PolicyDecision::allow(
                "green_state",
                "tests are passing; lenient policy permits changes",
            ),
        },
        TestStatus::Failing | TestStatus::Error => {
            if let Some(max_age) = policy.max_record_age_minutes {
                let age = request.requested_at - record.timestamp;
                if age > Duration::minutes(i64::from(max_age)) {
                    return PolicyDecision::deny(
                        "stale_record",
                        format!(
                            "the last test run is {} minutes old (limit {max_age}). \
                             Re-run the tests before changing {target}",
                            age.num_minutes()
                        ),
                    );
                }
            }
            PolicyDecision::allow("red_state", red_reason(record))
        }
    }
}

fn red_reason(record: &TestRunRecord) -> String {
    match (record.status, record.failing_tests.len()) {
        (TestStatus::Error, _) => {
            "the test suite errored; implementation work may proceed to fix it".to_string()
        }
        (_, 0) => "tests are failing; implementation work is permitted".to_string(),
        (_, 1) => {
            let id = record
                .failing_tests
                .iter()
                .next()
                .map(String::as_str)
                .unwrap_or_default();
            format!("failing test present ({id}); implementation work is permitted")
        }
        (_, n) => format!("{n} failing tests present; implementation work is permitted"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn request(path: &str) -> WriteRequest {
        let matcher = FileMatcher::from_config(&Config::default()).unwrap();
        WriteRequest::classify(Path::new("/work/app"), path, &matcher, now())
    }

    fn strict() -> PolicyConfig {
        PolicyConfig::default()
    }

    fn all_records() -> Vec<TestRunRecord> {
        vec![
            TestRunRecord::missing(),
            TestRunRecord::passing(now()),
            TestRunRecord::failing(now(), ["renders greeting".to_string()]),
            TestRunRecord::error(now(), "runner crashed"),
        ]
    }

    #[test]
    fn test_files_always_allowed() {
        let lenient = PolicyConfig {
            mode: PolicyMode::Lenient,
            max_record_age_minutes: Some(1),
        };
        for record in all_records() {
            for policy in [strict(), lenient.clone()] {
                let d = decide(&request("src/__tests__/greeting.test.ts"), &record, &policy);
                assert_eq!(d.outcome, Outcome::Allow, "status {}", record.status);
                assert_eq!(d.rule, "test_file");
            }
        }
    }

    #[test]
    fn guard_files_denied_in_every_state() {
        let lenient = PolicyConfig {
            mode: PolicyMode::Lenient,
            max_record_age_minutes: None,
        };
        for path in [
            ".tddgate/test-run.json",
            ".tddgate/config.yaml",
            "/work/app/.claude/settings.json",
        ] {
            let req = request(path);
            assert!(req.is_exempt, "{path} should still match the default allow-list");
            for record in all_records() {
                for policy in [strict(), lenient.clone()] {
                    let d = decide(&req, &record, &policy);
                    assert_eq!(d.outcome, Outcome::Deny, "{path} with {}", record.status);
                    assert_eq!(d.rule, "protected_path");
                }
            }
        }
    }

    #[test]
    fn missing_state_denies_non_test_files() {
        for path in ["app.ts", "src/x.ts", "/work/app/src/lib/util.rs"] {
            let d = decide(&request(path), &TestRunRecord::missing(), &strict());
            assert_eq!(d.outcome, Outcome::Deny);
            assert!(d.reason.contains("no tests"), "reason: {}", d.reason);
        }
    }

    #[test]
    fn passing_state_denies_under_strict() {
        let d = decide(
            &request("src/NewFeature.ts"),
            &TestRunRecord::passing(now()),
            &strict(),
        );
        assert_eq!(d.outcome, Outcome::Deny);
        assert_eq!(d.rule, "green_state");
        assert!(d.reason.contains("failing test"));
    }

    #[test]
    fn passing_state_allows_under_lenient() {
        let policy = PolicyConfig {
            mode: PolicyMode::Lenient,
            max_record_age_minutes: None,
        };
        let d = decide(
            &request("src/NewFeature.ts"),
            &TestRunRecord::passing(now()),
            &policy,
        );
        assert!(d.is_allow());
    }

    #[test]
    fn failing_state_allows_implementation() {
        let record = TestRunRecord::failing(now(), ["renders greeting".to_string()]);
        let d = decide(&request("src/Greeting.tsx"), &record, &strict());
        assert!(d.is_allow());
        assert_eq!(d.rule, "red_state");
        assert!(d.reason.contains("renders greeting"));
    }

    #[test]
    fn error_state_treated_like_failing() {
        let d = decide(
            &request("src/Greeting.tsx"),
            &TestRunRecord::error(now(), "timed out after 300s"),
            &strict(),
        );
        assert!(d.is_allow());
        assert_eq!(d.rule, "red_state");
    }

    #[test]
    fn stale_red_record_is_denied() {
        let policy = PolicyConfig {
            mode: PolicyMode::Strict,
            max_record_age_minutes: Some(30),
        };
        let old = TestRunRecord::failing(now() - Duration::minutes(45), ["t".to_string()]);
        let d = decide(&request("src/Greeting.tsx"), &old, &policy);
        assert_eq!(d.outcome, Outcome::Deny);
        assert_eq!(d.rule, "stale_record");
        assert!(d.reason.contains("45 minutes"));

        let fresh = TestRunRecord::failing(now() - Duration::minutes(10), ["t".to_string()]);
        assert!(decide(&request("src/Greeting.tsx"), &fresh, &policy).is_allow());
    }

    #[test]
    fn allow_list_exempts_infrastructure() {
        let d = decide(&request("README.md"), &TestRunRecord::missing(), &strict());
        assert!(d.is_allow());
        assert_eq!(d.rule, "allow_list");
    }

    #[test]
    fn empty_path_is_invalid() {
        for path in ["", "   "] {
            let d = decide(&request(path), &TestRunRecord::passing(now()), &strict());
            assert_eq!(d.outcome, Outcome::Deny);
            assert!(d.reason.starts_with("invalid request"));
        }
    }

    #[test]
    fn decision_is_deterministic() {
        let req = request("src/Greeting.tsx");
        let record = TestRunRecord::failing(now(), ["a".to_string(), "b".to_string()]);
        let first = decide(&req, &record, &strict());
        let second = decide(&req, &record, &strict());
        assert_eq!(first, second);
        assert!(first.reason.contains("2 failing tests"));
    }

    #[test]
    fn classify_normalizes_absolute_paths() {
        let req = request("/work/app/src/__tests__/greeting.test.ts");
        assert_eq!(req.target_path, "src/__tests__/greeting.test.ts");
        assert!(req.is_test_file);
        assert!(!req.is_exempt);
    }
}
