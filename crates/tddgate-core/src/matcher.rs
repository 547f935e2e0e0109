use crate::config::Config;
use crate::error::{GateError, Result};
use glob::{MatchOptions, Pattern};
use regex::Regex;

/// Compiled test-file patterns and allow-list globs.
///
/// Paths are expected in the root-relative, forward-slash form produced by
/// [`crate::paths::relative_target`].
#[derive(Debug, Clone)]
pub struct FileMatcher {
    test_patterns: Vec<Regex>,
    allow_list: Vec<Pattern>,
}

const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

impl FileMatcher {
    pub fn new<S: AsRef<str>>(test_patterns: &[S], allow_list: &[S]) -> Result<Self> {
        let test_patterns = test_patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|e| GateError::InvalidPattern {
                    pattern: p.as_ref().to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let allow_list = allow_list
            .iter()
            .map(|g| {
                Pattern::new(g.as_ref()).map_err(|e| GateError::InvalidGlob {
                    pattern: g.as_ref().to_string(),
                    reason: e.msg.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            test_patterns,
            allow_list,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.test_files.patterns, &config.allow_list)
    }

    pub fn is_test_file(&self, path: &str) -> bool {
        !path.is_empty() && self.test_patterns.iter().any(|re| re.is_match(path))
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        !path.is_empty()
            && self
                .allow_list
                .iter()
                .any(|g| g.matches_with(path, GLOB_OPTIONS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> FileMatcher {
        FileMatcher::from_config(&Config::default()).unwrap()
    }

    #[test]
    fn default_patterns_recognize_test_files() {
        let m = defaults();
        for path in [
            "src/__tests__/greeting.test.ts",
            "src/__tests__/helpers.ts",
            "src/Greeting.test.tsx",
            "lib/math.spec.js",
            "tests/integration.rs",
            "pkg/handler_test.go",
            "app/test_models.py",
            "src/util.test.mjs",
        ] {
            assert!(m.is_test_file(path), "expected test file: {path}");
        }
    }

    #[test]
    fn default_patterns_reject_implementation_files() {
        let m = defaults();
        for path in [
            "app.ts",
            "src/Greeting.tsx",
            "src/NewFeature.ts",
            "src/testing.ts",
            "src/contest/entry.rs",
            "latest/index.js",
        ] {
            assert!(!m.is_test_file(path), "expected implementation file: {path}");
        }
    }

    #[test]
    fn allow_list_matches_infrastructure() {
        let m = defaults();
        assert!(m.is_exempt("README.md"));
        assert!(m.is_exempt("docs/guide/setup.txt"));
        assert!(m.is_exempt("package.json"));
        assert!(m.is_exempt("config/app.yaml"));
        assert!(m.is_exempt(".gitignore"));
        assert!(!m.is_exempt("src/x.ts"));
        assert!(!m.is_exempt(""));
    }

    #[test]
    fn invalid_regex_is_reported() {
        let err = FileMatcher::new(&["(unclosed"], &[]).unwrap_err();
        assert!(matches!(err, GateError::InvalidPattern { .. }));
    }

    #[test]
    fn invalid_glob_is_reported() {
        let err = FileMatcher::new(&[r"\.test\."], &["["]).unwrap_err();
        assert!(matches!(err, GateError::InvalidGlob { .. }));
    }

    #[test]
    fn custom_patterns() {
        let m = FileMatcher::new(&[r"^spec/"], &["Makefile"]).unwrap();
        assert!(m.is_test_file("spec/models/user_spec.rb"));
        assert!(!m.is_test_file("src/__tests__/a.test.ts"));
        assert!(m.is_exempt("Makefile"));
        assert!(!m.is_exempt("README.md"));
    }
}
