//! Host hook protocol and the write interceptor.
//!
//! The host runs `tddgate hook <event>` once per event, passing a JSON
//! document on stdin. For `PreToolUse` a denial is answered with a
//! `hookSpecificOutput` document on stdout; an allowed call produces no
//! output so the host proceeds unchanged.

use crate::config::Config;
use crate::error::Result;
use crate::io;
use crate::matcher::FileMatcher;
use crate::paths;
use crate::policy::{self, Outcome, PolicyDecision, WriteRequest};
use crate::store::StateStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Tools that create or modify files.
pub const WRITE_TOOLS: [&str; 4] = ["Write", "Edit", "MultiEdit", "NotebookEdit"];

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HookInput {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub hook_event_name: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: serde_json::Value,
    /// Session-start origin: `startup`, `resume`, `clear` or `compact`.
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteTarget<'a> {
    NotAWrite,
    Path(&'a str),
    MissingPath,
}

impl HookInput {
    pub fn parse(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn write_target(&self) -> WriteTarget<'_> {
        let Some(tool) = self.tool_name.as_deref() else {
            return WriteTarget::NotAWrite;
        };
        if !WRITE_TOOLS.contains(&tool) {
            return WriteTarget::NotAWrite;
        }
        let key = if tool == "NotebookEdit" {
            "notebook_path"
        } else {
            "file_path"
        };
        match self.tool_input.get(key).and_then(|v| v.as_str()) {
            Some(p) if !p.trim().is_empty() => WriteTarget::Path(p),
            _ => WriteTarget::MissingPath,
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookOutput {
    pub hook_specific_output: PreToolUseOutput,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreToolUseOutput {
    pub hook_event_name: &'static str,
    pub permission_decision: Outcome,
    pub permission_decision_reason: String,
}

impl HookOutput {
    pub fn from_decision(decision: &PolicyDecision) -> Self {
        Self {
            hook_specific_output: PreToolUseOutput {
                hook_event_name: "PreToolUse",
                permission_decision: decision.outcome,
                permission_decision_reason: format!("tddgate: {}", decision.reason),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Interceptor
// ---------------------------------------------------------------------------

/// Consults the policy for each write tool call.
pub struct Interceptor<'a, S: StateStore + ?Sized> {
    root: &'a Path,
    config: &'a Config,
    store: &'a S,
}

impl<'a, S: StateStore + ?Sized> Interceptor<'a, S> {
    pub fn new(root: &'a Path, config: &'a Config, store: &'a S) -> Self {
        Self {
            root,
            config,
            store,
        }
    }

    /// Decide a `PreToolUse` call. `None` means the call is not gated
    /// (not a write tool, or the guard is switched off).
    pub fn pre_tool_use(&self, input: &HookInput, now: DateTime<Utc>) -> Option<PolicyDecision> {
        let path = match input.write_target() {
            WriteTarget::NotAWrite => {
                debug!(tool = ?input.tool_name, "not a write tool, passing through");
                return None;
            }
            _ if !self.config.enabled => {
                debug!(tool = ?input.tool_name, "guard disabled, passing through");
                return None;
            }
            WriteTarget::MissingPath => {
                return Some(PolicyDecision::invalid("write tool call without a file path"))
            }
            WriteTarget::Path(p) => p,
        };
        Some(self.check_path(path, now))
    }

    /// Decide a write to `target` directly.
    pub fn check_path(&self, target: &str, now: DateTime<Utc>) -> PolicyDecision {
        let matcher = match FileMatcher::from_config(self.config) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "invalid test file configuration");
                return PolicyDecision::deny(
                    "invalid_config",
                    format!("configuration error: {e}"),
                );
            }
        };
        let request = WriteRequest::classify(self.root, target, &matcher, now);
        let record = self.store.latest();
        let decision = policy::decide(&request, &record, &self.config.policy);
        info!(
            path = %request.target_path,
            status = %record.status,
            outcome = %decision.outcome,
            rule = %decision.rule,
            "write evaluated"
        );
        decision
    }
}

// ---------------------------------------------------------------------------
// Session start
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStart {
    pub reset: bool,
}

/// Prepare `.tddgate/` for a new session: create the directory, keep the
/// state file out of version control, and discard the stored run when the
/// session source is configured to reset.
pub fn session_start<S: StateStore + ?Sized>(
    root: &Path,
    input: &HookInput,
    config: &Config,
    store: &S,
) -> Result<SessionStart> {
    io::ensure_dir(&paths::gate_dir(root))?;
    io::ensure_gitignore_entry(root, paths::STATE_FILE)?;

    let reset = input
        .source
        .as_deref()
        .is_some_and(|s| config.session.resets_on(s));
    if reset {
        store.clear()?;
        info!(source = ?input.source, "session reset, test state cleared");
    }
    Ok(SessionStart { reset })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
