use crate::root::resolve_root;
use anyhow::Context;
use chrono::Utc;
use clap::Subcommand;
use std::io::Read;
use std::path::Path;
use tddgate_core::{
    config::Config,
    hook::{self, HookInput, HookOutput, Interceptor, WriteTarget},
    policy::PolicyDecision,
    store::FileStore,
};
use tracing::{debug, warn};

#[derive(Subcommand)]
pub enum HookEvent {
    /// Gate a file-writing tool call (PreToolUse)
    PreToolUse,
    /// Prepare test state bookkeeping for a new session (SessionStart)
    SessionStart,
}

pub fn run(explicit_root: Option<&Path>, event: HookEvent) -> anyhow::Result<()> {
    let mut raw = String::new();
    let read = std::io::stdin().read_to_string(&mut raw).map(|_| raw);
    match event {
        HookEvent::PreToolUse => pre_tool_use(explicit_root, read),
        HookEvent::SessionStart => session_start(explicit_root, read),
    }
}

// ---------------------------------------------------------------------------
// pre-tool-use
// ---------------------------------------------------------------------------

fn pre_tool_use(explicit_root: Option<&Path>, raw: std::io::Result<String>) -> anyhow::Result<()> {
    let input = match raw
        .map_err(anyhow::Error::from)
        .and_then(|data| HookInput::parse(&data).map_err(anyhow::Error::from))
    {
        Ok(input) => input,
        Err(e) => {
            warn!(error = %e, "unreadable hook input");
            return deny(&PolicyDecision::invalid("unreadable hook input"));
        }
    };

    if input.write_target() == WriteTarget::NotAWrite {
        debug!(tool = ?input.tool_name, "not a write tool");
        return Ok(());
    }

    let root = resolve_root(explicit_root, input.cwd.as_deref());
    let config = match Config::load(&root) {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "config unreadable");
            return deny(&PolicyDecision::deny(
                "invalid_config",
                format!("configuration error: {e}"),
            ));
        }
    };
    let store = FileStore::for_root(&root);

    match Interceptor::new(&root, &config, &store).pre_tool_use(&input, Utc::now()) {
        Some(decision) if !decision.is_allow() => deny(&decision),
        _ => Ok(()),
    }
}

/// Answer the host with a denial. Allowed calls print nothing.
fn deny(decision: &PolicyDecision) -> anyhow::Result<()> {
    let out = serde_json::to_string(&HookOutput::from_decision(decision))?;
    println!("{out}");
    Ok(())
}

// ---------------------------------------------------------------------------
// session-start
// ---------------------------------------------------------------------------

fn session_start(explicit_root: Option<&Path>, raw: std::io::Result<String>) -> anyhow::Result<()> {
    let input = raw
        .ok()
        .and_then(|data| HookInput::parse(&data).ok())
        .unwrap_or_default();
    let root = resolve_root(explicit_root, input.cwd.as_deref());
    let config = Config::load(&root).unwrap_or_else(|e| {
        warn!(error = %e, "config unreadable, using defaults");
        Config::default()
    });
    let store = FileStore::for_root(&root);
    hook::session_start(&root, &input, &config, &store)
        .with_context(|| format!("failed to prepare {}", root.display()))?;
    Ok(())
}
