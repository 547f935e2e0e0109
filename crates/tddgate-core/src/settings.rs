//! Registration of the tddgate hooks in `.claude/settings.json`.

use crate::error::{GateError, Result};
use crate::io;
use crate::paths;
use serde_json::{json, Map, Value};
use std::path::Path;

pub const PRE_TOOL_USE_COMMAND: &str = "tddgate hook pre-tool-use";
pub const SESSION_START_COMMAND: &str = "tddgate hook session-start";

const PRE_TOOL_USE_MATCHER: &str = "Write|Edit|MultiEdit|NotebookEdit";
const SESSION_START_MATCHER: &str = "startup|resume|clear";

/// Add the pre-tool-use and session-start hooks to the project's host
/// settings, keeping every other setting. Returns true if the file changed.
pub fn install_hooks(root: &Path) -> Result<bool> {
    let path = paths::claude_settings_path(root);
    let mut settings = if path.exists() {
        let data = std::fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_str(&data)?
        }
    } else {
        Value::Object(Map::new())
    };

    let changed = merge_hooks(&mut settings)?;
    if changed {
        let mut data = serde_json::to_string_pretty(&settings)?;
        data.push('\n');
        io::atomic_write(&path, data.as_bytes())?;
    }
    Ok(changed)
}

/// True when both hook commands are present in `settings`.
pub fn hooks_installed(settings: &Value) -> bool {
    has_command(settings, "PreToolUse", PRE_TOOL_USE_COMMAND)
        && has_command(settings, "SessionStart", SESSION_START_COMMAND)
}

fn merge_hooks(settings: &mut Value) -> Result<bool> {
    let mut changed = false;
    for (event, matcher, command) in [
        ("PreToolUse", PRE_TOOL_USE_MATCHER, PRE_TOOL_USE_COMMAND),
        ("SessionStart", SESSION_START_MATCHER, SESSION_START_COMMAND),
    ] {
        if has_command(settings, event, command) {
            continue;
        }
        let root = settings.as_object_mut().ok_or_else(|| {
            GateError::InvalidSettings("settings.json is not a JSON object".to_string())
        })?;
        let hooks = root
            .entry("hooks")
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or_else(|| {
                GateError::InvalidSettings("settings.json 'hooks' is not an object".to_string())
            })?;
        let entries = hooks
            .entry(event)
            .or_insert_with(|| Value::Array(Vec::new()))
            .as_array_mut()
            .ok_or_else(|| {
                GateError::InvalidSettings(format!("settings.json 'hooks.{event}' is not an array"))
            })?;
        entries.push(json!({
            "matcher": matcher,
            "hooks": [{ "type": "command", "command": command }]
        }));
        changed = true;
    }
    Ok(changed)
}

fn has_command(settings: &Value, event: &str, command: &str) -> bool {
    settings
        .get("hooks")
        .and_then(|h| h.get(event))
        .and_then(Value::as_array)
        .is_some_and(|entries| {
            entries.iter().any(|entry| {
                entry
                    .get("hooks")
                    .and_then(Value::as_array)
                    .is_some_and(|hs| {
                        hs.iter()
                            .any(|h| h.get("command").and_then(Value::as_str) == Some(command))
                    })
            })
        })
}
