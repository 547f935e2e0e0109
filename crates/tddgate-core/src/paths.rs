use std::path::{Component, Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const GATE_DIR: &str = ".tddgate";
pub const CONFIG_FILE: &str = ".tddgate/config.yaml";
pub const STATE_FILE: &str = ".tddgate/test-run.json";

pub const CLAUDE_DIR: &str = ".claude";
pub const CLAUDE_SETTINGS_FILE: &str = ".claude/settings.json";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn gate_dir(root: &Path) -> PathBuf {
    root.join(GATE_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn state_path(root: &Path) -> PathBuf {
    root.join(STATE_FILE)
}

pub fn claude_settings_path(root: &Path) -> PathBuf {
    root.join(CLAUDE_SETTINGS_FILE)
}

/// Host settings files that carry the hook registration.
const HOST_SETTINGS_FILES: [&str; 2] = [CLAUDE_SETTINGS_FILE, ".claude/settings.local.json"];

/// True for root-relative paths the guard itself owns: anything under
/// `.tddgate/` and the host settings that register the hooks. Only tddgate
/// commands may write these.
pub fn is_protected(relative: &str) -> bool {
    relative == GATE_DIR
        || relative
            .strip_prefix(GATE_DIR)
            .is_some_and(|rest| rest.starts_with('/'))
        || HOST_SETTINGS_FILES.contains(&relative)
}

/// Normalize a write target to a forward-slash path relative to `root`.
///
/// Absolute paths under `root` are stripped to their relative form; paths
/// outside `root` are kept absolute. `.` components are dropped and `..`
/// pops the previous component where possible.
pub fn relative_target(root: &Path, target: &str) -> String {
    let target = target.trim();
    if target.is_empty() {
        return String::new();
    }
    let path = Path::new(target);
    let rel = path.strip_prefix(root).unwrap_or(path);

    let mut parts: Vec<String> = Vec::new();
    let mut absolute = false;
    for component in rel.components() {
        match component {
            Component::RootDir => absolute = true,
            Component::Prefix(p) => parts.push(p.as_os_str().to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.last().is_some_and(|p| p != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..".to_string());
                }
            }
            Component::Normal(s) => parts.push(s.to_string_lossy().replace('\\', "/")),
        }
    }

    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
