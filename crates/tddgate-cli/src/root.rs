use std::path::{Path, PathBuf};

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `TDDGATE_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `start` (default: cwd) looking for `.tddgate/`
/// 3. Walk upward from `start` looking for `.git/`
/// 4. Fall back to `start`
pub fn resolve_root(explicit: Option<&Path>, start: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }

    let start = match start {
        Some(s) => s.to_path_buf(),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };

    find_upward(&start, ".tddgate")
        .or_else(|| find_upward(&start, ".git"))
        .unwrap_or(start)
}

fn find_upward(start: &Path, marker: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(marker).is_dir())
        .map(Path::to_path_buf)
}
