use anyhow::Context;
use std::path::Path;
use tddgate_core::{config::Config, io, paths, settings};

pub fn run(root: &Path, install_hooks: bool) -> anyhow::Result<()> {
    println!("Initializing tddgate in: {}", root.display());

    // 1. .tddgate/ directory
    let gate_dir = paths::gate_dir(root);
    io::ensure_dir(&gate_dir)
        .with_context(|| format!("failed to create {}", gate_dir.display()))?;

    // 2. config.yaml if missing
    let config_path = paths::config_path(root);
    let default_config = serde_yaml::to_string(&Config::default())?;
    if io::write_if_missing(&config_path, default_config.as_bytes())
        .context("failed to write config.yaml")?
    {
        println!("  created: {}", paths::CONFIG_FILE);
    } else {
        Config::load(root).context("existing config.yaml is invalid")?;
        println!("  exists:  {}", paths::CONFIG_FILE);
    }

    // 3. Keep the test state out of version control
    if io::ensure_gitignore_entry(root, paths::STATE_FILE).context("failed to update .gitignore")?
    {
        println!("  updated: .gitignore ({})", paths::STATE_FILE);
    }

    // 4. Host hooks
    if install_hooks {
        let changed = settings::install_hooks(root)
            .with_context(|| format!("failed to update {}", paths::CLAUDE_SETTINGS_FILE))?;
        if changed {
            println!("  updated: {} (PreToolUse, SessionStart)", paths::CLAUDE_SETTINGS_FILE);
        } else {
            println!("  exists:  {} hooks", paths::CLAUDE_SETTINGS_FILE);
        }
    }

    println!();
    println!("Next: run your tests through `tddgate run -- <test command>` or pipe a");
    println!("report into `tddgate report`. Until a failing test is recorded,");
    println!("implementation writes are blocked.");
    Ok(())
}
