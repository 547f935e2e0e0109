use anyhow::Context;
use std::path::Path;
use tddgate_core::config::Config;

pub fn run(root: &Path, enabled: bool) -> anyhow::Result<()> {
    let mut config = Config::load(root).context("failed to load config")?;
    config.enabled = enabled;
    config.save(root).context("failed to write config.yaml")?;
    println!("tddgate {}", if enabled { "enabled" } else { "disabled" });
    Ok(())
}
