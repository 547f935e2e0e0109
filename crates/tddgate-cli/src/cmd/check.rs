use crate::output::print_json;
use anyhow::Context;
use chrono::Utc;
use std::path::Path;
use tddgate_core::{config::Config, hook::Interceptor, store::FileStore};

/// Evaluate the write policy for `path` as the hook would. Exit 0 on allow, 2 on deny.
pub fn run(root: &Path, path: &str, json: bool) -> anyhow::Result<i32> {
    let config = Config::load(root).context("failed to load config")?;
    let store = FileStore::for_root(root);
    let decision = Interceptor::new(root, &config, &store).check_path(path, Utc::now());

    if json {
        print_json(&decision)?;
    } else {
        println!("{}: {path}", decision.outcome);
        println!("  rule:   {}", decision.rule);
        println!("  reason: {}", decision.reason);
    }

    Ok(if decision.is_allow() { 0 } else { 2 })
}
