use crate::cmd::status::print_record;
use anyhow::Context;
use chrono::Utc;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tddgate_core::{
    config::Config,
    record::{TestRunRecord, TestStatus},
    reporter::{self, ReportFormat},
    runner,
    store::{FileStore, StateStore},
    GateError,
};
use tracing::warn;

// ---------------------------------------------------------------------------
// report
// ---------------------------------------------------------------------------

pub fn report(
    root: &Path,
    format: Option<&str>,
    input: Option<&Path>,
    coverage_summary: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let format = resolve_format(format, &config)?;

    let text = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read report from stdin")?;
            buf
        }
    };

    let mut record = reporter::parse_report(format, &text, Utc::now())
        .with_context(|| format!("failed to parse {format} report"))?;
    if let Some(path) = coverage_summary {
        record = record.with_coverage(read_coverage(path)?);
    }

    save(root, &record)?;
    print_record(&record, json)
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

/// Run the test command, record the outcome, and return an exit code that
/// mirrors it (0 only when the suite passed).
pub fn run(
    root: &Path,
    command: &[String],
    format: Option<&str>,
    timeout: Option<u32>,
    coverage_summary: Option<&Path>,
    json: bool,
) -> anyhow::Result<i32> {
    let config = Config::load(root).context("failed to load config")?;
    let format = resolve_format(format, &config)?;

    let command = if command.is_empty() {
        config
            .runner
            .command
            .clone()
            .filter(|c| !c.trim().is_empty())
            .ok_or(GateError::NoTestCommand)?
    } else {
        shell_join(command)
    };
    let timeout_secs = timeout.unwrap_or(config.runner.timeout_seconds);
    if timeout_secs == 0 {
        anyhow::bail!("timeout must be greater than 0");
    }

    let completed = runner::run_command(&command, root, Duration::from_secs(timeout_secs.into()));
    let mut record = match completed {
        Ok(out) => {
            if !json && !out.stderr.is_empty() {
                eprint!("{}", out.stderr);
            }
            reporter::record_from_run(format, &out, Utc::now())
        }
        Err(e) => {
            warn!(error = %e, "test command did not run");
            TestRunRecord::error(Utc::now(), e.to_string())
        }
    };

    if let Some(path) = coverage_summary {
        if record.status != TestStatus::Error {
            match read_coverage(path) {
                Ok(cov) => record = record.with_coverage(cov),
                Err(e) => warn!(error = %format!("{e:#}"), "coverage not attached"),
            }
        }
    }

    save(root, &record)?;
    print_record(&record, json)?;
    Ok(if record.status == TestStatus::Passing {
        0
    } else {
        1
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn resolve_format(flag: Option<&str>, config: &Config) -> anyhow::Result<ReportFormat> {
    match flag {
        Some(f) => Ok(f.parse()?),
        None => Ok(config.runner.format),
    }
}

fn read_coverage(path: &Path) -> anyhow::Result<tddgate_core::record::Coverage> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    reporter::parse_coverage_summary(&data)
        .with_context(|| format!("invalid coverage summary {}", path.display()))
}

fn save(root: &Path, record: &TestRunRecord) -> anyhow::Result<()> {
    let store = FileStore::for_root(root);
    store
        .record_run(record)
        .with_context(|| format!("failed to write {}", store.path().display()))
}

/// Join argv into a `sh -c` command line, single-quoting words that need it.
fn shell_join(args: &[String]) -> String {
    args.iter()
        .map(|a| {
            let plain = !a.is_empty()
                && a
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
            if plain {
                a.clone()
            } else {
                format!("'{}'", a.replace('\'', r"'\''"))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
