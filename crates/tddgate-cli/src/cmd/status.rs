use crate::output::{print_json, print_table};
use std::path::Path;
use tddgate_core::{
    record::{TestRunRecord, TestStatus},
    store::{FileStore, StateStore},
};

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let store = FileStore::for_root(root);
    let record = match store.load() {
        Ok(Some(record)) => record,
        Ok(None) => TestRunRecord::missing(),
        Err(e) => {
            // The gate reads this as missing; say why here.
            if !json {
                println!(
                    "State file {} is unreadable ({e}); treated as missing.",
                    store.path().display()
                );
            }
            TestRunRecord::missing()
        }
    };
    print_record(&record, json)
}

pub fn print_record(record: &TestRunRecord, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(record);
    }

    println!("Status:    {}", record.status);
    if record.status != TestStatus::Missing {
        println!("Recorded:  {}", record.timestamp.to_rfc3339());
    }
    if let Some(detail) = &record.detail {
        println!("Detail:    {detail}");
    }

    if record.has_failing_tests() {
        println!("Failing:   {}", record.failing_tests.len());
        for id in &record.failing_tests {
            println!("  - {id}");
        }
    }

    if let Some(cov) = &record.coverage {
        println!();
        print_table(
            &["METRIC", "PCT"],
            &[
                vec!["lines".to_string(), format!("{:.2}", cov.lines)],
                vec!["branches".to_string(), format!("{:.2}", cov.branches)],
                vec!["functions".to_string(), format!("{:.2}", cov.functions)],
                vec!["statements".to_string(), format!("{:.2}", cov.statements)],
            ],
        );
    }
    Ok(())
}
