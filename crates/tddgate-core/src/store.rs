//! Durable record of the most recent test run.
//!
//! The reporter is the only writer; the pre-tool-use hook reads it once per
//! tool call from a separate process. Writes go through [`crate::io::atomic_write`]
//! so a reader never observes a half-written record.

use crate::error::Result;
use crate::io;
use crate::paths;
use crate::record::TestRunRecord;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

pub trait StateStore {
    /// Persist `record`, replacing any previous one.
    fn record_run(&self, record: &TestRunRecord) -> Result<()>;

    /// Strict read: `Ok(None)` when nothing has been recorded yet, `Err` when
    /// the stored record cannot be read or parsed.
    fn load(&self) -> Result<Option<TestRunRecord>>;

    /// Drop the stored record so the next read reports `missing`.
    fn clear(&self) -> Result<()>;

    /// The most recent record. Unreadable or corrupt state reads as the
    /// `missing` sentinel so callers fail closed.
    fn latest(&self) -> TestRunRecord {
        match self.load() {
            Ok(Some(record)) => record,
            Ok(None) => TestRunRecord::missing(),
            Err(e) => {
                warn!(error = %e, "test state unreadable, treating as missing");
                TestRunRecord::missing()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// FileStore
// ---------------------------------------------------------------------------

/// JSON file at `.tddgate/test-run.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn for_root(root: &Path) -> Self {
        Self::new(paths::state_path(root))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStore {
    fn record_run(&self, record: &TestRunRecord) -> Result<()> {
        let mut data = serde_json::to_string_pretty(record)?;
        data.push('\n');
        io::atomic_write(&self.path, data.as_bytes())?;
        debug!(path = %self.path.display(), status = %record.status, "recorded test run");
        Ok(())
    }

    fn load(&self) -> Result<Option<TestRunRecord>> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: TestRunRecord = serde_json::from_str(&data)?;
        Ok(Some(record))
    }

    fn clear(&self) -> Result<()> {
        if io::remove_if_exists(&self.path)? {
            debug!(path = %self.path.display(), "cleared test run");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-process store for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    record: Mutex<Option<TestRunRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn record_run(&self, record: &TestRunRecord) -> Result<()> {
        let mut slot = self.record.lock().unwrap_or_else(|p| p.into_inner());
        *slot = Some(record.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<TestRunRecord>> {
        let slot = self.record.lock().unwrap_or_else(|p| p.into_inner());
        Ok(slot.clone())
    }

    fn clear(&self) -> Result<()> {
        let mut slot = self.record.lock().unwrap_or_else(|p| p.into_inner());
        *slot = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
