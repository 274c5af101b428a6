//! Audit sinks
//!
//! Every attempted, simulated, skipped or failed action is appended to an
//! [`AuditSink`]. The production sink is [`JsonLedger`]: a JSON array on disk
//! that is rewritten in full through a temp file and an atomic rename, so a
//! reader never observes a partially written document.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::error::{OffboardError, OffboardResult};
use crate::record::ActionRecord;
use crate::types::Outcome;

/// Append-only destination for action records.
pub trait AuditSink: Send + Sync {
    /// Persist one record. A failure here is fatal to the run.
    fn append(&self, record: &ActionRecord) -> OffboardResult<()>;
}

/// Log a record through `tracing`, then append it to the sink.
pub fn emit(sink: &dyn AuditSink, record: ActionRecord) -> OffboardResult<ActionRecord> {
    let target = record.target.as_ref().map(ToString::to_string);
    match record.outcome {
        Outcome::Failure => warn!(
            run_id = %record.run_id,
            module = %record.module,
            target = target.as_deref().unwrap_or("-"),
            detail = record.detail.as_deref().unwrap_or("-"),
            simulate = record.simulate,
            "{}",
            record.message
        ),
        outcome => info!(
            run_id = %record.run_id,
            module = %record.module,
            target = target.as_deref().unwrap_or("-"),
            outcome = outcome.as_str(),
            simulate = record.simulate,
            "{}",
            record.message
        ),
    }

    sink.append(&record)?;
    Ok(record)
}

/// In-memory sink.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<ActionRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything appended so far.
    pub fn records(&self) -> Vec<ActionRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditSink for MemoryAuditSink {
    fn append(&self, record: &ActionRecord) -> OffboardResult<()> {
        self.records
            .lock()
            .map_err(|_| OffboardError::audit("memory sink lock poisoned"))?
            .push(record.clone());
        Ok(())
    }
}

/// JSON-array ledger file with single-writer enforcement.
///
/// Opening takes an exclusive advisory lock on `<path>.lock`. The lock lives
/// as long as the open file handle, so a crashed run releases it with its
/// process and the marker file left on disk does not block the next run.
///
/// Records are kept in memory after open. Each append still rewrites the
/// whole array, so cost grows with the size of the ledger; rotate the ledger
/// file between offboarding batches rather than letting it grow unbounded.
#[derive(Debug)]
pub struct JsonLedger {
    path: PathBuf,
    records: Mutex<Vec<serde_json::Value>>,
    _lock: File,
}

impl JsonLedger {
    /// Open the ledger at `path`, creating an empty array if it is missing.
    pub fn open(path: impl AsRef<Path>) -> OffboardResult<Self> {
        let path = path.as_ref().to_path_buf();
        let lock = acquire_lock(&path)?;

        let records = if path.exists() {
            // Refuse to append to something that is not a ledger.
            read_ledger(&path)?
        } else {
            write_records(&path, &[])?;
            Vec::new()
        };

        Ok(Self {
            path,
            records: Mutex::new(records),
            _lock: lock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every record appended so far, including those from earlier runs.
    pub fn read_all(&self) -> OffboardResult<Vec<serde_json::Value>> {
        Ok(self
            .records
            .lock()
            .map_err(|_| OffboardError::audit("ledger lock poisoned"))?
            .clone())
    }
}

impl AuditSink for JsonLedger {
    fn append(&self, record: &ActionRecord) -> OffboardResult<()> {
        let value = serde_json::to_value(record)
            .map_err(|e| OffboardError::audit(format!("failed to serialize record: {e}")))?;

        let mut records = self
            .records
            .lock()
            .map_err(|_| OffboardError::audit("ledger lock poisoned"))?;
        records.push(value);
        if let Err(e) = write_records(&self.path, &records) {
            records.pop();
            return Err(e);
        }
        Ok(())
    }
}

fn acquire_lock(path: &Path) -> OffboardResult<File> {
    let lock_path = lock_path_for(path);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|e| {
            OffboardError::audit_io(
                format!("failed to open ledger lock {}", lock_path.display()),
                e,
            )
        })?;

    match FileExt::try_lock_exclusive(&file) {
        Ok(()) => Ok(file),
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
            warn!(lock = %lock_path.display(), "Ledger is held by another run");
            Err(OffboardError::audit_io(
                format!("ledger {} is locked by another run", path.display()),
                e,
            ))
        }
        Err(e) => Err(OffboardError::audit_io(
            format!("failed to lock ledger {}", lock_path.display()),
            e,
        )),
    }
}

fn write_records(path: &Path, records: &[serde_json::Value]) -> OffboardResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let content = serde_json::to_vec_pretty(records)
        .map_err(|e| OffboardError::audit(format!("failed to serialize ledger: {e}")))?;

    let mut tmp = NamedTempFile::new_in(dir)
        .map_err(|e| OffboardError::audit_io("failed to create ledger temp file", e))?;
    tmp.write_all(&content)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| OffboardError::audit_io("failed to write ledger temp file", e))?;
    tmp.persist(path).map_err(|e| {
        OffboardError::audit_io(format!("failed to replace ledger {}", path.display()), e.error)
    })?;

    Ok(())
}

/// Parse a ledger file into raw JSON records.
pub fn read_ledger(path: &Path) -> OffboardResult<Vec<serde_json::Value>> {
    let file = File::open(path).map_err(|e| {
        OffboardError::audit_io(format!("failed to read ledger {}", path.display()), e)
    })?;
    serde_json::from_reader(std::io::BufReader::new(file)).map_err(|e| {
        OffboardError::audit(format!(
            "ledger {} is not a JSON array of records: {e}",
            path.display()
        ))
    })
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;
    use tempfile::TempDir;

    fn record(message: &str) -> ActionRecord {
        ActionRecord::new(
            &ExecutionContext::execute(),
            "orchestrator",
            Outcome::Info,
            message,
        )
    }

    #[test]
    fn test_ledger_created_as_empty_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");

        let ledger = JsonLedger::open(&path).unwrap();
        assert!(ledger.read_all().unwrap().is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "[]");
    }

    #[test]
    fn test_append_keeps_valid_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");
        let ledger = JsonLedger::open(&path).unwrap();

        ledger.append(&record("first")).unwrap();
        ledger.append(&record("second")).unwrap();

        let records = read_ledger(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["message"], "first");
        assert_eq!(records[1]["message"], "second");
    }

    #[test]
    fn test_reopen_appends_to_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");

        {
            let ledger = JsonLedger::open(&path).unwrap();
            ledger.append(&record("run one")).unwrap();
        }
        {
            let ledger = JsonLedger::open(&path).unwrap();
            ledger.append(&record("run two")).unwrap();
        }

        assert_eq!(read_ledger(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_second_writer_is_refused() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");

        let _first = JsonLedger::open(&path).unwrap();
        let second = JsonLedger::open(&path);
        assert!(matches!(second, Err(OffboardError::Audit { .. })));
    }

    #[test]
    fn test_lock_released_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");

        drop(JsonLedger::open(&path).unwrap());
        assert!(JsonLedger::open(&path).is_ok());
    }

    #[test]
    fn test_leftover_lock_file_does_not_block_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");
        // A run that was killed leaves its marker behind but holds no lock.
        std::fs::write(lock_path_for(&path), b"").unwrap();

        let ledger = JsonLedger::open(&path).unwrap();
        ledger.append(&record("after crash")).unwrap();
        assert_eq!(read_ledger(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_lock_held_by_open_handle_blocks_writer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");
        let held = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path_for(&path))
            .unwrap();
        FileExt::try_lock_exclusive(&held).unwrap();

        assert!(matches!(JsonLedger::open(&path), Err(OffboardError::Audit { .. })));

        drop(held);
        assert!(JsonLedger::open(&path).is_ok());
    }

    #[test]
    fn test_read_all_includes_earlier_runs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");
        JsonLedger::open(&path)
            .unwrap()
            .append(&record("run one"))
            .unwrap();

        let ledger = JsonLedger::open(&path).unwrap();
        ledger.append(&record("run two")).unwrap();

        let records = ledger.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records, read_ledger(&path).unwrap());
    }

    #[test]
    fn test_corrupt_ledger_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, "{ not an array").unwrap();

        assert!(JsonLedger::open(&path).is_err());
    }

    #[test]
    fn test_memory_sink_and_emit() {
        let sink = MemoryAuditSink::new();
        emit(&sink, record("hello")).unwrap();
        assert_eq!(sink.records().len(), 1);
        assert_eq!(sink.records()[0].message, "hello");
    }
}
