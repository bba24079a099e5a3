//! Append-only proof ledger.
//!
//! A proof's history lives in `<proof>/ledger/` as one file per append. Each
//! file is named after the sequence number of its first record and holds one
//! JSON record per line:
//!
//! ```text
//! ledger/
//!   .lock
//!   0000000001.json   records 1 and 2
//!   0000000003.json   record 3
//! ```
//!
//! Sequence numbers start at 1 and are dense across files. A batch file
//! appears whole or not at all: it is written to a temp file in the same
//! directory and linked into place with no-clobber semantics, so a failed or
//! interrupted append leaves no records behind, at most an ignorable temp
//! file.
//!
//! Appends from any number of processes are serialized by an advisory lock
//! (see [`lock`]). [`Ledger::append_after`] is the compare-and-append used by
//! the proof service: it only writes if the tail still sits where the caller
//! last read it.
//!
//! Damage is never skipped. A record that fails to parse, carries the wrong
//! sequence number, names an unknown event type, or leaves a hole in the
//! sequence fails the whole read.

#![allow(clippy::missing_errors_doc)]

mod error;
mod lock;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;

use proofwork_types::{Event, LedgerRecord};
use proofwork_utils::{AtomicWriteOptions, atomic_write_new_with_options};

pub use error::LedgerError;

use lock::{AppendLock, LOCK_FILE};

pub const LEDGER_DIR: &str = "ledger";

const BATCH_EXT: &str = "json";
const SEQ_WIDTH: usize = 10;
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct Ledger {
    dir: PathBuf,
    lock_timeout: Duration,
}

impl Ledger {
    /// Handle for the ledger under `proof_dir`. Touches nothing on disk.
    #[must_use]
    pub fn new(proof_dir: &Path) -> Self {
        Self {
            dir: proof_dir.join(LEDGER_DIR),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// How long an append waits for other appenders before giving up.
    #[must_use]
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.dir.is_dir()
    }

    /// Create the ledger directory if it is missing.
    pub fn create(&self) -> Result<(), LedgerError> {
        fs::create_dir_all(&self.dir).map_err(|e| LedgerError::io(&self.dir, e))
    }

    /// Path of the batch file whose first record is `first`.
    #[must_use]
    pub fn batch_path(&self, first: u64) -> PathBuf {
        self.dir.join(format!("{first:0width$}.{BATCH_EXT}", width = SEQ_WIDTH))
    }

    /// Append one event at the current tail. Returns its sequence number.
    pub fn append(&self, event: Event) -> Result<u64, LedgerError> {
        self.append_all(vec![event])
    }

    /// Append events contiguously at the current tail, as one batch. Returns
    /// the sequence number of the last one.
    pub fn append_all(&self, events: Vec<Event>) -> Result<u64, LedgerError> {
        if events.is_empty() {
            return Err(LedgerError::EmptyBatch);
        }
        let _lock = AppendLock::acquire(&self.dir, self.lock_timeout)?;
        let tail = self.last_sequence()?;
        self.write_batch(tail, events)
    }

    /// Append events only if the ledger tail is still `expected_last`.
    ///
    /// Fails with [`LedgerError::Conflict`] when another writer got there
    /// first. Nothing is written unless every event is.
    pub fn append_after(&self, expected_last: u64, events: Vec<Event>) -> Result<u64, LedgerError> {
        if events.is_empty() {
            return Err(LedgerError::EmptyBatch);
        }
        let _lock = AppendLock::acquire(&self.dir, self.lock_timeout)?;
        let actual = self.last_sequence()?;
        if actual != expected_last {
            tracing::debug!(expected_last, actual, "Ledger tail moved before append");
            return Err(LedgerError::Conflict {
                expected: expected_last,
                actual,
            });
        }
        self.write_batch(actual, events)
    }

    /// Every record, in sequence order.
    pub fn read_all(&self) -> Result<Vec<LedgerRecord>, LedgerError> {
        self.read_since(0)
    }

    /// Records with a sequence number strictly greater than `after`.
    ///
    /// Batches that end at or before `after` are not opened.
    pub fn read_since(&self, after: u64) -> Result<Vec<LedgerRecord>, LedgerError> {
        let starts = self.batch_starts()?;
        // A batch ends right before the next one starts.
        let skip = starts
            .windows(2)
            .take_while(|pair| pair[1] <= after.saturating_add(1))
            .count();

        let mut expected = if skip == 0 { 1 } else { starts[skip] };
        let mut records = Vec::new();
        for &first in &starts[skip..] {
            if first != expected {
                return Err(LedgerError::SequenceGap {
                    expected,
                    found: first,
                });
            }
            let batch = self.read_batch(first)?;
            expected = first + batch.len() as u64;
            records.extend(batch.into_iter().filter(|record| record.seq > after));
        }
        Ok(records)
    }

    /// Sequence number of the newest record; 0 for an empty ledger.
    pub fn last_sequence(&self) -> Result<u64, LedgerError> {
        let Some(&first) = self.batch_starts()?.last() else {
            return Ok(0);
        };
        Ok(self
            .read_batch(first)?
            .last()
            .map_or(first - 1, |record| record.seq))
    }

    /// Number of records, across all batches.
    pub fn count(&self) -> Result<usize, LedgerError> {
        Ok(self.read_all()?.len())
    }

    fn write_batch(&self, tail: u64, events: Vec<Event>) -> Result<u64, LedgerError> {
        let timestamp = Utc::now();
        let first = tail + 1;
        let records = events.len();

        let mut bytes = Vec::new();
        let mut seq = tail;
        for event in events {
            seq += 1;
            let tag = event.type_tag();
            let record = LedgerRecord {
                seq,
                timestamp,
                event,
            };
            serde_json::to_writer(&mut bytes, &record)
                .map_err(|source| LedgerError::Encode { tag, source })?;
            bytes.push(b'\n');
        }

        let path = self.batch_path(first);
        match atomic_write_new_with_options(&path, &bytes, AtomicWriteOptions::durable()) {
            Ok(()) => {
                tracing::debug!(first, last = seq, records, "Appended ledger batch");
                Ok(seq)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                tracing::warn!(first, "Ledger batch already exists; lost append race");
                Err(LedgerError::Conflict {
                    expected: tail,
                    actual: first,
                })
            }
            Err(e) => Err(LedgerError::io(path, e)),
        }
    }

    /// Sorted first-sequence numbers of the batch files on disk.
    fn batch_starts(&self) -> Result<Vec<u64>, LedgerError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(LedgerError::io(&self.dir, e)),
        };

        let mut starts = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| LedgerError::io(&self.dir, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                tracing::warn!(path = %entry.path().display(), "Ignoring non-UTF-8 ledger entry");
                continue;
            };
            if name == LOCK_FILE {
                continue;
            }
            match parse_batch_name(name) {
                Some(first) => starts.push(first),
                None if name.starts_with(".tmp") => {
                    tracing::debug!(file = name, "Skipping temp file in ledger");
                }
                None => tracing::warn!(file = name, "Ignoring unexpected file in ledger"),
            }
        }
        starts.sort_unstable();
        Ok(starts)
    }

    /// The records of one batch file, checked to run densely from `first`.
    fn read_batch(&self, first: u64) -> Result<Vec<LedgerRecord>, LedgerError> {
        let path = self.batch_path(first);
        let bytes = fs::read(&path).map_err(|e| LedgerError::io(&path, e))?;

        let mut records = Vec::new();
        for (seq, line) in (first..).zip(bytes.split(|&b| b == b'\n').filter(|l| !l.is_empty())) {
            records.push(parse_record(seq, &path, line)?);
        }
        if records.is_empty() {
            return Err(LedgerError::Corrupt {
                seq: first,
                path,
                reason: "empty batch file".to_owned(),
            });
        }
        Ok(records)
    }
}

fn parse_record(seq: u64, path: &Path, line: &[u8]) -> Result<LedgerRecord, LedgerError> {
    let corrupt = |reason: String| LedgerError::Corrupt {
        seq,
        path: path.to_path_buf(),
        reason,
    };

    let value: serde_json::Value =
        serde_json::from_slice(line).map_err(|e| corrupt(e.to_string()))?;
    let Some(tag) = value.get("type").and_then(serde_json::Value::as_str) else {
        return Err(corrupt("missing event type".to_owned()));
    };
    if !Event::is_known_tag(tag) {
        return Err(LedgerError::UnknownEventType {
            seq,
            tag: tag.to_owned(),
        });
    }

    let record: LedgerRecord = serde_json::from_value(value).map_err(|e| corrupt(e.to_string()))?;
    if record.seq != seq {
        return Err(corrupt(format!("record claims sequence {}", record.seq)));
    }
    Ok(record)
}

fn parse_batch_name(name: &str) -> Option<u64> {
    let stem = name.strip_suffix(BATCH_EXT)?.strip_suffix('.')?;
    if stem.len() < SEQ_WIDTH || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok().filter(|&seq| seq > 0)
}
