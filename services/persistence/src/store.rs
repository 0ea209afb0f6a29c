//! Entry Store: Durable append-only location records ordered by timestamp
//!
//! `JournalStore` keeps every entry in the journal and an in-memory index
//! from `(timestamp, sequence)` to the record's on-disk location. The index
//! is rebuilt from the journal on open; entries themselves are read back from
//! disk on demand.

use crate::journal::{journal_path, JournalConfig, JournalError, JournalWriter, RecordLocation};
use crate::reader::{read_record_from, ReaderError};
use crate::recovery::{recover, RecoveryError, RecoveryReport};
use std::collections::{hash_map, BTreeMap, HashMap};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, error};
use types::location::Entry;

// ── Errors ──────────────────────────────────────────────────────────

/// Any failure writing to or reading from the entry store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("Reader error: {0}")]
    Reader(#[from] ReaderError),

    #[error("Recovery error: {0}")]
    Recovery(#[from] RecoveryError),

    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Record timestamp {indexed} does not match entry timestamp {stored}")]
    TimestampMismatch { indexed: u64, stored: u64 },
}

// ── Store Trait ─────────────────────────────────────────────────────

/// Durable append-only entry storage.
pub trait EntryStore: Send + Sync {
    /// Persist one entry. A failed append leaves nothing readable behind.
    fn append(&self, entry: &Entry) -> Result<(), StoreError>;

    /// Up to `limit` entries, most recent timestamp first.
    ///
    /// `limit == 0` means no limit was supplied and every entry is returned.
    /// Entries with equal timestamps come back newest insertion first, but
    /// callers should not depend on that.
    fn read_recent(&self, limit: usize) -> Result<Vec<Entry>, StoreError>;
}

// ── Journal Store ───────────────────────────────────────────────────

/// Index key: ties on timestamp are broken by insertion sequence.
type IndexKey = (u64, u64);

struct Inner {
    writer: JournalWriter,
    index: BTreeMap<IndexKey, RecordLocation>,
}

/// Journal-backed `EntryStore`.
pub struct JournalStore {
    dir: PathBuf,
    inner: Mutex<Inner>,
    recovery: RecoveryReport,
}

impl JournalStore {
    /// Open (or create) the store in `config.dir`, recovering the index.
    pub fn open(config: JournalConfig) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&config.dir)?;
        let (records, recovery) = recover(&config.dir)?;

        let index: BTreeMap<IndexKey, RecordLocation> = records
            .into_iter()
            .map(|r| ((r.timestamp, r.sequence), r.location))
            .collect();

        let dir = config.dir.clone();
        let mut writer = JournalWriter::open(config)?;
        writer.set_next_sequence(recovery.next_sequence());
        if recovery.seal_newest {
            writer.seal_current_file()?;
        }
        debug!(
            path = %writer.current_file_path().display(),
            next_sequence = writer.next_sequence(),
            entries = index.len(),
            "Entry store opened"
        );

        Ok(Self {
            dir,
            inner: Mutex::new(Inner { writer, index }),
            recovery,
        })
    }

    /// What recovery found when this store was opened.
    pub fn recovery_report(&self) -> &RecoveryReport {
        &self.recovery
    }

    /// Number of indexed entries.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.index.len())
    }

    /// Flush and fsync the active journal file.
    pub fn sync(&self) -> Result<(), StoreError> {
        self.lock()?.writer.sync()?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn load(
        &self,
        key: IndexKey,
        location: &RecordLocation,
        files: &mut HashMap<u64, File>,
    ) -> Result<Entry, StoreError> {
        let file = match files.entry(location.file_index) {
            hash_map::Entry::Occupied(slot) => slot.into_mut(),
            hash_map::Entry::Vacant(slot) => {
                slot.insert(File::open(journal_path(&self.dir, location.file_index))?)
            }
        };

        let record = read_record_from(file, location)?;
        let entry: Entry = bincode::deserialize(&record.payload)?;
        if entry.timestamp != key.0 {
            return Err(StoreError::TimestampMismatch {
                indexed: key.0,
                stored: entry.timestamp,
            });
        }
        Ok(entry)
    }
}

impl EntryStore for JournalStore {
    fn append(&self, entry: &Entry) -> Result<(), StoreError> {
        let payload = bincode::serialize(entry)?;

        let mut inner = self.lock()?;
        let (record, location) = inner.writer.append(entry.timestamp, payload).map_err(|e| {
            error!(timestamp = entry.timestamp, error = %e, "Journal append failed");
            e
        })?;
        inner.index.insert((entry.timestamp, record.sequence), location);

        debug!(
            timestamp = entry.timestamp,
            sequence = record.sequence,
            file_index = location.file_index,
            offset = location.offset,
            "Entry appended"
        );
        Ok(())
    }

    fn read_recent(&self, limit: usize) -> Result<Vec<Entry>, StoreError> {
        // Locations are copied out so disk reads happen without the lock;
        // indexed records are complete on disk and never rewritten.
        let selected: Vec<(IndexKey, RecordLocation)> = {
            let inner = self.lock()?;
            let newest_first = inner.index.iter().rev().map(|(k, v)| (*k, *v));
            if limit == 0 {
                newest_first.collect()
            } else {
                newest_first.take(limit).collect()
            }
        };

        let mut files = HashMap::new();
        selected
            .iter()
            .map(|(key, location)| self.load(*key, location, &mut files))
            .collect()
    }
}

// ── Tests ───────────────────────────────────────────────────────────


// ── Property-Based Tests ────────────────────────────────────────────
