//! Journal Writer: Append-only record journal with checksums
//!
//! Every accepted location entry becomes one framed record appended to the
//! newest `journal-NNNNNN.bin` file. Files rotate at a size limit and are
//! never rewritten, except that a failed append is rolled back to the last
//! good offset.
//!
//! # Binary Format (per record)
//! ```text
//! [body_len:    u32]
//! [sequence:    u64]
//! [timestamp:   u64]
//! [payload_len: u32][payload: bytes]
//! [checksum:    u32]  // CRC32C over sequence+timestamp+payload
//! ```
//! All integers are little-endian.

use crc32c::crc32c;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Fixed part of a record body: seq + ts + payload_len + crc.
const BODY_OVERHEAD: usize = 8 + 8 + 4 + 4;

/// Upper bound on a plausible body length; anything larger is corruption.
const MAX_BODY_LEN: usize = 16 * 1024 * 1024;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed record: {0}")]
    Malformed(String),

    #[error("Incomplete record: need {need} bytes, have {have}")]
    Incomplete { need: usize, have: usize },

    #[error("Payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Journal writer is unusable after a failed rollback")]
    Broken,
}

// ── Journal Record ──────────────────────────────────────────────────

/// A single framed record as stored on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalRecord {
    /// Monotonic insertion counter assigned by the writer
    pub sequence: u64,
    /// Entry ordering key, copied out of the payload for indexing
    pub timestamp: u64,
    /// Bincode-encoded entry
    pub payload: Vec<u8>,
    /// CRC32C over (sequence ++ timestamp ++ payload)
    pub checksum: u32,
}

impl JournalRecord {
    /// Create a new record, computing the CRC32C checksum automatically.
    pub fn new(sequence: u64, timestamp: u64, payload: Vec<u8>) -> Self {
        let checksum = Self::compute_checksum(sequence, timestamp, &payload);
        Self {
            sequence,
            timestamp,
            payload,
            checksum,
        }
    }

    pub fn compute_checksum(sequence: u64, timestamp: u64, payload: &[u8]) -> u32 {
        let mut buf = Vec::with_capacity(16 + payload.len());
        buf.extend_from_slice(&sequence.to_le_bytes());
        buf.extend_from_slice(&timestamp.to_le_bytes());
        buf.extend_from_slice(payload);
        crc32c(&buf)
    }

    /// Validate the stored checksum against recomputed value.
    pub fn verify_checksum(&self) -> bool {
        self.checksum == Self::compute_checksum(self.sequence, self.timestamp, &self.payload)
    }

    /// Serialize record to the binary wire format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let payload_len = self.payload.len() as u32;
        let body_len = (BODY_OVERHEAD + self.payload.len()) as u32;

        let mut buf = Vec::with_capacity(4 + body_len as usize);
        buf.extend_from_slice(&body_len.to_le_bytes());
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&payload_len.to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf.extend_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Deserialize a record from the start of `data`.
    ///
    /// Returns `(record, bytes_consumed)`. The checksum is NOT verified here;
    /// callers decide how to treat a mismatch.
    pub fn from_bytes(data: &[u8]) -> Result<(Self, usize), JournalError> {
        if data.len() < 4 {
            return Err(JournalError::Incomplete {
                need: 4,
                have: data.len(),
            });
        }

        let body_len = read_u32(data, 0) as usize;

        if body_len > MAX_BODY_LEN {
            return Err(JournalError::Malformed(format!(
                "Implausible body length: {} (likely corruption)",
                body_len
            )));
        }
        if body_len < BODY_OVERHEAD {
            return Err(JournalError::Malformed(format!(
                "Body too small: {} bytes, minimum is {}",
                body_len, BODY_OVERHEAD
            )));
        }

        let total = 4 + body_len;
        if data.len() < total {
            return Err(JournalError::Incomplete {
                need: total,
                have: data.len(),
            });
        }

        let body = &data[4..total];
        let sequence = read_u64(body, 0);
        let timestamp = read_u64(body, 8);
        let payload_len = read_u32(body, 16) as usize;

        if payload_len != body_len - BODY_OVERHEAD {
            return Err(JournalError::Malformed(format!(
                "payload_len {} does not match body length {}",
                payload_len, body_len
            )));
        }

        let payload = body[20..20 + payload_len].to_vec();
        let checksum = read_u32(body, 20 + payload_len);

        Ok((
            Self {
                sequence,
                timestamp,
                payload,
                checksum,
            },
            total,
        ))
    }
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(bytes)
}

fn read_u64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}

/// Where a record lives on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLocation {
    pub file_index: u64,
    pub offset: u64,
    pub len: u32,
}

// ── Fsync Policy ────────────────────────────────────────────────────

/// Controls when `fsync` (durable write) is called.
///
/// Records are always handed to the OS before `append` returns; this only
/// decides when the OS is forced to put them on stable storage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FsyncPolicy {
    /// Fsync after every write.
    EveryWrite,
    /// Fsync every N writes.
    EveryN(usize),
    /// Fsync only on file rotation and explicit `sync`.
    OnRotation,
}

impl FsyncPolicy {
    /// Policy for "fsync every `n` appends"; `n <= 1` means every write.
    pub fn every(n: usize) -> Self {
        if n <= 1 {
            FsyncPolicy::EveryWrite
        } else {
            FsyncPolicy::EveryN(n)
        }
    }
}

// ── Journal Writer Configuration ────────────────────────────────────

/// Configuration for the journal writer.
#[derive(Debug, Clone)]
pub struct JournalConfig {
    /// Directory for journal files.
    pub dir: PathBuf,
    /// Maximum file size in bytes before rotation (default 64 MiB).
    pub max_file_size: u64,
    /// Fsync policy.
    pub fsync_policy: FsyncPolicy,
}

impl JournalConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_file_size: 64 * 1024 * 1024,
            fsync_policy: FsyncPolicy::EveryWrite,
        }
    }
}

// ── Journal Writer ──────────────────────────────────────────────────

/// Append-only journal writer with checksums, rotation, and fsync control.
pub struct JournalWriter {
    config: JournalConfig,
    file: File,
    current_file: PathBuf,
    current_file_size: u64,
    file_index: u64,
    next_sequence: u64,
    writes_since_fsync: usize,
    broken: bool,
}

impl JournalWriter {
    /// Open the newest journal file for appending, creating the directory if needed.
    pub fn open(config: JournalConfig) -> Result<Self, JournalError> {
        fs::create_dir_all(&config.dir)?;

        let file_index = latest_index(&config.dir)?.unwrap_or(0);
        let current_file = journal_path(&config.dir, file_index);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&current_file)?;
        let current_file_size = file.metadata()?.len();

        debug!(
            path = %current_file.display(),
            size = current_file_size,
            "Journal writer opened"
        );

        Ok(Self {
            config,
            file,
            current_file,
            current_file_size,
            file_index,
            next_sequence: 1,
            writes_since_fsync: 0,
            broken: false,
        })
    }

    /// Set the next sequence number (used after recovery).
    pub fn set_next_sequence(&mut self, seq: u64) {
        self.next_sequence = seq;
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn current_file_path(&self) -> &Path {
        &self.current_file
    }

    /// Stop appending to the current file and continue in a fresh one. The
    /// current file keeps its bytes.
    pub fn seal_current_file(&mut self) -> Result<(), JournalError> {
        warn!(path = %self.current_file.display(), "Sealing journal file");
        self.rotate()
    }

    /// Append one payload as a new record and return where it landed.
    ///
    /// On a write error the file is truncated back to its previous length so
    /// no partial frame is left behind. If that rollback also fails the
    /// writer refuses further appends.
    pub fn append(
        &mut self,
        timestamp: u64,
        payload: Vec<u8>,
    ) -> Result<(JournalRecord, RecordLocation), JournalError> {
        if self.broken {
            return Err(JournalError::Broken);
        }
        if BODY_OVERHEAD + payload.len() > MAX_BODY_LEN {
            return Err(JournalError::PayloadTooLarge(payload.len()));
        }

        if self.current_file_size >= self.config.max_file_size {
            self.rotate()?;
        }

        let record = JournalRecord::new(self.next_sequence, timestamp, payload);
        let bytes = record.to_bytes();
        let offset = self.current_file_size;

        if let Err(e) = self.write_durable(&bytes) {
            self.rollback(offset);
            return Err(e);
        }

        self.current_file_size += bytes.len() as u64;
        self.next_sequence += 1;

        let location = RecordLocation {
            file_index: self.file_index,
            offset,
            len: bytes.len() as u32,
        };
        Ok((record, location))
    }

    /// Force fsync (used before shutdown / rotation).
    pub fn sync(&mut self) -> Result<(), JournalError> {
        self.file.sync_all()?;
        self.writes_since_fsync = 0;
        Ok(())
    }

    // ── Internal Helpers ────────────────────────────────────────────

    fn write_durable(&mut self, data: &[u8]) -> Result<(), JournalError> {
        self.file.write_all(data)?;
        self.file.flush()?;
        self.writes_since_fsync += 1;

        let should_fsync = match self.config.fsync_policy {
            FsyncPolicy::EveryWrite => true,
            FsyncPolicy::EveryN(n) => self.writes_since_fsync >= n,
            FsyncPolicy::OnRotation => false,
        };
        if should_fsync {
            self.file.sync_data()?;
            self.writes_since_fsync = 0;
        }
        Ok(())
    }

    fn rollback(&mut self, offset: u64) {
        match self.file.set_len(offset) {
            Ok(()) => {
                warn!(
                    path = %self.current_file.display(),
                    offset,
                    "Append failed, journal rolled back"
                );
            }
            Err(e) => {
                self.broken = true;
                warn!(
                    path = %self.current_file.display(),
                    offset,
                    error = %e,
                    "Append failed and rollback failed, journal writer disabled"
                );
            }
        }
    }

    fn rotate(&mut self) -> Result<(), JournalError> {
        self.sync()?;

        self.file_index += 1;
        self.current_file = journal_path(&self.config.dir, self.file_index);

        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.current_file)?;
        self.current_file_size = 0;

        info!(path = %self.current_file.display(), "Journal rotated");
        Ok(())
    }
}

/// Path of journal file number `index` inside `dir`.
pub fn journal_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("journal-{:06}.bin", index))
}

/// Parse the index out of a journal file name.
pub fn parse_journal_name(name: &str) -> Option<u64> {
    name.strip_prefix("journal-")?
        .strip_suffix(".bin")?
        .parse::<u64>()
        .ok()
}

/// All journal files in `dir`, sorted by index.
pub fn list_journal_files(dir: &Path) -> Result<Vec<(u64, PathBuf)>, io::Error> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files: Vec<(u64, PathBuf)> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().to_string();
            parse_journal_name(&name).map(|idx| (idx, e.path()))
        })
        .collect();

    files.sort_by_key(|(idx, _)| *idx);
    Ok(files)
}

fn latest_index(dir: &Path) -> Result<Option<u64>, io::Error> {
    Ok(list_journal_files(dir)?.last().map(|(idx, _)| *idx))
}

// ── Tests ───────────────────────────────────────────────────────────
