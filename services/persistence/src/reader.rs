//! Journal Reader: Sequential scan with corruption detection
//!
//! Features:
//! - Sequential record scan across every journal file, in file order
//! - CRC32C checksum validation on every record
//! - Corruption log with byte-offset reporting
//! - Per-file valid-prefix length, so recovery can report an unreadable tail
//! - Random access read of a single record by `RecordLocation`

use crate::journal::{list_journal_files, JournalError, JournalRecord, RecordLocation};
use serde::Serialize;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use thiserror::Error;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("Checksum mismatch in file {file_index} at offset {offset}: seq={sequence}")]
    ChecksumMismatch {
        file_index: u64,
        offset: u64,
        sequence: u64,
    },

    #[error("Record at file {file_index} offset {offset} has length {actual}, index says {expected}")]
    LengthMismatch {
        file_index: u64,
        offset: u64,
        expected: u32,
        actual: usize,
    },
}

// ── Corruption Log Entry ────────────────────────────────────────────

/// Structured corruption log entry for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct CorruptionRecord {
    pub file_index: u64,
    /// Byte offset in the file where corruption was detected.
    pub byte_offset: u64,
    pub kind: CorruptionKind,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorruptionKind {
    /// Frame parsed but CRC did not match; the frame was skipped.
    ChecksumMismatch,
    /// Frame ran past end of file.
    TruncatedEntry,
    /// Frame header is nonsense; the rest of the file is unreadable.
    MalformedFrame,
}

/// Outcome of scanning one file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileScan {
    pub file_index: u64,
    pub path: PathBuf,
    /// Length of the file on disk.
    pub len: u64,
    /// Length of the readable prefix. Less than `len` when the scan stopped early.
    pub valid_len: u64,
}

impl FileScan {
    pub fn has_unreadable_tail(&self) -> bool {
        self.valid_len < self.len
    }
}

/// A record together with where it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedRecord {
    pub record: JournalRecord,
    pub location: RecordLocation,
}

// ── Journal Reader ──────────────────────────────────────────────────

/// Sequential journal reader with checksum validation and corruption detection.
pub struct JournalReader {
    /// All journal files, sorted by index.
    files: Vec<(u64, PathBuf)>,
    /// Position in `files` of the file being read.
    current_file_idx: usize,
    /// Raw data of the current file.
    data: Vec<u8>,
    /// Current read position within `data`.
    pos: usize,
    /// Completed per-file scans.
    scans: Vec<FileScan>,
    /// Accumulated corruption records.
    corruption_log: Vec<CorruptionRecord>,
}

impl JournalReader {
    /// Open a reader over all journal files in the given directory.
    pub fn open(dir: &Path) -> Result<Self, ReaderError> {
        let files = list_journal_files(dir)?;
        let mut reader = Self {
            files,
            current_file_idx: 0,
            data: Vec::new(),
            pos: 0,
            scans: Vec::new(),
            corruption_log: Vec::new(),
        };
        reader.load_current_file()?;
        Ok(reader)
    }

    /// Read the next valid record.
    ///
    /// Records with a bad checksum are logged and skipped. A frame that
    /// cannot be parsed ends the current file; scanning resumes with the next
    /// one. Returns `None` when every file has been read.
    pub fn next_record(&mut self) -> Result<Option<ScannedRecord>, ReaderError> {
        loop {
            let Some(file_index) = self.current_file_index() else {
                return Ok(None);
            };

            if self.pos >= self.data.len() {
                self.finish_file(self.pos as u64);
                self.advance_file()?;
                continue;
            }

            let offset = self.pos as u64;
            match JournalRecord::from_bytes(&self.data[self.pos..]) {
                Ok((record, consumed)) => {
                    self.pos += consumed;

                    if !record.verify_checksum() {
                        self.corruption_log.push(CorruptionRecord {
                            file_index,
                            byte_offset: offset,
                            kind: CorruptionKind::ChecksumMismatch,
                            detail: format!(
                                "CRC32C mismatch for seq={}, stored={:#010x}",
                                record.sequence, record.checksum
                            ),
                        });
                        continue;
                    }

                    let location = RecordLocation {
                        file_index,
                        offset,
                        len: consumed as u32,
                    };
                    return Ok(Some(ScannedRecord { record, location }));
                }
                Err(e) => {
                    let kind = match e {
                        JournalError::Incomplete { .. } => CorruptionKind::TruncatedEntry,
                        _ => CorruptionKind::MalformedFrame,
                    };
                    self.corruption_log.push(CorruptionRecord {
                        file_index,
                        byte_offset: offset,
                        kind,
                        detail: format!(
                            "{} ({} bytes unreadable)",
                            e,
                            self.data.len() - self.pos
                        ),
                    });
                    self.finish_file(offset);
                    self.advance_file()?;
                }
            }
        }
    }

    /// Read all valid records, collecting them into a Vec.
    #[cfg(test)]
    pub fn read_all(&mut self) -> Result<Vec<ScannedRecord>, ReaderError> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record()? {
            records.push(record);
        }
        Ok(records)
    }

    /// Per-file scan results for every file fully read so far.
    pub fn file_scans(&self) -> &[FileScan] {
        &self.scans
    }

    pub fn corruption_log(&self) -> &[CorruptionRecord] {
        &self.corruption_log
    }

    // ── Internal Helpers ────────────────────────────────────────────

    fn current_file_index(&self) -> Option<u64> {
        self.files.get(self.current_file_idx).map(|(idx, _)| *idx)
    }

    fn finish_file(&mut self, valid_len: u64) {
        if let Some((index, path)) = self.files.get(self.current_file_idx) {
            self.scans.push(FileScan {
                file_index: *index,
                path: path.clone(),
                len: self.data.len() as u64,
                valid_len,
            });
        }
    }

    fn load_current_file(&mut self) -> Result<(), ReaderError> {
        self.data.clear();
        self.pos = 0;
        if let Some((_, path)) = self.files.get(self.current_file_idx) {
            let mut file = File::open(path)?;
            file.read_to_end(&mut self.data)?;
        }
        Ok(())
    }

    fn advance_file(&mut self) -> Result<(), ReaderError> {
        self.current_file_idx += 1;
        self.load_current_file()
    }
}

// ── Random Access ───────────────────────────────────────────────────

/// Read and verify the record at `location` from an already opened file.
pub fn read_record_from(
    file: &mut File,
    location: &RecordLocation,
) -> Result<JournalRecord, ReaderError> {
    let mut buf = vec![0u8; location.len as usize];
    file.seek(SeekFrom::Start(location.offset))?;
    file.read_exact(&mut buf)?;

    let (record, consumed) = JournalRecord::from_bytes(&buf)?;
    if consumed != buf.len() {
        return Err(ReaderError::LengthMismatch {
            file_index: location.file_index,
            offset: location.offset,
            expected: location.len,
            actual: consumed,
        });
    }
    if !record.verify_checksum() {
        return Err(ReaderError::ChecksumMismatch {
            file_index: location.file_index,
            offset: location.offset,
            sequence: record.sequence,
        });
    }
    Ok(record)
}


// ── Tests ───────────────────────────────────────────────────────────
