//! Recovery Flow: Rebuild the timestamp index from the journal on boot
//!
//! Recovery process:
//! 1. Scan every journal file in index order, validating checksums
//! 2. Collect `(timestamp, sequence, location)` for each valid record
//! 3. Skip (and log) records whose checksum does not match
//! 4. Report unreadable file tails without touching them; when the newest
//!    file has one, the writer must continue in a fresh file
//! 5. Report the next sequence number to resume from

use crate::journal::RecordLocation;
use crate::reader::{CorruptionKind, CorruptionRecord, JournalReader, ReaderError};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("Reader error: {0}")]
    Reader(#[from] ReaderError),
}

// ── Recovery Report ─────────────────────────────────────────────────

/// What recovery found. Logged at startup.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecoveryReport {
    pub files_scanned: usize,
    pub records_recovered: u64,
    /// Records dropped because their checksum did not match.
    pub corrupt_records: u64,
    /// Bytes past the last readable frame, summed over all files. Never
    /// deleted.
    pub unreadable_bytes: u64,
    /// The newest file ends unreadably and must not be appended to.
    pub seal_newest: bool,
    pub last_sequence: Option<u64>,
    pub elapsed_ms: u64,
    pub corruption: Vec<CorruptionRecord>,
}

impl RecoveryReport {
    /// True when every byte of every file was readable.
    pub fn is_clean(&self) -> bool {
        self.corruption.is_empty()
    }

    pub fn next_sequence(&self) -> u64 {
        self.last_sequence.map_or(1, |s| s + 1)
    }
}

/// Index key material for one recovered record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedRecord {
    pub timestamp: u64,
    pub sequence: u64,
    pub location: RecordLocation,
}

/// Scan the journal in `dir` and return every readable record's index data.
pub fn recover(dir: &Path) -> Result<(Vec<IndexedRecord>, RecoveryReport), RecoveryError> {
    let start = Instant::now();
    let mut report = RecoveryReport::default();

    let mut reader = JournalReader::open(dir)?;
    let mut records = Vec::new();

    while let Some(scanned) = reader.next_record()? {
        let sequence = scanned.record.sequence;
        if let Some(last) = report.last_sequence {
            if sequence <= last {
                warn!(sequence, last, "Journal sequence not monotonic");
            }
        }
        report.last_sequence = Some(report.last_sequence.map_or(sequence, |l| l.max(sequence)));

        records.push(IndexedRecord {
            timestamp: scanned.record.timestamp,
            sequence,
            location: scanned.location,
        });
    }

    report.records_recovered = records.len() as u64;
    report.corruption = reader.corruption_log().to_vec();
    report.corrupt_records = report
        .corruption
        .iter()
        .filter(|c| c.kind == CorruptionKind::ChecksumMismatch)
        .count() as u64;

    for c in &report.corruption {
        warn!(
            file_index = c.file_index,
            offset = c.byte_offset,
            kind = ?c.kind,
            detail = %c.detail,
            "Journal corruption"
        );
    }

    let scans = reader.file_scans();
    report.files_scanned = scans.len();
    let newest = scans.iter().map(|s| s.file_index).max();

    for scan in scans.iter().filter(|s| s.has_unreadable_tail()) {
        let bytes = scan.len - scan.valid_len;
        if Some(scan.file_index) == newest {
            report.seal_newest = true;
        }
        warn!(
            path = %scan.path.display(),
            valid_len = scan.valid_len,
            bytes,
            "Unreadable journal tail left in place"
        );
        report.unreadable_bytes += bytes;
    }

    report.elapsed_ms = start.elapsed().as_millis() as u64;

    info!(
        files = report.files_scanned,
        records = report.records_recovered,
        corrupt = report.corrupt_records,
        unreadable_bytes = report.unreadable_bytes,
        elapsed_ms = report.elapsed_ms,
        "Journal recovery complete"
    );

    Ok((records, report))
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::{list_journal_files, JournalConfig, JournalWriter};
    use std::fs;
    use tempfile::TempDir;

    fn write_records(dir: &Path, timestamps: &[u64]) -> Vec<RecordLocation> {
        let mut writer = JournalWriter::open(JournalConfig::new(dir)).unwrap();
        timestamps
            .iter()
            .map(|ts| writer.append(*ts, vec![1, 2, 3]).unwrap().1)
            .collect()
    }

    #[test]
    fn test_recover_empty() {
        let tmp = TempDir::new().unwrap();
        let (records, report) = recover(tmp.path()).unwrap();
        assert!(records.is_empty());
        assert!(report.is_clean());
        assert_eq!(report.next_sequence(), 1);
    }

    #[test]
    fn test_recover_collects_index_data() {
        let tmp = TempDir::new().unwrap();
        let locations = write_records(tmp.path(), &[30, 10, 20]);

        let (records, report) = recover(tmp.path()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].timestamp, 30);
        assert_eq!(records[1].timestamp, 10);
        assert_eq!(records[2].sequence, 3);
        assert_eq!(records[2].location, locations[2]);
        assert_eq!(report.last_sequence, Some(3));
        assert_eq!(report.next_sequence(), 4);
        assert!(report.is_clean());
    }

    #[test]
    fn test_torn_tail_is_kept_and_newest_sealed() {
        let tmp = TempDir::new().unwrap();
        write_records(tmp.path(), &[1, 2, 3]);

        let path = list_journal_files(tmp.path()).unwrap().remove(0).1;
        let mut data = fs::read(&path).unwrap();
        // Simulate a crash halfway through a fourth frame
        data.extend_from_slice(&[0x30, 0x00, 0x00, 0x00, 0x01, 0x02]);
        fs::write(&path, &data).unwrap();

        let (records, report) = recover(tmp.path()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(report.unreadable_bytes, 6);
        assert!(report.seal_newest);
        assert_eq!(fs::metadata(&path).unwrap().len(), data.len() as u64);
    }

    #[test]
    fn test_mid_file_damage_keeps_later_records_on_disk() {
        let tmp = TempDir::new().unwrap();
        let locations = write_records(tmp.path(), &[1, 2, 3, 4]);

        let path = list_journal_files(tmp.path()).unwrap().remove(0).1;
        let mut data = fs::read(&path).unwrap();
        // Flip the high byte of the second frame's body length
        data[locations[1].offset as usize + 3] ^= 0x7F;
        fs::write(&path, &data).unwrap();

        let (records, report) = recover(tmp.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert!(report.seal_newest);
        let end = locations[3].offset + locations[3].len as u64;
        assert_eq!(report.unreadable_bytes, end - locations[1].offset);

        // Records behind the damage are still on disk, byte for byte
        assert_eq!(fs::read(&path).unwrap(), data);
    }

    #[test]
    fn test_checksum_mismatch_counted() {
        let tmp = TempDir::new().unwrap();
        let locations = write_records(tmp.path(), &[1, 2, 3]);

        let path = list_journal_files(tmp.path()).unwrap().remove(0).1;
        let mut data = fs::read(&path).unwrap();
        data[locations[0].offset as usize + 24] ^= 0xFF;
        fs::write(&path, &data).unwrap();

        let (records, report) = recover(tmp.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(report.corrupt_records, 1);
        assert_eq!(report.unreadable_bytes, 0);
        assert!(!report.seal_newest);
        assert!(!report.is_clean());
        // Sequence resumes after the highest surviving record
        assert_eq!(report.next_sequence(), 4);
    }

    #[test]
    fn test_sealed_file_tail_not_truncated() {
        let tmp = TempDir::new().unwrap();
        let config = JournalConfig {
            max_file_size: 60,
            ..JournalConfig::new(tmp.path())
        };
        let mut writer = JournalWriter::open(config).unwrap();
        for ts in 1..=6 {
            writer.append(ts, vec![0; 8]).unwrap();
        }
        drop(writer);

        let files = list_journal_files(tmp.path()).unwrap();
        assert!(files.len() > 1);
        let sealed = &files[0].1;
        let mut data = fs::read(sealed).unwrap();
        data.extend_from_slice(&[0xFF; 3]);
        fs::write(sealed, &data).unwrap();
        let sealed_len = data.len() as u64;

        let (records, report) = recover(tmp.path()).unwrap();
        assert_eq!(records.len(), 6);
        assert_eq!(report.unreadable_bytes, 3);
        assert!(!report.seal_newest);
        assert_eq!(fs::metadata(sealed).unwrap().len(), sealed_len);
    }
}
