//! WAL Recovery
//!
//! Handles crash recovery by replaying the WAL.

use std::fs::OpenOptions;
use std::path::Path;

use super::reader::{RecordRead, WalReader};
use super::WalEntry;
use crate::error::Result;

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of complete records that failed validation
    pub entries_corrupted: u64,

    /// Last valid LSN (0 when the log is empty)
    pub last_lsn: u64,

    /// Whether bytes past the last valid record were (or would be) removed
    pub was_truncated: bool,
}

impl WalRecovery {
    /// Recover entries from a WAL file
    ///
    /// This will:
    /// 1. Read all valid entries in order
    /// 2. Stop at the first torn or corrupted record
    /// 3. Truncate the file to the last valid record
    /// 4. Return the valid entries
    pub fn recover(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult)> {
        let (entries, result, valid_len) = Self::scan(path, true)?;

        if result.was_truncated {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(valid_len)?;
            file.sync_all()?;
            tracing::warn!(
                "Truncated WAL {} to {} bytes after last valid record (lsn {})",
                path.display(),
                valid_len,
                result.last_lsn
            );
        }

        Ok((entries, result))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let (_, result, _) = Self::scan(path, false)?;
        Ok(result)
    }

    fn scan(path: &Path, keep_entries: bool) -> Result<(Vec<WalEntry>, RecoveryResult, u64)> {
        let file_len = std::fs::metadata(path)?.len();
        let mut reader = WalReader::open(path)?;
        let mut entries = Vec::new();
        let mut result = RecoveryResult::default();

        loop {
            match reader.read_record()? {
                RecordRead::Entry(entry) => {
                    result.entries_recovered += 1;
                    result.last_lsn = entry.lsn;
                    if keep_entries {
                        entries.push(entry);
                    }
                }
                RecordRead::End => break,
                RecordRead::Torn => {
                    tracing::debug!("Partial WAL record at offset {}", reader.valid_len());
                    break;
                }
                RecordRead::Corrupt(reason) => {
                    tracing::warn!(
                        "Corrupted WAL record at offset {}: {}",
                        reader.valid_len(),
                        reason
                    );
                    result.entries_corrupted += 1;
                    break;
                }
            }
        }

        let valid_len = reader.valid_len();
        result.was_truncated = valid_len < file_len;
        Ok((entries, result, valid_len))
    }
}
