//! WAL Writer
//!
//! Appends framed records to the WAL file and makes each one durable
//! before returning.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::{Operation, WalEntry};
use crate::config::SyncMode;
use crate::error::{PathTrackError, Result};

/// Writes entries to the WAL file
pub struct WalWriter {
    path: PathBuf,
    file: File,

    /// LSN the next append will receive
    next_lsn: u64,

    /// File length after the last successful append
    len: u64,

    sync_mode: SyncMode,
}

impl WalWriter {
    /// Open or create a WAL file, continuing at `next_lsn`
    pub fn open(path: &Path, sync_mode: SyncMode, next_lsn: u64) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let len = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            next_lsn: next_lsn.max(1),
            len,
            sync_mode,
        })
    }

    /// Append an operation and flush it to stable storage
    ///
    /// Returns the LSN assigned to the record. On failure the file is cut
    /// back to its previous length so no partial record remains.
    pub fn append(&mut self, operation: Operation) -> Result<u64> {
        let lsn = self.next_lsn;
        let bytes = WalEntry::new(lsn, operation).serialize()?;

        if let Err(e) = self.write_durably(&bytes) {
            self.rollback();
            return Err(PathTrackError::WalWrite(format!(
                "append of lsn {} to {} failed: {}",
                lsn,
                self.path.display(),
                e
            )));
        }

        self.len += bytes.len() as u64;
        self.next_lsn += 1;
        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        match self.sync_mode {
            SyncMode::Full => self.file.sync_all()?,
            SyncMode::Data => self.file.sync_data()?,
        }
        Ok(())
    }

    /// Get the LSN the next append will receive
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// Current length of the log in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically replace the log at `path` with `operations`
    ///
    /// Writes a sibling temp file, syncs it, renames it over `path` and syncs
    /// the directory. Returns a writer positioned after the new records.
    ///
    /// The rename is the commit point: an error before it leaves the old log
    /// in place, an error after it leaves the new one. Either way the only
    /// safe writer to keep is one reopened on `path`.
    pub fn rewrite<I>(path: &Path, sync_mode: SyncMode, operations: I) -> Result<Self>
    where
        I: IntoIterator<Item = Operation>,
    {
        let tmp_path = Self::compaction_path(path);
        let last_lsn = match Self::write_compacted(&tmp_path, operations) {
            Ok(last_lsn) => last_lsn,
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            File::open(dir)?.sync_all()?;
        }

        Self::open(path, sync_mode, last_lsn + 1)
    }

    /// Delete a temp file left behind by a rewrite that never committed
    ///
    /// Returns whether one was found.
    pub fn remove_stale_compaction(path: &Path) -> Result<bool> {
        match fs::remove_file(Self::compaction_path(path)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Temp file a rewrite of `path` goes through
    pub fn compaction_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(".compact");
        PathBuf::from(name)
    }

    fn write_compacted<I>(tmp_path: &Path, operations: I) -> Result<u64>
    where
        I: IntoIterator<Item = Operation>,
    {
        let mut tmp = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(tmp_path)?;
        let mut lsn = 0;
        for operation in operations {
            lsn += 1;
            tmp.write_all(&WalEntry::new(lsn, operation).serialize()?)?;
        }
        tmp.sync_all()?;
        Ok(lsn)
    }

    fn write_durably(&mut self, bytes: &[u8]) -> Result<()> {
        self.file.write_all(bytes)?;
        self.sync()
    }

    fn rollback(&mut self) {
        if let Err(e) = self.file.set_len(self.len) {
            tracing::error!(
                "Failed to roll back partial WAL record in {}: {}",
                self.path.display(),
                e
            );
        }
    }
}
