//! Engine Module
//!
//! The storage engine that owns every persisted path entry.
//!
//! ## Responsibilities
//! - Recover the path table from the WAL on startup
//! - Upsert visits durably (WAL first, then the table)
//! - Serve recency-ordered listings to concurrent readers
//! - Compact the WAL when it holds superseded records
//! - Hand out per-connection storage sessions

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::NaiveDateTime;
use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{PathTrackError, Result};
use crate::table::{validate_path, PathEntry, PathTable};
use crate::wal::{Operation, WalRecovery, WalWriter};

/// The storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (upsert/checkpoint): Serialized by the `wal` mutex
///   - Only ONE write operation at a time
///   - The record is synced to disk before the table changes, and the table
///     is updated while the mutex is still held so apply order matches log order
///
/// - **Reads** (list_all/get): Never take the `wal` mutex
///   - The table's RwLock admits many concurrent readers
///   - A reader sees a write either fully applied or not at all
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Location of the log file inside `db_dir`
    wal_path: PathBuf,

    /// Write-ahead log (exclusive access, doubles as the writer lock)
    ///
    /// `None` after a failed checkpoint that could not reopen the log;
    /// writes fail from then on.
    wal: Mutex<Option<WalWriter>>,

    /// Live view of all entries (internal RwLock)
    table: PathTable,

    /// Sessions currently open against this engine
    active_sessions: AtomicUsize,

    next_session_id: AtomicU64,
}

impl Engine {
    const WAL_FILENAME: &'static str = "paths.wal";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Create the database directory
    /// 2. Recover the WAL if it exists (truncating any torn tail)
    /// 3. Replay recovered visits into the table
    /// 4. Compact the log if it holds superseded records
    pub fn open(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.db_dir)?;
        let wal_path = config.db_dir.join(Self::WAL_FILENAME);

        match WalWriter::remove_stale_compaction(&wal_path) {
            Ok(true) => tracing::warn!("Removed leftover WAL compaction file"),
            Ok(false) => {}
            Err(e) => tracing::warn!("Could not remove leftover WAL compaction file: {}", e),
        }

        let table = PathTable::new();
        let mut next_lsn = 1;
        let mut records = 0;

        if wal_path.exists() {
            let (entries, recovery) = WalRecovery::recover(&wal_path)?;

            if recovery.entries_corrupted > 0 || recovery.was_truncated {
                tracing::warn!(
                    "WAL recovery: {} entries recovered, {} corrupted, last_lsn={}",
                    recovery.entries_recovered,
                    recovery.entries_corrupted,
                    recovery.last_lsn
                );
            } else {
                tracing::debug!(
                    "WAL recovery: {} entries recovered, last_lsn={}",
                    recovery.entries_recovered,
                    recovery.last_lsn
                );
            }

            for entry in entries {
                match entry.operation {
                    Operation::Visit { path, last_visited } => {
                        table.upsert(path, last_visited);
                    }
                }
            }

            next_lsn = recovery.last_lsn + 1;
            records = recovery.entries_recovered;
        }

        let wal = if config.compact_on_open && records > table.len() as u64 {
            tracing::info!(
                "Compacting WAL: {} records for {} paths",
                records,
                table.len()
            );
            WalWriter::rewrite(&wal_path, config.sync_mode, Self::snapshot_ops(&table))?
        } else {
            WalWriter::open(&wal_path, config.sync_mode, next_lsn)?
        };

        tracing::info!(
            "Database initialized at {} ({} paths)",
            config.db_dir.display(),
            table.len()
        );

        Ok(Self {
            config,
            wal_path,
            wal: Mutex::new(Some(wal)),
            table,
            active_sessions: AtomicUsize::new(0),
            next_session_id: AtomicU64::new(1),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified database directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().db_dir(path).build())
    }

    /// Insert or replace the entry for `path`
    ///
    /// When this returns `Ok`, the visit is on stable storage. On error the
    /// table is left untouched.
    pub fn upsert(&self, path: &str, last_visited: NaiveDateTime) -> Result<()> {
        validate_path(path)?;

        let mut guard = self.wal.lock();
        let wal = guard.as_mut().ok_or_else(wal_unavailable)?;
        let lsn = wal.append(Operation::Visit {
            path: path.to_string(),
            last_visited,
        })?;
        let created = self.table.upsert(path.to_string(), last_visited);
        drop(guard);

        tracing::debug!(
            "{} entry: {} at {} (lsn {})",
            if created { "Inserted" } else { "Updated" },
            path,
            last_visited,
            lsn
        );
        Ok(())
    }

    /// Every entry, most recently visited first
    pub fn list_all(&self) -> Result<Vec<PathEntry>> {
        Ok(self.table.by_recency())
    }

    /// Last visit time of a single path
    pub fn get(&self, path: &str) -> Option<NaiveDateTime> {
        self.table.get(path)
    }

    /// Rewrite the WAL so it holds exactly one record per path
    ///
    /// On failure the log may or may not have been replaced, so the writer
    /// is reopened on `wal_path` either way; appends must never go to an
    /// unlinked file.
    pub fn checkpoint(&self) -> Result<()> {
        let mut guard = self.wal.lock();
        let wal = guard.as_mut().ok_or_else(wal_unavailable)?;
        let before = wal.len();
        let next_lsn = wal.current_lsn();

        match WalWriter::rewrite(
            &self.wal_path,
            self.config.sync_mode,
            Self::snapshot_ops(&self.table),
        ) {
            Ok(rewritten) => {
                tracing::info!("WAL checkpoint: {} -> {} bytes", before, rewritten.len());
                *guard = Some(rewritten);
                Ok(())
            }
            Err(e) => {
                tracing::error!("WAL checkpoint failed: {}", e);
                *guard = None;
                match WalWriter::open(&self.wal_path, self.config.sync_mode, next_lsn) {
                    Ok(reopened) => *guard = Some(reopened),
                    Err(reopen) => {
                        tracing::error!("Could not reopen WAL, rejecting writes: {}", reopen)
                    }
                }
                Err(e)
            }
        }
    }

    /// Sync the WAL to disk
    pub fn sync(&self) -> Result<()> {
        self.wal.lock().as_mut().ok_or_else(wal_unavailable)?.sync()
    }

    /// Open a storage session for one connection
    ///
    /// The session is released when dropped.
    pub fn session(self: &Arc<Self>) -> Session {
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        self.active_sessions.fetch_add(1, Ordering::SeqCst);
        tracing::trace!("Storage session {} opened", id);
        Session {
            engine: Arc::clone(self),
            id,
        }
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Number of tracked paths
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Number of sessions not yet released
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::SeqCst)
    }

    /// Current WAL size in bytes
    pub fn wal_len(&self) -> u64 {
        self.wal.lock().as_ref().map_or(0, |wal| wal.len())
    }

    pub fn wal_path(&self) -> &Path {
        &self.wal_path
    }

    pub fn db_dir(&self) -> &Path {
        &self.config.db_dir
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Live entries as visit operations, oldest first
    fn snapshot_ops(table: &PathTable) -> Vec<Operation> {
        table
            .by_recency()
            .into_iter()
            .rev()
            .map(|entry| Operation::Visit {
                path: entry.path,
                last_visited: entry.last_visited,
            })
            .collect()
    }
}

fn wal_unavailable() -> PathTrackError {
    PathTrackError::Storage("WAL unavailable after a failed checkpoint".to_string())
}

/// A connection's handle on the engine
///
/// Holds no cached entries; every call goes to the engine.
pub struct Session {
    engine: Arc<Engine>,
    id: u64,
}

impl Session {
    pub fn upsert(&self, path: &str, last_visited: NaiveDateTime) -> Result<()> {
        self.engine.upsert(path, last_visited)
    }

    pub fn list_all(&self) -> Result<Vec<PathEntry>> {
        self.engine.list_all()
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.engine.active_sessions.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!("Storage session {} released", self.id);
    }
}
