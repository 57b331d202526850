//! Configuration for pathtrack
//!
//! Centralized configuration with sensible defaults. A `Config` is built once
//! at startup and handed to the engine and the listener; nothing re-reads the
//! environment afterwards.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{PathTrackError, Result};

/// Default Unix socket path
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/path_tracker.sock";

/// Database directory relative to the user's home
pub const DEFAULT_SHARED_PATH: &str = ".local/share/paths";

/// Main configuration for a pathtrack instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory holding the database files
    /// Internal structure:
    ///   {db_dir}/
    ///     └── paths.wal        (write-ahead log, the durable table)
    pub db_dir: PathBuf,

    /// How a WAL append is made durable
    pub sync_mode: SyncMode,

    /// Rewrite the log on open when it holds superseded records
    pub compact_on_open: bool,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// Unix socket the server listens on
    pub socket_path: PathBuf,

    /// Max concurrently running connection handlers
    pub max_connections: usize,

    /// Connection read timeout (milliseconds, 0 = wait forever)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = wait forever)
    pub write_timeout_ms: u64,

    /// How often the accept loop checks for shutdown while idle (milliseconds)
    pub accept_poll_ms: u64,
}

/// Durability mode for WAL appends
///
/// Both modes flush to stable storage before the append returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// fsync data and metadata after every write
    Full,

    /// fdatasync after every write (skips metadata not needed to read the data back)
    Data,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_dir: default_db_dir(),
            sync_mode: SyncMode::Full,
            compact_on_open: true,
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            max_connections: 1024,
            read_timeout_ms: 0,
            write_timeout_ms: 0,
            accept_poll_ms: 50,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Read timeout as a `Duration`, `None` when disabled
    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_ms > 0).then(|| Duration::from_millis(self.read_timeout_ms))
    }

    /// Write timeout as a `Duration`, `None` when disabled
    pub fn write_timeout(&self) -> Option<Duration> {
        (self.write_timeout_ms > 0).then(|| Duration::from_millis(self.write_timeout_ms))
    }

    pub fn accept_poll_interval(&self) -> Duration {
        Duration::from_millis(self.accept_poll_ms.max(1))
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(PathTrackError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.socket_path.as_os_str().is_empty() {
            return Err(PathTrackError::Config("socket path is empty".to_string()));
        }
        if self.db_dir.as_os_str().is_empty() {
            return Err(PathTrackError::Config("database directory is empty".to_string()));
        }
        Ok(())
    }
}

/// `$HOME/.local/share/paths`, or a relative fallback when `HOME` is unset
pub fn default_db_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(DEFAULT_SHARED_PATH),
        None => PathBuf::from(".").join(DEFAULT_SHARED_PATH),
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the database directory
    pub fn db_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.db_dir = path.into();
        self
    }

    /// Set the WAL sync mode
    pub fn sync_mode(mut self, mode: SyncMode) -> Self {
        self.config.sync_mode = mode;
        self
    }

    /// Enable or disable log compaction on open
    pub fn compact_on_open(mut self, enabled: bool) -> Self {
        self.config.compact_on_open = enabled;
        self
    }

    /// Set the Unix socket path
    pub fn socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.socket_path = path.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the accept loop's shutdown polling interval (in milliseconds)
    pub fn accept_poll_ms(mut self, ms: u64) -> Self {
        self.config.accept_poll_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_defaults() {
        let config = Config::builder()
            .db_dir("/tmp/pt-db")
            .socket_path("/tmp/pt.sock")
            .sync_mode(SyncMode::Data)
            .max_connections(8)
            .read_timeout_ms(250)
            .build();

        assert_eq!(config.db_dir, PathBuf::from("/tmp/pt-db"));
        assert_eq!(config.socket_path, PathBuf::from("/tmp/pt.sock"));
        assert_eq!(config.sync_mode, SyncMode::Data);
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.read_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.write_timeout(), None);
    }

    #[test]
    fn test_default_socket_path() {
        let config = Config::default();
        assert_eq!(config.socket_path, PathBuf::from(DEFAULT_SOCKET_PATH));
        assert!(config.db_dir.ends_with(DEFAULT_SHARED_PATH));
        assert!(config.compact_on_open);
    }

    #[test]
    fn test_validate_rejects_zero_connections() {
        let config = Config::builder().max_connections(0).build();
        assert!(matches!(config.validate(), Err(PathTrackError::Config(_))));
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_zero_poll_interval_is_clamped() {
        let config = Config::builder().accept_poll_ms(0).build();
        assert_eq!(config.accept_poll_interval(), Duration::from_millis(1));
    }
}
