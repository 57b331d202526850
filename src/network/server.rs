//! Unix Socket Server
//!
//! Owns the listening socket and hands every accepted connection to its own
//! handler thread.
//!
//! ## Shutdown
//! A [`ShutdownHandle`] queues a cancellation message and then connects to
//! the socket once, which wakes the blocking `accept`. The loop sees the
//! message, stops accepting, closes the listener and unlinks the socket
//! file. Handlers still running are not drained.

use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{self, Receiver, Sender};

use crate::config::Config;
use crate::engine::{Engine, Session};
use crate::error::{PathTrackError, Result};

use super::Connection;

/// Unix socket server for pathtrack
pub struct Server {
    config: Arc<Config>,
    engine: Arc<Engine>,
    listener: UnixListener,

    shutdown_tx: Sender<()>,
    shutdown_rx: Receiver<()>,

    /// Handlers currently running
    active: Arc<AtomicUsize>,
}

/// Cloneable trigger for stopping a running [`Server`]
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Sender<()>,
    socket_path: PathBuf,
}

impl ShutdownHandle {
    /// Ask the accept loop to stop
    ///
    /// Safe to call more than once, before `run`, or after the server exited.
    pub fn shutdown(&self) {
        // A full channel means a request is already pending
        let _ = self.tx.try_send(());

        // Wake a blocked accept; fails harmlessly once the socket is gone
        if let Err(e) = UnixStream::connect(&self.socket_path) {
            tracing::debug!("Shutdown wake-up connect failed: {}", e);
        }
    }
}

impl Server {
    /// Bind the configured socket
    ///
    /// Any stale file at the socket path is removed first.
    pub fn bind(config: Config, engine: Arc<Engine>) -> Result<Self> {
        config.validate()?;
        let socket_path = config.socket_path.clone();

        remove_stale_socket(&socket_path);

        let listener = UnixListener::bind(&socket_path).map_err(|source| PathTrackError::Bind {
            path: socket_path.clone(),
            source,
        })?;
        tracing::info!("Socket bound to {}", socket_path.display());

        let (shutdown_tx, shutdown_rx) = channel::bounded(1);

        Ok(Self {
            config: Arc::new(config),
            engine,
            listener,
            shutdown_tx,
            shutdown_rx,
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Handle for stopping the server from another thread
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
            socket_path: self.config.socket_path.clone(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    /// Run the accept loop until shut down (blocking)
    ///
    /// Returns `Err(Shutdown)` only if the socket file could not be removed
    /// afterwards; the listener is closed either way.
    pub fn run(self) -> Result<()> {
        tracing::info!("Server started, waiting for connections");
        let poll = self.config.accept_poll_interval();

        'accept: loop {
            // At capacity: hold off accepting until a handler finishes
            while self.active.load(Ordering::SeqCst) >= self.config.max_connections {
                if self.shutdown_rx.recv_timeout(poll).is_ok() {
                    break 'accept;
                }
            }

            let accepted = self.listener.accept();

            if self.shutdown_rx.try_recv().is_ok() {
                break;
            }

            match accepted {
                Ok((stream, _addr)) => self.dispatch(stream),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::error!("Socket accept error: {}", e);
                    // Avoid spinning on a persistent failure
                    if self.shutdown_rx.recv_timeout(poll).is_ok() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Shutdown requested, closing listener");
        self.close()
    }

    /// Spawn a handler thread for an accepted connection
    fn dispatch(&self, stream: UnixStream) {
        let session = self.engine.session();
        let guard = ActiveGuard::enter(&self.active);
        let config = Arc::clone(&self.config);

        let spawned = thread::Builder::new()
            .name(format!("conn-{}", session.id()))
            .spawn(move || {
                let _guard = guard;
                serve(stream, session, &config);
            });

        // On failure the closure is dropped, releasing session and guard
        if let Err(e) = spawned {
            tracing::error!("Failed to spawn connection handler: {}", e);
        }
    }

    fn close(self) -> Result<()> {
        let Server {
            config, listener, ..
        } = self;
        drop(listener);

        match fs::remove_file(&config.socket_path) {
            Ok(()) => {
                tracing::info!("Server stopped");
                Ok(())
            }
            Err(source) => {
                tracing::error!(
                    "Failed to unlink socket {}: {}. Still exiting.",
                    config.socket_path.display(),
                    source
                );
                Err(PathTrackError::Shutdown {
                    path: config.socket_path.clone(),
                    source,
                })
            }
        }
    }
}

/// Drive one connection to completion; failures stay inside this connection
fn serve(stream: UnixStream, session: Session, config: &Config) {
    let mut connection = match Connection::accept(stream, session, config) {
        Ok(connection) => connection,
        Err(e) => {
            tracing::warn!("Failed to set up connection: {}", e);
            return;
        }
    };

    match connection.handle() {
        Ok(summary) => tracing::trace!("{}: {:?}", connection.label(), summary),
        Err(e) => tracing::warn!("{}: error handling client: {}", connection.label(), e),
    }
}

fn remove_stale_socket(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!("Removed stale socket {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Could not remove stale socket {}: {}", path.display(), e),
    }
}

/// Counts a running handler until dropped
struct ActiveGuard {
    active: Arc<AtomicUsize>,
}

impl ActiveGuard {
    fn enter(active: &Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self {
            active: Arc::clone(active),
        }
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup(temp: &TempDir) -> (Config, Arc<Engine>) {
        let config = Config::builder()
            .db_dir(temp.path().join("db"))
            .socket_path(temp.path().join("pt.sock"))
            .build();
        let engine = Arc::new(Engine::open(config.clone()).unwrap());
        (config, engine)
    }

    #[test]
    fn test_bind_replaces_stale_file() {
        let temp = TempDir::new().unwrap();
        let (config, engine) = setup(&temp);
        fs::write(&config.socket_path, "stale").unwrap();

        let server = Server::bind(config.clone(), engine).unwrap();
        assert!(config.socket_path.exists());

        let handle = server.shutdown_handle();
        handle.shutdown();
        server.run().unwrap();
        assert!(!config.socket_path.exists());
    }

    #[test]
    fn test_bind_fails_when_parent_missing() {
        let temp = TempDir::new().unwrap();
        let (config, engine) = setup(&temp);
        let config = Config {
            socket_path: temp.path().join("missing").join("pt.sock"),
            ..config
        };

        let err = Server::bind(config, engine).err().unwrap();
        assert!(matches!(err, PathTrackError::Bind { .. }));
    }

    #[test]
    fn test_shutdown_reports_unlink_failure() {
        let temp = TempDir::new().unwrap();
        let (config, engine) = setup(&temp);

        let server = Server::bind(config.clone(), engine).unwrap();
        let handle = server.shutdown_handle();
        handle.shutdown();
        fs::remove_file(&config.socket_path).unwrap();

        let err = server.run().unwrap_err();
        assert!(matches!(err, PathTrackError::Shutdown { .. }));
    }

    #[test]
    fn test_active_guard_counts() {
        let active = Arc::new(AtomicUsize::new(0));
        let first = ActiveGuard::enter(&active);
        let second = ActiveGuard::enter(&active);
        assert_eq!(active.load(Ordering::SeqCst), 2);
        drop(first);
        drop(second);
        assert_eq!(active.load(Ordering::SeqCst), 0);
    }
}
