//! pathtrack Server Binary
//!
//! Opens the path database and serves the Unix socket until SIGINT/SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use clap::{Parser, ValueEnum};
use pathtrack::config::{default_db_dir, DEFAULT_SOCKET_PATH};
use pathtrack::{Config, Engine, Server, SyncMode};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing_subscriber::{fmt, EnvFilter};

/// pathtrack server
#[derive(Parser, Debug)]
#[command(name = "pathtrack-server")]
#[command(about = "Tracks visited directories over a Unix socket")]
#[command(version)]
struct Args {
    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Database directory (defaults to $HOME/.local/share/paths)
    #[arg(short = 't', long, env = "PATHTRACK_DB_DIR")]
    db_dir: Option<PathBuf>,

    /// Unix socket path
    #[arg(short, long, env = "PATHTRACK_SOCKET", default_value = DEFAULT_SOCKET_PATH)]
    socket: PathBuf,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Drop a connection idle for this long (milliseconds, 0 = never)
    #[arg(long, default_value = "0")]
    read_timeout_ms: u64,

    /// How WAL writes are flushed to disk
    #[arg(long, value_enum, default_value = "full")]
    sync: SyncArg,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SyncArg {
    /// fsync (data and metadata)
    Full,
    /// fdatasync
    Data,
}

impl From<SyncArg> for SyncMode {
    fn from(arg: SyncArg) -> Self {
        match arg {
            SyncArg::Full => SyncMode::Full,
            SyncArg::Data => SyncMode::Data,
        }
    }
}

fn main() {
    let args = Args::parse();

    // Initialize tracing/logging; RUST_LOG takes precedence over --debug
    let default_level = if args.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    tracing::debug!("Logging initialized");
    tracing::info!("pathtrack server v{}", pathtrack::VERSION);

    // Build config from args
    let config = Config::builder()
        .db_dir(args.db_dir.unwrap_or_else(default_db_dir))
        .socket_path(args.socket)
        .max_connections(args.max_connections)
        .read_timeout_ms(args.read_timeout_ms)
        .sync_mode(args.sync.into())
        .build();

    if let Err(e) = config.validate() {
        tracing::error!("{}", e);
        std::process::exit(1);
    }

    // Open engine
    let engine = match Engine::open(config.clone()) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    let server = match Server::bind(config, engine) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    // SIGINT/SIGTERM request a cooperative shutdown of the accept loop
    let mut signals = match Signals::new([SIGINT, SIGTERM]) {
        Ok(signals) => signals,
        Err(e) => {
            tracing::error!("Failed to register signal handlers: {}", e);
            std::process::exit(1);
        }
    };
    let shutdown = server.shutdown_handle();
    thread::spawn(move || {
        if let Some(signal) = signals.forever().next() {
            tracing::info!("Received signal {}, shutting down...", signal);
            shutdown.shutdown();
        }
    });

    if let Err(e) = server.run() {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}
