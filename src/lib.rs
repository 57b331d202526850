//! # pathtrack
//!
//! Remembers which directories a user visited and lists them most recent
//! first:
//! - Durable path table backed by a checksummed write-ahead log
//! - Single-writer/multi-reader concurrency model
//! - Unix socket server, one handler thread per connection
//! - Single-shot client for shell hooks
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────┐   PUT / GET    ┌─────────────────────────────┐
//! │    Client    │ ─────────────► │   Server (accept loop)      │
//! │ (one request)│ ◄───────────── │   Unix socket listener      │
//! └──────────────┘   ok / error   └──────────────┬──────────────┘
//!                                                │ one thread each
//!                                 ┌──────────────▼──────────────┐
//!                                 │   Connection handler        │
//!                                 │   (protocol state machine)  │
//!                                 └──────────────┬──────────────┘
//!                                                │ Session
//!                                 ┌──────────────▼──────────────┐
//!                                 │           Engine            │
//!                                 │  (single writer / readers)  │
//!                                 └───────┬─────────────┬───────┘
//!                                         │             │
//!                                         ▼             ▼
//!                                  ┌───────────┐  ┌───────────┐
//!                                  │    WAL    │  │ PathTable │
//!                                  │ (durable) │  │ (RwLock)  │
//!                                  └───────────┘  └───────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod wal;
pub mod table;
pub mod engine;
pub mod protocol;
pub mod network;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{PathTrackError, Result};
pub use config::{Config, SyncMode};
pub use engine::{Engine, Session};
pub use table::PathEntry;
pub use network::{Server, ShutdownHandle};
pub use client::Client;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of pathtrack
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
