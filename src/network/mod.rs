//! Network Module
//!
//! Unix socket server and per-connection handling.
//!
//! ## Architecture
//! - Single acceptor thread (the caller of `Server::run`)
//! - One handler thread per connection, capped by `max_connections`
//! - Each handler owns a storage session for its lifetime

mod server;
mod connection;

pub use server::{Server, ShutdownHandle};
pub use connection::{Connection, Outcome, SessionSummary, Terminator};
