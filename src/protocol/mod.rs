//! Protocol Module
//!
//! Line-oriented text protocol spoken over the Unix socket. One request per
//! connection; every line is UTF-8 terminated by LF.
//!
//! ## Request
//! ```text
//! PUT\n
//! <DD:MM:YY HH:MM:SS>|<path>\n
//!
//! GET\n
//! ```
//!
//! ## Response
//! ```text
//! ok\n                         (PUT accepted)
//! ok: <N>\n<path>\n x N        (GET listing, most recent first)
//! error: <message>\n           (rejected or failed)
//! ```
//!
//! ## Terminator
//! The client closes a successful exchange with `bye\n`. The server reads one
//! line after its response and accepts any content, or end-of-stream.

mod command;
mod payload;
mod response;
mod codec;

pub use command::Command;
pub use payload::{format_timestamp, parse_timestamp, PutPayload, TIMESTAMP_FORMAT};
pub use response::{Response, ResponseHeader, INTERNAL_ERROR, UNKNOWN_COMMAND};
pub use codec::{read_line, write_command, write_line, write_response, MAX_LINE_LEN, TERMINATOR};
