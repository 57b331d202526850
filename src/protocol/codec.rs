//! Protocol codec
//!
//! Line framing helpers shared by the server and the client.

use std::io::{BufRead, Read, Write};

use super::{Command, Response};
use crate::error::{PathTrackError, Result};

/// Longest accepted line, excluding the LF (64 KB)
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Line the client sends to close a successful exchange
pub const TERMINATOR: &str = "bye";

/// Read one line, without its LF
///
/// Returns `Ok(None)` at end-of-stream. A final line without LF is still
/// returned. Over-long or non-UTF-8 lines are protocol errors.
pub fn read_line<R: BufRead>(reader: &mut R) -> Result<Option<String>> {
    let mut buf = Vec::new();
    let read = reader
        .by_ref()
        .take(MAX_LINE_LEN as u64 + 1)
        .read_until(b'\n', &mut buf)?;

    if read == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
    } else if buf.len() > MAX_LINE_LEN {
        return Err(PathTrackError::Protocol(format!(
            "line exceeds {} bytes",
            MAX_LINE_LEN
        )));
    }

    String::from_utf8(buf)
        .map(Some)
        .map_err(|_| PathTrackError::Protocol("line is not valid UTF-8".to_string()))
}

/// Write one line followed by LF (not flushed)
pub fn write_line<W: Write>(writer: &mut W, line: &str) -> Result<()> {
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// Write a command line (not flushed)
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    write_line(writer, command.as_str())
}

/// Write a full response and flush it
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    write_line(writer, &response.header())?;
    if let Response::Listing(paths) = response {
        for path in paths {
            write_line(writer, path)?;
        }
    }
    writer.flush()?;
    Ok(())
}
