//! Client for the pathtrack server
//!
//! Single-shot: each `Client` opens one connection, issues exactly one
//! command and is consumed by it.

use std::fs;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;

use chrono::{Local, NaiveDateTime};

use crate::error::{PathTrackError, Result};
use crate::protocol::{
    read_line, write_command, write_line, Command, PutPayload, ResponseHeader, TERMINATOR,
};
use crate::table::validate_path;

/// Client for one exchange with the server
pub struct Client {
    reader: BufReader<UnixStream>,
    writer: BufWriter<UnixStream>,
}

impl Client {
    /// Connect to the server's socket
    pub fn connect(socket_path: impl AsRef<Path>) -> Result<Self> {
        let path = socket_path.as_ref();
        let stream = UnixStream::connect(path).map_err(|source| PathTrackError::Connection {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_stream(stream)
    }

    /// Use an already connected stream
    pub fn from_stream(stream: UnixStream) -> Result<Self> {
        let read_half = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(stream),
        })
    }

    /// Record the current working directory as visited now
    ///
    /// Returns the path that was sent.
    pub fn put_current_dir(self) -> Result<String> {
        let path = current_dir()?;
        let now = Local::now().naive_local();
        self.put(&path, now)?;
        Ok(path)
    }

    /// Record `path` as visited at `visited_at`
    ///
    /// Paths the line protocol cannot carry are rejected before anything is sent.
    pub fn put(mut self, path: &str, visited_at: NaiveDateTime) -> Result<()> {
        validate_path(path)?;

        write_command(&mut self.writer, &Command::Put)?;
        write_line(&mut self.writer, &PutPayload::new(path, visited_at).encode())?;
        self.writer.flush()?;

        let line = self.read_response_line()?;
        match ResponseHeader::parse(&line)? {
            ResponseHeader::Ok => {
                self.send_terminator();
                Ok(())
            }
            ResponseHeader::Error(message) => {
                Err(PathTrackError::ServerError(format!("error: {}", message)))
            }
            ResponseHeader::Listing(_) => Err(PathTrackError::UnexpectedResponse(line)),
        }
    }

    /// Fetch every tracked path, most recent first
    pub fn get(mut self) -> Result<Vec<String>> {
        write_command(&mut self.writer, &Command::Get)?;
        self.writer.flush()?;

        let line = self.read_response_line()?;
        let count = match ResponseHeader::parse(&line)? {
            ResponseHeader::Listing(count) => count,
            ResponseHeader::Error(message) => {
                return Err(PathTrackError::ServerError(format!("error: {}", message)))
            }
            ResponseHeader::Ok => return Err(PathTrackError::UnexpectedResponse(line)),
        };

        let mut paths = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            match read_line(&mut self.reader)? {
                Some(path) => paths.push(path),
                None => return Err(PathTrackError::ConnectionClosed),
            }
        }

        self.send_terminator();
        Ok(paths)
    }

    fn read_response_line(&mut self) -> Result<String> {
        read_line(&mut self.reader)?.ok_or(PathTrackError::ConnectionClosed)
    }

    /// Send `bye`; the exchange already succeeded, so failures are only logged
    fn send_terminator(&mut self) {
        let sent = write_line(&mut self.writer, TERMINATOR).and_then(|_| {
            self.writer.flush()?;
            Ok(())
        });
        match sent {
            Ok(()) => {}
            Err(PathTrackError::Io(ref e))
                if matches!(e.kind(), ErrorKind::BrokenPipe | ErrorKind::ConnectionReset) =>
            {
                tracing::debug!("Server closed before terminator: {}", e);
            }
            Err(e) => tracing::warn!("Failed to send terminator: {}", e),
        }
    }
}

/// Canonical current directory as UTF-8
fn current_dir() -> Result<String> {
    let cwd = std::env::current_dir()?;
    let resolved = fs::canonicalize(&cwd).unwrap_or(cwd);
    resolved.into_os_string().into_string().map_err(|raw| {
        PathTrackError::Protocol(format!(
            "current directory is not valid UTF-8: {}",
            raw.to_string_lossy()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, Read};
    use std::thread;

    /// Fake server: reads `expect_lines` lines, writes `reply`, returns what it read
    fn scripted(reply: &'static str, expect_lines: usize) -> (Client, thread::JoinHandle<Vec<String>>) {
        let (client_end, server_end) = UnixStream::pair().unwrap();
        let handle = thread::spawn(move || {
            let mut reader = BufReader::new(server_end.try_clone().unwrap());
            let mut lines = Vec::new();
            for _ in 0..expect_lines {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                lines.push(line);
            }
            let mut writer = server_end;
            writer.write_all(reply.as_bytes()).unwrap();
            writer.flush().unwrap();
            // Collect whatever else the client sends (e.g. the terminator)
            let mut rest = String::new();
            let _ = reader.read_to_string(&mut rest);
            if !rest.is_empty() {
                lines.push(rest);
            }
            lines
        });
        (Client::from_stream(client_end).unwrap(), handle)
    }

    #[test]
    fn test_get_reads_listing_and_says_bye() {
        let (client, server) = scripted("ok: 2\n/b\n/a\n", 1);
        let paths = client.get().unwrap();
        assert_eq!(paths, vec!["/b", "/a"]);
        assert_eq!(server.join().unwrap(), vec!["GET\n", "bye\n"]);
    }

    #[test]
    fn test_put_error_sends_no_terminator() {
        let (client, server) = scripted("error: boom\n", 2);
        let ts = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();

        let err = client.put("/x", ts).unwrap_err();
        assert_eq!(err.to_string(), "error: boom");
        assert_eq!(server.join().unwrap(), vec!["PUT\n", "01:01:24 00:00:00|/x\n"]);
    }
}
