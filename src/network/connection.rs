//! Connection Handler
//!
//! Drives one client session through the protocol state machine:
//!
//! ```text
//! AwaitingCommand ──(empty / EOF)──────────────────────────────┐
//!    │ PUT            │ GET             │ other                │
//!    ▼                ▼                 ▼                      │
//! PutAwaitingPayload  │                 │                      │
//!    │                │                 │                      │
//!    ▼                ▼                 ▼                      │
//! Respond(PutDone)  Respond(GetDone)  Respond(UnknownDone)     │
//!    └────────────────┴────────┬────────┘                      │
//!                              ▼                               │
//!                      AwaitingTerminator ──► Closed ◄─────────┘
//! ```

use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::os::unix::net::UnixStream;

use crate::config::Config;
use crate::engine::Session;
use crate::error::{PathTrackError, Result};
use crate::protocol::{read_line, write_response, Command, PutPayload, Response, TERMINATOR};

/// What a session ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Empty first line or immediate EOF; nothing was written
    Silent,

    /// PUT stored
    Stored,

    /// GET answered with this many paths
    Listed(usize),

    /// PUT payload missing or malformed; storage untouched
    Rejected,

    /// First line was not a known command
    UnknownCommand,

    /// Storage failed inside a recognized command
    InternalError,
}

/// What arrived after the response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    /// `bye`
    Bye,

    /// Some other line, accepted anyway
    Other(String),

    /// A line that could not be decoded
    Unreadable,

    /// End-of-stream
    Missing,
}

/// Summary of a finished session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub outcome: Outcome,

    /// `None` when the terminator was never read (silent session, or the
    /// client left before the response could be written)
    pub terminator: Option<Terminator>,
}

enum State {
    AwaitingCommand,
    PutAwaitingPayload,
    Respond(Response, Outcome),
    AwaitingTerminator(Outcome),
    Closed(SessionSummary),
}

/// Handles a single client connection
pub struct Connection<R, W> {
    reader: R,
    writer: W,

    /// Storage session, released when the connection is dropped
    session: Session,

    /// Label for logging
    label: String,
}

impl Connection<BufReader<UnixStream>, BufWriter<UnixStream>> {
    /// Wrap an accepted socket
    ///
    /// Sets up buffered I/O and applies the configured timeouts.
    pub fn accept(stream: UnixStream, session: Session, config: &Config) -> Result<Self> {
        // Accepted sockets may inherit the listener's nonblocking flag
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(config.read_timeout())?;
        stream.set_write_timeout(config.write_timeout())?;

        let read_stream = stream.try_clone()?;
        let label = format!("conn#{}", session.id());

        Ok(Self::new(
            BufReader::new(read_stream),
            BufWriter::new(stream),
            session,
            label,
        ))
    }
}

impl<R: BufRead, W: Write> Connection<R, W> {
    pub fn new(reader: R, writer: W, session: Session, label: impl Into<String>) -> Self {
        Self {
            reader,
            writer,
            session,
            label: label.into(),
        }
    }

    /// Run the session to completion
    ///
    /// Protocol and storage failures are answered on the wire and end in
    /// `Ok`; only transport errors are returned as `Err`.
    pub fn handle(&mut self) -> Result<SessionSummary> {
        tracing::debug!("{}: client connected", self.label);

        let mut state = State::AwaitingCommand;
        loop {
            state = match state {
                State::AwaitingCommand => self.on_command()?,
                State::PutAwaitingPayload => self.on_put_payload()?,
                State::Respond(response, outcome) => self.on_respond(response, outcome)?,
                State::AwaitingTerminator(outcome) => {
                    let terminator = self.read_terminator()?;
                    State::Closed(SessionSummary {
                        outcome,
                        terminator: Some(terminator),
                    })
                }
                State::Closed(summary) => {
                    tracing::debug!("{}: client disconnected ({:?})", self.label, summary.outcome);
                    return Ok(summary);
                }
            };
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The writer (for inspecting in-memory output)
    pub fn writer(&self) -> &W {
        &self.writer
    }

    fn on_command(&mut self) -> Result<State> {
        let line = match self.next_line() {
            Ok(Some(line)) => line,
            Ok(None) => return Ok(silent()),
            Err(PathTrackError::Protocol(reason)) => {
                tracing::warn!("{}: unreadable command line: {}", self.label, reason);
                return Ok(State::Respond(Response::unknown_command(), Outcome::UnknownCommand));
            }
            Err(e) => return Err(e),
        };

        if line.trim().is_empty() {
            tracing::debug!("{}: no command was provided", self.label);
            return Ok(silent());
        }

        tracing::trace!("{}: command {:?}", self.label, line);

        Ok(match Command::parse(&line) {
            Command::Put => State::PutAwaitingPayload,
            Command::Get => self.execute_get(),
            Command::Unknown(raw) => {
                tracing::warn!("{}: unknown command: {}", self.label, raw);
                State::Respond(Response::unknown_command(), Outcome::UnknownCommand)
            }
        })
    }

    fn on_put_payload(&mut self) -> Result<State> {
        let line = match self.next_line() {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::warn!("{}: PUT without payload", self.label);
                return Ok(State::Respond(Response::error("missing payload"), Outcome::Rejected));
            }
            Err(PathTrackError::Protocol(reason)) => {
                tracing::warn!("{}: unreadable PUT payload: {}", self.label, reason);
                return Ok(State::Respond(Response::error(reason), Outcome::Rejected));
            }
            Err(e) => return Err(e),
        };

        let payload = match PutPayload::parse(&line) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("{}: rejected PUT payload {:?}: {}", self.label, line, e);
                return Ok(State::Respond(Response::error(e.to_string()), Outcome::Rejected));
            }
        };

        Ok(match self.session.upsert(&payload.path, payload.last_visited) {
            Ok(()) => State::Respond(Response::Ok, Outcome::Stored),
            Err(e) => {
                tracing::error!("{}: error handling PUT request: {}", self.label, e);
                State::Respond(Response::internal_error(), Outcome::InternalError)
            }
        })
    }

    fn execute_get(&mut self) -> State {
        match self.session.list_all() {
            Ok(entries) => {
                let paths: Vec<String> = entries.into_iter().map(|e| e.path).collect();
                let count = paths.len();
                tracing::debug!("{}: sending {} paths", self.label, count);
                State::Respond(Response::Listing(paths), Outcome::Listed(count))
            }
            Err(e) => {
                tracing::error!("{}: error handling GET request: {}", self.label, e);
                State::Respond(Response::internal_error(), Outcome::InternalError)
            }
        }
    }

    fn on_respond(&mut self, response: Response, outcome: Outcome) -> Result<State> {
        match write_response(&mut self.writer, &response) {
            Ok(()) => Ok(State::AwaitingTerminator(outcome)),
            Err(PathTrackError::Io(ref e)) if is_disconnect(e.kind()) => {
                // Client left before the response could be sent
                tracing::debug!("{}: client gone before response: {}", self.label, e);
                Ok(State::Closed(SessionSummary {
                    outcome,
                    terminator: None,
                }))
            }
            Err(e) => {
                tracing::warn!("{}: error writing response: {}", self.label, e);
                Err(e)
            }
        }
    }

    fn read_terminator(&mut self) -> Result<Terminator> {
        Ok(match self.next_line() {
            Ok(Some(line)) if line.trim() == TERMINATOR => Terminator::Bye,
            Ok(Some(line)) => {
                tracing::debug!("{}: terminator was {:?}, closing anyway", self.label, line);
                Terminator::Other(line)
            }
            Ok(None) => Terminator::Missing,
            Err(PathTrackError::Protocol(_)) => Terminator::Unreadable,
            Err(e) => return Err(e),
        })
    }

    /// Read a line; timeouts and resets count as end-of-stream
    fn next_line(&mut self) -> Result<Option<String>> {
        match read_line(&mut self.reader) {
            Err(PathTrackError::Io(ref e))
                if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                tracing::debug!("{}: read timed out", self.label);
                Ok(None)
            }
            Err(PathTrackError::Io(ref e)) if is_disconnect(e.kind()) => {
                tracing::debug!("{}: connection reset by client", self.label);
                Ok(None)
            }
            other => other,
        }
    }
}

fn silent() -> State {
    State::Closed(SessionSummary {
        outcome: Outcome::Silent,
        terminator: None,
    })
}

fn is_disconnect(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use std::io::Cursor;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn setup_engine() -> (TempDir, Arc<Engine>) {
        let temp = TempDir::new().unwrap();
        let engine = Arc::new(Engine::open_path(temp.path()).unwrap());
        (temp, engine)
    }

    /// Run one session over in-memory buffers; returns summary and output
    fn run(engine: &Arc<Engine>, input: &str) -> (SessionSummary, String) {
        let mut conn = Connection::new(
            Cursor::new(input.as_bytes().to_vec()),
            Vec::new(),
            engine.session(),
            "test",
        );
        let summary = conn.handle().unwrap();
        let output = String::from_utf8(conn.writer().clone()).unwrap();
        (summary, output)
    }

    #[test]
    fn test_empty_session_writes_nothing() {
        let (_temp, engine) = setup_engine();

        let (summary, output) = run(&engine, "");
        assert_eq!(summary.outcome, Outcome::Silent);
        assert_eq!(summary.terminator, None);
        assert!(output.is_empty());

        let (summary, output) = run(&engine, "\nGET\n");
        assert_eq!(summary.outcome, Outcome::Silent);
        assert!(output.is_empty());
    }

    #[test]
    fn test_put_then_get() {
        let (_temp, engine) = setup_engine();

        let (summary, output) = run(&engine, "PUT\n01:02:24 10:00:00|/a/b\nbye\n");
        assert_eq!(summary.outcome, Outcome::Stored);
        assert_eq!(summary.terminator, Some(Terminator::Bye));
        assert_eq!(output, "ok\n");

        let (summary, output) = run(&engine, "GET\nbye\n");
        assert_eq!(summary.outcome, Outcome::Listed(1));
        assert_eq!(output, "ok: 1\n/a/b\n");
    }

    #[test]
    fn test_unknown_command() {
        let (_temp, engine) = setup_engine();

        let (summary, output) = run(&engine, "DELETE\n");
        assert_eq!(summary.outcome, Outcome::UnknownCommand);
        assert_eq!(summary.terminator, Some(Terminator::Missing));
        assert_eq!(output, "error: Unknown command\n");
    }

    #[test]
    fn test_malformed_put_leaves_storage_unchanged() {
        let (_temp, engine) = setup_engine();
        run(&engine, "PUT\n01:02:24 10:00:00|/kept\nbye\n");

        let (summary, output) = run(&engine, "PUT\n01:02:24 10:00:00 /no/separator\n");
        assert_eq!(summary.outcome, Outcome::Rejected);
        assert!(output.starts_with("error: "));
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_put_without_payload() {
        let (_temp, engine) = setup_engine();

        let (summary, output) = run(&engine, "PUT\n");
        assert_eq!(summary.outcome, Outcome::Rejected);
        assert_eq!(output, "error: missing payload\n");
        assert!(engine.is_empty());
    }

    #[test]
    fn test_any_terminator_is_accepted() {
        let (_temp, engine) = setup_engine();

        let (summary, _) = run(&engine, "GET\nsee you\n");
        assert_eq!(summary.terminator, Some(Terminator::Other("see you".to_string())));
    }

    #[test]
    fn test_session_released_on_every_path() {
        let (_temp, engine) = setup_engine();

        for input in ["", "PUT\n", "PUT\nbad\n", "GET\n", "NOPE\n", "PUT\n01:01:24 00:00:00|/x\nbye\n"] {
            run(&engine, input);
            assert_eq!(engine.active_sessions(), 0, "input {:?}", input);
        }
    }
}
