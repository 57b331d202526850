//! Response definitions
//!
//! What the server writes back, and how the client reads the first line.

use crate::error::{PathTrackError, Result};

/// Message for a command the server does not know
pub const UNKNOWN_COMMAND: &str = "Unknown command";

/// Message for any failure inside a recognized command
pub const INTERNAL_ERROR: &str = "Internal server error";

/// A response to send to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// PUT accepted
    Ok,

    /// GET result: header `ok: N` followed by N path lines
    Listing(Vec<String>),

    /// `error: <message>`
    Error(String),
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error(message.into())
    }

    pub fn unknown_command() -> Self {
        Response::Error(UNKNOWN_COMMAND.to_string())
    }

    pub fn internal_error() -> Self {
        Response::Error(INTERNAL_ERROR.to_string())
    }

    /// First line of the response (without LF)
    pub fn header(&self) -> String {
        match self {
            Response::Ok => "ok".to_string(),
            Response::Listing(paths) => format!("ok: {}", paths.len()),
            Response::Error(message) => format!("error: {}", message),
        }
    }
}

/// First response line as seen by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseHeader {
    /// `ok`
    Ok,

    /// `ok: N`
    Listing(usize),

    /// `error: <message>`
    Error(String),
}

impl ResponseHeader {
    /// Parse a response's first line
    ///
    /// Lines that are none of the known forms are `UnexpectedResponse`.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();

        if line == "ok" {
            return Ok(ResponseHeader::Ok);
        }
        if let Some(count) = line.strip_prefix("ok:") {
            return count.trim().parse().map(ResponseHeader::Listing).map_err(|_| {
                PathTrackError::Protocol(format!("invalid entry count in response: {}", line))
            });
        }
        if let Some(message) = line.strip_prefix("error:") {
            return Ok(ResponseHeader::Error(message.trim().to_string()));
        }

        Err(PathTrackError::UnexpectedResponse(line.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers() {
        assert_eq!(Response::Ok.header(), "ok");
        assert_eq!(
            Response::Listing(vec!["/a".into(), "/b".into()]).header(),
            "ok: 2"
        );
        assert_eq!(Response::unknown_command().header(), "error: Unknown command");
        assert_eq!(
            Response::internal_error().header(),
            "error: Internal server error"
        );
    }

    #[test]
    fn test_parse_header_forms() {
        assert_eq!(ResponseHeader::parse("ok").unwrap(), ResponseHeader::Ok);
        assert_eq!(ResponseHeader::parse("ok: 3").unwrap(), ResponseHeader::Listing(3));
        assert_eq!(ResponseHeader::parse("ok:0").unwrap(), ResponseHeader::Listing(0));
        assert_eq!(
            ResponseHeader::parse("error: Unknown command").unwrap(),
            ResponseHeader::Error("Unknown command".to_string())
        );
    }

    #[test]
    fn test_parse_header_rejects_garbage() {
        assert!(matches!(
            ResponseHeader::parse("hello"),
            Err(PathTrackError::UnexpectedResponse(_))
        ));
        assert!(matches!(
            ResponseHeader::parse("ok: many"),
            Err(PathTrackError::Protocol(_))
        ));
        assert!(matches!(
            ResponseHeader::parse(""),
            Err(PathTrackError::UnexpectedResponse(_))
        ));
    }
}
