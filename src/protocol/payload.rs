//! PUT payload
//!
//! `<timestamp>|<path>` where the timestamp is local time without a zone.

use chrono::NaiveDateTime;

use crate::error::{PathTrackError, Result};

/// Wire format of visit timestamps, e.g. `17:05:24 09:41:07`
pub const TIMESTAMP_FORMAT: &str = "%d:%m:%y %H:%M:%S";

/// Parse a wire timestamp
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).map_err(|source| {
        PathTrackError::InvalidTimestamp {
            value: value.to_string(),
            source,
        }
    })
}

/// Render a timestamp in wire format (sub-second precision is dropped)
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// The line following `PUT`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutPayload {
    pub last_visited: NaiveDateTime,
    pub path: String,
}

impl PutPayload {
    pub fn new(path: impl Into<String>, last_visited: NaiveDateTime) -> Self {
        Self {
            last_visited,
            path: path.into(),
        }
    }

    /// Parse a payload line (without its LF)
    ///
    /// Splits on the first `|`, so the path itself may contain `|`. The path
    /// is taken verbatim.
    pub fn parse(line: &str) -> Result<Self> {
        let (timestamp, path) = line.split_once('|').ok_or_else(|| {
            PathTrackError::Protocol(
                "malformed payload: expected '<timestamp>|<path>'".to_string(),
            )
        })?;

        let last_visited = parse_timestamp(timestamp.trim())?;

        if path.is_empty() {
            return Err(PathTrackError::Protocol(
                "malformed payload: empty path".to_string(),
            ));
        }

        Ok(Self {
            last_visited,
            path: path.to_string(),
        })
    }

    /// Wire form of the payload (without LF)
    pub fn encode(&self) -> String {
        format!("{}|{}", format_timestamp(&self.last_visited), self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_valid_payload() {
        let payload = PutPayload::parse("17:05:24 09:41:07|/home/user/src").unwrap();

        assert_eq!(payload.path, "/home/user/src");
        assert_eq!(
            payload.last_visited,
            NaiveDate::from_ymd_opt(2024, 5, 17)
                .unwrap()
                .and_hms_opt(9, 41, 7)
                .unwrap()
        );
    }

    #[test]
    fn test_path_may_contain_separator_and_spaces() {
        let payload = PutPayload::parse("01:01:24 00:00:00| /odd|dir ").unwrap();
        assert_eq!(payload.path, " /odd|dir ");
    }

    #[test]
    fn test_missing_separator_is_rejected() {
        let err = PutPayload::parse("01:01:24 00:00:00 /no/separator").unwrap_err();
        assert!(matches!(err, PathTrackError::Protocol(_)));
    }

    #[test]
    fn test_bad_timestamp_is_rejected() {
        let err = PutPayload::parse("2024-01-01T00:00:00|/tmp").unwrap_err();
        assert!(matches!(err, PathTrackError::InvalidTimestamp { .. }));

        let err = PutPayload::parse("32:01:24 00:00:00|/tmp").unwrap_err();
        assert!(matches!(err, PathTrackError::InvalidTimestamp { .. }));
    }

    #[test]
    fn test_empty_path_is_rejected() {
        let err = PutPayload::parse("01:01:24 00:00:00|").unwrap_err();
        assert!(matches!(err, PathTrackError::Protocol(_)));
    }

    #[test]
    fn test_encode_uses_wire_timestamp() {
        let ts = NaiveDate::from_ymd_opt(2023, 12, 3)
            .unwrap()
            .and_hms_opt(4, 5, 6)
            .unwrap();
        let payload = PutPayload::new("/srv", ts);

        assert_eq!(payload.encode(), "03:12:23 04:05:06|/srv");
        assert_eq!(PutPayload::parse(&payload.encode()).unwrap(), payload);
    }
}
