//! Path Table Module
//!
//! In-memory view of every tracked directory, rebuilt from the WAL on open.
//!
//! ## Responsibilities
//! - Exactly one entry per distinct path string (last write wins)
//! - Concurrent readers, exclusive writer
//! - Recency-ordered snapshots for GET
//!
//! ## Ordering
//! `last_visited` descending; equal timestamps fall back to the path in
//! ascending byte order so listings are stable.

mod recency;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{PathTrackError, Result};

pub use recency::PathTable;

/// A tracked directory and the time it was last visited
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEntry {
    pub path: String,
    pub last_visited: NaiveDateTime,
}

/// Paths must survive a trip through the line protocol unchanged
///
/// Checked by the client before sending and by the engine before logging.
pub fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(PathTrackError::InvalidPath("path is empty".to_string()));
    }
    if path.contains('\n') {
        return Err(PathTrackError::InvalidPath(format!(
            "path contains a line feed: {:?}",
            path
        )));
    }
    Ok(())
}

impl PathEntry {
    pub fn new(path: impl Into<String>, last_visited: NaiveDateTime) -> Self {
        Self {
            path: path.into(),
            last_visited,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_path() {
        assert!(validate_path("/home/u/with space|pipe").is_ok());
        assert!(matches!(validate_path(""), Err(PathTrackError::InvalidPath(_))));
        assert!(matches!(
            validate_path("/home/u/a\nb"),
            Err(PathTrackError::InvalidPath(_))
        ));
    }
}
