//! Command definitions
//!
//! The first line a client sends selects one of these.

use std::fmt;

/// A parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Record a visit; a payload line follows
    Put,

    /// List all tracked paths, most recent first
    Get,

    /// Anything else, kept for logging
    Unknown(String),
}

impl Command {
    /// Parse a command line (surrounding whitespace ignored, case-sensitive)
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "PUT" => Command::Put,
            "GET" => Command::Get,
            other => Command::Unknown(other.to_string()),
        }
    }

    /// Wire form of the command
    pub fn as_str(&self) -> &str {
        match self {
            Command::Put => "PUT",
            Command::Get => "GET",
            Command::Unknown(raw) => raw.as_str(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_commands() {
        assert_eq!(Command::parse("PUT"), Command::Put);
        assert_eq!(Command::parse("GET\r"), Command::Get);
        assert_eq!(Command::parse("  GET "), Command::Get);
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        assert_eq!(Command::parse("get"), Command::Unknown("get".to_string()));
        assert_eq!(Command::parse("DELETE"), Command::Unknown("DELETE".to_string()));
    }

    #[test]
    fn test_display_matches_wire_form() {
        assert_eq!(Command::Put.to_string(), "PUT");
        assert_eq!(Command::Get.to_string(), "GET");
    }
}
