//! WAL Entry definitions
//!
//! Defines the structure of individual WAL records and their framing.

use bytes::{Buf, BufMut, BytesMut};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{PathTrackError, Result};

/// Record header: payload length (4) + CRC32 (4)
pub const HEADER_SIZE: usize = 8;

/// Largest payload a record may carry (1 MB)
pub const MAX_ENTRY_SIZE: usize = 1024 * 1024;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The operation to replay
    pub operation: Operation,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// A directory was visited; replaces any earlier visit of the same path
    Visit {
        path: String,
        last_visited: NaiveDateTime,
    },
}

impl WalEntry {
    pub fn new(lsn: u64, operation: Operation) -> Self {
        Self { lsn, operation }
    }

    /// Encode as a framed record: len + crc + payload
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        if payload.len() > MAX_ENTRY_SIZE {
            return Err(PathTrackError::WalWrite(format!(
                "Entry too large: {} bytes (max {})",
                payload.len(),
                MAX_ENTRY_SIZE
            )));
        }

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
        buf.put_u32(payload.len() as u32);
        buf.put_u32(crc32fast::hash(&payload));
        buf.put_slice(&payload);
        Ok(buf.to_vec())
    }

    /// Decode one framed record from the front of `bytes`
    ///
    /// Returns the entry and the number of bytes consumed.
    pub fn deserialize(bytes: &[u8]) -> Result<(Self, usize)> {
        if bytes.len() < HEADER_SIZE {
            return Err(PathTrackError::WalCorruption(format!(
                "Incomplete header: expected {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }

        let mut header = &bytes[..HEADER_SIZE];
        let len = header.get_u32() as usize;
        let crc = header.get_u32();

        if len > MAX_ENTRY_SIZE {
            return Err(PathTrackError::WalCorruption(format!(
                "Record length {} exceeds maximum {}",
                len, MAX_ENTRY_SIZE
            )));
        }

        let end = HEADER_SIZE + len;
        if bytes.len() < end {
            return Err(PathTrackError::WalCorruption(format!(
                "Incomplete payload: expected {} bytes, got {}",
                len,
                bytes.len() - HEADER_SIZE
            )));
        }

        let entry = Self::decode_payload(&bytes[HEADER_SIZE..end], crc)?;
        Ok((entry, end))
    }

    /// Verify the checksum and decode a payload
    pub(super) fn decode_payload(payload: &[u8], expected_crc: u32) -> Result<Self> {
        let actual = crc32fast::hash(payload);
        if actual != expected_crc {
            return Err(PathTrackError::WalCorruption(format!(
                "CRC mismatch: expected {:08x}, got {:08x}",
                expected_crc, actual
            )));
        }

        bincode::deserialize(payload)
            .map_err(|e| PathTrackError::WalCorruption(format!("Undecodable entry: {}", e)))
    }

    /// Path touched by this entry
    pub fn path(&self) -> &str {
        match &self.operation {
            Operation::Visit { path, .. } => path,
        }
    }
}
