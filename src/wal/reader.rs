//! WAL Reader
//!
//! Reads framed records sequentially from the WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use bytes::Buf;

use super::entry::{HEADER_SIZE, MAX_ENTRY_SIZE};
use super::WalEntry;
use crate::error::{PathTrackError, Result};

/// Outcome of reading one record
pub(super) enum RecordRead {
    Entry(WalEntry),
    /// Clean end of file on a record boundary
    End,
    /// File ends inside a record (partial write)
    Torn,
    /// Record is complete but fails validation
    Corrupt(String),
}

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,

    /// Offset just past the last valid record
    valid_len: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            valid_len: 0,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// `Ok(None)` at a clean end of file; a torn or corrupt record is an error.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        match self.read_record()? {
            RecordRead::Entry(entry) => Ok(Some(entry)),
            RecordRead::End => Ok(None),
            RecordRead::Torn => Err(PathTrackError::WalCorruption(format!(
                "Partial record at offset {}",
                self.valid_len
            ))),
            RecordRead::Corrupt(reason) => Err(PathTrackError::WalCorruption(format!(
                "{} at offset {}",
                reason, self.valid_len
            ))),
        }
    }

    /// Byte length of the valid prefix read so far
    pub fn valid_len(&self) -> u64 {
        self.valid_len
    }

    /// Iterate over entries; stops after the first error
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }

    pub(super) fn read_record(&mut self) -> Result<RecordRead> {
        let mut header = [0u8; HEADER_SIZE];
        let got = read_full(&mut self.reader, &mut header)?;
        if got == 0 {
            return Ok(RecordRead::End);
        }
        if got < HEADER_SIZE {
            return Ok(RecordRead::Torn);
        }

        let mut cursor = &header[..];
        let len = cursor.get_u32() as usize;
        let crc = cursor.get_u32();

        if len > MAX_ENTRY_SIZE {
            return Ok(RecordRead::Corrupt(format!(
                "Record length {} exceeds maximum {}",
                len, MAX_ENTRY_SIZE
            )));
        }

        let mut payload = vec![0u8; len];
        if read_full(&mut self.reader, &mut payload)? < len {
            return Ok(RecordRead::Torn);
        }

        match WalEntry::decode_payload(&payload, crc) {
            Ok(entry) => {
                self.valid_len += (HEADER_SIZE + len) as u64;
                Ok(RecordRead::Entry(entry))
            }
            Err(e) => Ok(RecordRead::Corrupt(e.to_string())),
        }
    }
}

/// Fill `buf` as far as the file allows; returns the number of bytes read
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// Iterator over WAL entries
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
