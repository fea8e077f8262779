use std::io::Read;
use std::path::Path;

use crate::{DEFAULT_PART_SIZE, TransferError};

/// One part read from a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 1-based ordinal.
    pub part_number: u64,
    /// Offset of the first byte in the file.
    pub start: u64,
    pub data: Vec<u8>,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Reads a file in fixed-size parts, numbered from 1.
///
/// Every part except the last is exactly `part_size` bytes. If the file
/// shrinks while being read, the reader returns what it got and then stops;
/// callers compare [`offset`](Self::offset) with the size they expected.
#[derive(Debug)]
pub struct ChunkReader {
    file: std::fs::File,
    part_size: usize,
    offset: u64,
    next_part: u64,
    file_size: u64,
    exhausted: bool,
}

impl ChunkReader {
    /// Opens `path` for chunked reading.
    ///
    /// If `part_size` is 0, [`DEFAULT_PART_SIZE`] (64 KiB) is used.
    pub fn new(path: &Path, part_size: usize) -> Result<Self, TransferError> {
        let file = std::fs::File::open(path)?;
        let file_size = file.metadata()?.len();
        let part_size = if part_size == 0 {
            DEFAULT_PART_SIZE
        } else {
            part_size
        };
        Ok(Self {
            file,
            part_size,
            offset: 0,
            next_part: 1,
            file_size,
            exhausted: false,
        })
    }

    /// Reads the next part. Returns `None` at EOF.
    pub fn next_chunk(&mut self) -> Result<Option<Chunk>, TransferError> {
        if self.exhausted || self.offset >= self.file_size {
            return Ok(None);
        }

        let want = (self.file_size - self.offset).min(self.part_size as u64) as usize;
        let mut buf = vec![0u8; want];
        let mut filled = 0;
        while filled < want {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        if filled < want {
            self.exhausted = true;
        }
        if filled == 0 {
            return Ok(None);
        }
        buf.truncate(filled);

        let chunk = Chunk {
            part_number: self.next_part,
            start: self.offset,
            data: buf,
        };
        self.offset += filled as u64;
        self.next_part += 1;
        Ok(Some(chunk))
    }

    /// Bytes read so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// File size observed when the reader was opened.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn remaining(&self) -> u64 {
        self.file_size.saturating_sub(self.offset)
    }

    pub fn part_size(&self) -> usize {
        self.part_size
    }

    /// Number of parts returned so far.
    pub fn parts_read(&self) -> u64 {
        self.next_part - 1
    }
}
