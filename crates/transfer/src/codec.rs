use chunkrelay_protocol::ContentEncoding;

use crate::TransferError;

pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;
pub const MAX_COMPRESSION_LEVEL: i32 = 22;

/// Payload transform for one content encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codec {
    encoding: ContentEncoding,
    level: i32,
}

impl Codec {
    /// Creates a codec. `level` is clamped to `1..=22`.
    pub fn new(encoding: ContentEncoding, level: i32) -> Self {
        Self {
            encoding,
            level: level.clamp(1, MAX_COMPRESSION_LEVEL),
        }
    }

    pub fn zstd() -> Self {
        Self::new(ContentEncoding::Zstd, DEFAULT_COMPRESSION_LEVEL)
    }

    pub fn encoding(&self) -> ContentEncoding {
        self.encoding
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    pub fn encode(&self, data: &[u8]) -> Result<Vec<u8>, TransferError> {
        match self.encoding {
            ContentEncoding::Zstd => {
                zstd::encode_all(data, self.level).map_err(|e| self.error(e))
            }
        }
    }

    /// Decodes `data`, failing if the output would exceed `max_len` bytes.
    pub fn decode(&self, data: &[u8], max_len: usize) -> Result<Vec<u8>, TransferError> {
        match self.encoding {
            ContentEncoding::Zstd => {
                zstd::bulk::decompress(data, max_len).map_err(|e| self.error(e))
            }
        }
    }

    fn error(&self, e: std::io::Error) -> TransferError {
        TransferError::Codec {
            encoding: self.encoding,
            reason: e.to_string(),
        }
    }
}

/// Reverses the transform named by a part's `Content-Encoding`, if any.
///
/// Decoded output is capped at `max_len` bytes.
pub fn decode_payload(
    encoding: Option<ContentEncoding>,
    payload: &[u8],
    max_len: usize,
) -> Result<Vec<u8>, TransferError> {
    match encoding {
        None => Ok(payload.to_vec()),
        Some(encoding) => Codec::new(encoding, DEFAULT_COMPRESSION_LEVEL).decode(payload, max_len),
    }
}
