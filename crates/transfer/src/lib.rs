//! Chunk reading, digests, and payload codecs.
//!
//! Everything here is synchronous and transport-agnostic; the relay crate
//! drives it from the upload and download loops.

mod chunked;
mod codec;
mod digester;
mod progress;
mod validation;

pub use chunked::{Chunk, ChunkReader};
pub use codec::{Codec, DEFAULT_COMPRESSION_LEVEL, MAX_COMPRESSION_LEVEL, decode_payload};
pub use digester::{DigestAlgorithm, Digester, digest_bytes, digest_file};
pub use progress::ThroughputMeter;
pub use validation::validate_output_name;

/// Default part size: 64 KiB.
pub const DEFAULT_PART_SIZE: usize = 64 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("{encoding} codec failed: {reason}")]
    Codec {
        encoding: chunkrelay_protocol::ContentEncoding,
        reason: String,
    },

    #[error("invalid path: {0}")]
    InvalidPath(String),
}
