//! Relay error types.

use chunkrelay_protocol::MetaError;
use chunkrelay_stream::TransportError;
use chunkrelay_transfer::TransferError;

/// Errors returned to callers of the uploader and downloader.
///
/// Per-part anomalies seen while downloading are recovered internally and
/// only surface as [`RelayError::TooManyMismatches`] once the retry budget
/// is spent.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("metadata error: {0}")]
    Meta(#[from] MetaError),

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("source not found: {0}")]
    SourceNotFound(String),

    #[error("source is not a regular file: {0}")]
    SourceNotFile(String),

    #[error("source is empty: {0}")]
    EmptySource(String),

    #[error("short read: expected {expected} bytes, read {actual}")]
    ShortRead { expected: u64, actual: u64 },

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("upload of {0} has not completed")]
    UploadIncomplete(String),

    #[error(
        "too many mismatches after {attempts} recoveries ({parts_written} parts, {bytes_written} bytes written)"
    )]
    TooManyMismatches {
        attempts: u32,
        parts_written: u64,
        bytes_written: u64,
    },

    #[error("cancelled")]
    Cancelled,

    #[error("task failed: {0}")]
    Task(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
