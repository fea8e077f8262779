//! Errors produced while mapping records to and from the wire.

/// Errors produced by the protocol crate.
#[derive(Debug, thiserror::Error)]
pub enum MetaError {
    #[error("missing header: {0}")]
    MissingHeader(&'static str),

    #[error("invalid header {key}: {value:?}")]
    InvalidHeader { key: &'static str, value: String },

    #[error("invalid digest entry: {0:?}")]
    InvalidDigest(String),

    #[error("unsupported content encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("file is empty")]
    EmptyFile,

    #[error("part size must be greater than zero")]
    ZeroPartSize,

    #[error("inconsistent record: {0}")]
    Inconsistent(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
