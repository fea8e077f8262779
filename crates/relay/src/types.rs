//! Data types for the upload and download flows.

use chunkrelay_protocol::FileMeta;

/// Caller overrides for the descriptive fields of a file record.
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Record name. Defaults to the source file name.
    pub name: Option<String>,
    pub description: Option<String>,
    /// Defaults to a guess from the extension.
    pub content_type: Option<String>,
}

/// Outcome of comparing a rebuilt file against its record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Every part arrived and the whole-file digest matches.
    Verified,
    /// Every part arrived but the whole-file digest differs.
    DigestMismatch { expected: String, actual: String },
    /// The stream went idle before every part arrived.
    Incomplete {
        expected_parts: u64,
        received_parts: u64,
    },
}

impl Verification {
    pub fn is_verified(&self) -> bool {
        matches!(self, Verification::Verified)
    }
}

#[derive(Debug, Clone)]
pub struct UploadReport {
    /// The record as stored, digest included.
    pub meta: FileMeta,
    pub subject: String,
    pub bytes_read: u64,
    /// Payload bytes after encoding.
    pub bytes_published: u64,
    pub first_sequence: u64,
    pub last_sequence: u64,
    /// Metadata store revision of the record.
    pub revision: u64,
}

#[derive(Debug, Clone)]
pub struct DownloadReport {
    pub file_id: String,
    pub name: String,
    pub parts_written: u64,
    pub bytes_written: u64,
    /// Log sequences of the first and last accepted parts.
    pub first_sequence: Option<u64>,
    pub last_sequence: Option<u64>,
    pub recoveries: u32,
    pub flow_control_acks: u64,
    /// Whole-file digest of what was written, `<algorithm>=<hex>`.
    pub digest: String,
    pub verification: Verification,
}

/// Progress event emitted during a transfer.
#[derive(Debug, Clone)]
pub enum TransferEvent {
    PartPublished {
        file_id: String,
        part_number: u64,
        parts: u64,
        stream_sequence: u64,
        bytes_per_second: f64,
    },
    PartAccepted {
        file_id: String,
        part_number: u64,
        parts: u64,
        bytes_written: u64,
        bytes_per_second: f64,
    },
    FlowControlAcknowledged { file_id: String },
    /// The downloader resubscribed after an anomaly.
    Recovering {
        file_id: String,
        reason: String,
        resume_sequence: u64,
        retries_left: u32,
    },
    Completed { file_id: String, bytes: u64 },
    Failed { file_id: String, error: String },
}
