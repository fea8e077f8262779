//! Chunked file transfer over an ordered message log.
//!
//! [`Uploader`] splits a file into parts, publishes them with per-part
//! digests, and stores a [`FileMeta`](chunkrelay_protocol::FileMeta) record
//! once every part is out. [`Downloader`] replays the parts in order,
//! checks each one, and resubscribes from the last good position when
//! something is off.

pub mod config;
pub mod downloader;
pub mod error;
pub mod session;
pub mod source;
pub mod types;
pub mod uploader;

pub use config::{AckPolicy, RelayConfig};
pub use downloader::Downloader;
pub use error::RelayError;
pub use session::{SessionState, TransferSession};
pub use source::{SourceInfo, detect_content_type, inspect_source};
pub use types::{DownloadReport, TransferEvent, UploadOptions, UploadReport, Verification};
pub use uploader::Uploader;
