//! Wire types for chunkrelay.
//!
//! A file travels as an ordered run of part messages on one subject, each
//! described by a [`PartMeta`] in its headers, followed by a [`FileMeta`]
//! record written to the metadata store once every part is out.

pub mod constants;
pub mod digest;
pub mod error;
pub mod file_meta;
pub mod headers;
pub mod part_meta;

// Re-export primary types for convenience.
pub use constants::{DEFAULT_CONTENT_TYPE, DEFAULT_PART_PREFIX, meta_key, part_subject};
pub use digest::DigestEntry;
pub use error::MetaError;
pub use file_meta::{FileMeta, part_layout};
pub use headers::Headers;
pub use part_meta::{ContentEncoding, PartMeta};
