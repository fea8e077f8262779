//! Header keys, defaults, and subject naming.

/// Header carrying the part id (`<fileId>-<partNumber>`).
pub const HEADER_ID: &str = "id";

/// Header carrying the owning file id.
pub const HEADER_FILE_ID: &str = "file-id";

/// Header carrying the 1-based part number.
pub const HEADER_PART_NUMBER: &str = "part-number";

/// Header carrying the byte offset of the part in the original file.
pub const HEADER_START: &str = "start";

/// Header carrying the uncompressed part length.
pub const HEADER_LENGTH: &str = "length";

/// Header carrying the encoded payload length (only when encoded).
pub const HEADER_ENCODED_LENGTH: &str = "encoded-length";

/// Header carrying the payload content encoding (only when encoded).
pub const HEADER_CONTENT_ENCODING: &str = "Content-Encoding";

/// Header carrying the `<algorithm>=<hex>` digest of the uncompressed part.
pub const HEADER_DIGEST: &str = "Digest";

/// Default subject prefix for part messages.
pub const DEFAULT_PART_PREFIX: &str = "parts";

/// Content type used when none is given and the extension is unknown.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Subject that carries every part of `file_id`.
pub fn part_subject(prefix: &str, file_id: &str) -> String {
    format!("{prefix}.{file_id}")
}

/// Metadata store key for the record of `file_id`.
pub fn meta_key(file_id: &str) -> String {
    file_id.to_string()
}
