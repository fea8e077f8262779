//! Per-part metadata carried as message headers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{
    HEADER_CONTENT_ENCODING, HEADER_DIGEST, HEADER_ENCODED_LENGTH, HEADER_FILE_ID, HEADER_ID,
    HEADER_LENGTH, HEADER_PART_NUMBER, HEADER_START,
};
use crate::digest::DigestEntry;
use crate::error::MetaError;
use crate::headers::Headers;

/// Transform applied to a part payload before publishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentEncoding {
    Zstd,
}

impl ContentEncoding {
    /// Token used in the `Content-Encoding` header.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentEncoding::Zstd => "zstd",
        }
    }
}

impl fmt::Display for ContentEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentEncoding {
    type Err = MetaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zstd" => Ok(ContentEncoding::Zstd),
            other => Err(MetaError::UnsupportedEncoding(other.to_string())),
        }
    }
}

/// Metadata for one part of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartMeta {
    /// `<fileId>-<partNumber>`.
    pub id: String,
    pub file_id: String,
    /// 1-based ordinal.
    pub part_number: u64,
    /// Offset of this part in the uncompressed file.
    pub start: u64,
    /// Uncompressed length.
    pub length: u64,
    /// Payload length and transform, set only when the payload is encoded.
    pub encoded_length: Option<u64>,
    pub content_encoding: Option<ContentEncoding>,
    /// Digest of the uncompressed bytes.
    pub digest: DigestEntry,
}

impl PartMeta {
    /// Describes an unencoded part.
    pub fn new(
        file_id: impl Into<String>,
        part_number: u64,
        start: u64,
        length: u64,
        digest: DigestEntry,
    ) -> Self {
        let file_id = file_id.into();
        Self {
            id: Self::part_id(&file_id, part_number),
            file_id,
            part_number,
            start,
            length,
            encoded_length: None,
            content_encoding: None,
            digest,
        }
    }

    /// Marks the payload as encoded.
    pub fn with_encoding(mut self, encoding: ContentEncoding, encoded_length: u64) -> Self {
        self.content_encoding = Some(encoding);
        self.encoded_length = Some(encoded_length);
        self
    }

    pub fn part_id(file_id: &str, part_number: u64) -> String {
        format!("{file_id}-{part_number}")
    }

    /// Length of the payload as published.
    pub fn payload_length(&self) -> u64 {
        self.encoded_length.unwrap_or(self.length)
    }

    pub fn to_headers(&self) -> Headers {
        let mut h = Headers::new();
        h.insert(HEADER_ID, self.id.as_str());
        h.insert(HEADER_FILE_ID, self.file_id.as_str());
        h.insert(HEADER_PART_NUMBER, self.part_number.to_string());
        h.insert(HEADER_START, self.start.to_string());
        h.insert(HEADER_LENGTH, self.length.to_string());
        if let (Some(encoding), Some(encoded_length)) = (self.content_encoding, self.encoded_length)
        {
            h.insert(HEADER_ENCODED_LENGTH, encoded_length.to_string());
            h.insert(HEADER_CONTENT_ENCODING, encoding.as_str());
        }
        h.insert(HEADER_DIGEST, self.digest.to_string());
        h
    }

    pub fn from_headers(headers: &Headers) -> Result<Self, MetaError> {
        let file_id = required(headers, HEADER_FILE_ID)?.to_string();
        let part_number = required_u64(headers, HEADER_PART_NUMBER)?;
        if part_number == 0 {
            return Err(MetaError::InvalidHeader {
                key: HEADER_PART_NUMBER,
                value: "0".into(),
            });
        }
        let start = required_u64(headers, HEADER_START)?;
        let length = required_u64(headers, HEADER_LENGTH)?;
        let digest: DigestEntry = required(headers, HEADER_DIGEST)?.parse()?;

        let encoded_length = optional_u64(headers, HEADER_ENCODED_LENGTH)?;
        let content_encoding = headers
            .get(HEADER_CONTENT_ENCODING)
            .map(ContentEncoding::from_str)
            .transpose()?;
        if encoded_length.is_some() != content_encoding.is_some() {
            return Err(MetaError::Inconsistent(format!(
                "{HEADER_ENCODED_LENGTH} and {HEADER_CONTENT_ENCODING} must be set together"
            )));
        }

        let id = match headers.get(HEADER_ID) {
            Some(id) => id.to_string(),
            None => Self::part_id(&file_id, part_number),
        };

        Ok(Self {
            id,
            file_id,
            part_number,
            start,
            length,
            encoded_length,
            content_encoding,
            digest,
        })
    }
}

fn required<'a>(headers: &'a Headers, key: &'static str) -> Result<&'a str, MetaError> {
    headers.get(key).ok_or(MetaError::MissingHeader(key))
}

fn parse_u64(key: &'static str, value: &str) -> Result<u64, MetaError> {
    value.trim().parse().map_err(|_| MetaError::InvalidHeader {
        key,
        value: value.to_string(),
    })
}

fn required_u64(headers: &Headers, key: &'static str) -> Result<u64, MetaError> {
    parse_u64(key, required(headers, key)?)
}

fn optional_u64(headers: &Headers, key: &'static str) -> Result<Option<u64>, MetaError> {
    headers.get(key).map(|v| parse_u64(key, v)).transpose()
}
