//! Whole-file record stored in the metadata store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::digest::DigestEntry;
use crate::error::MetaError;

/// Number of digest bytes kept in a derived file id (24 hex chars).
const FILE_ID_BYTES: usize = 12;

/// Metadata describing one transferred file.
///
/// The digest fields stay empty until every part has been read (upload) or
/// received (download); their presence marks the record as complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub content_type: String,
    pub length: u64,
    pub parts: u64,
    pub part_size: u64,
    pub last_part_size: u64,
    pub file_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest_algorithm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest_value: Option<String>,
    /// Log sequence of part 1 as published by the upload that completed
    /// this record. Parts of earlier attempts on the same subject sit
    /// before it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_sequence: Option<u64>,
}

/// Splits `length` bytes into parts of `part_size`.
///
/// Returns `(parts, last_part_size)` such that
/// `(parts - 1) * part_size + last_part_size == length`.
pub fn part_layout(length: u64, part_size: u64) -> Result<(u64, u64), MetaError> {
    if part_size == 0 {
        return Err(MetaError::ZeroPartSize);
    }
    if length == 0 {
        return Err(MetaError::EmptyFile);
    }
    let parts = length.div_ceil(part_size);
    let last_part_size = length - (parts - 1) * part_size;
    Ok((parts, last_part_size))
}

impl FileMeta {
    /// Builds an incomplete record (no digest yet) for a file.
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        length: u64,
        part_size: u64,
        file_date: DateTime<Utc>,
    ) -> Result<Self, MetaError> {
        let name = name.into();
        let content_type = content_type.into();
        let (parts, last_part_size) = part_layout(length, part_size)?;
        let id = Self::derive_id(&name, &content_type, length, &file_date);
        Ok(Self {
            id,
            name,
            description: String::new(),
            content_type,
            length,
            parts,
            part_size,
            last_part_size,
            file_date,
            digest_algorithm: None,
            digest_value: None,
            first_sequence: None,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Stable id for a file: identical descriptive metadata yields the same id.
    pub fn derive_id(
        name: &str,
        content_type: &str,
        length: u64,
        file_date: &DateTime<Utc>,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(content_type.as_bytes());
        hasher.update([0u8]);
        hasher.update(length.to_be_bytes());
        hasher.update(file_date.timestamp_millis().to_be_bytes());
        let digest = hasher.finalize();
        hex::encode(&digest[..FILE_ID_BYTES])
    }

    /// Whole-file digest, if the record is complete.
    pub fn digest(&self) -> Option<DigestEntry> {
        match (&self.digest_algorithm, &self.digest_value) {
            (Some(algorithm), Some(value)) => Some(DigestEntry::new(algorithm, value)),
            _ => None,
        }
    }

    pub fn set_digest(&mut self, entry: DigestEntry) {
        self.digest_algorithm = Some(entry.algorithm);
        self.digest_value = Some(entry.value);
    }

    /// Returns `true` once the whole-file digest is recorded.
    pub fn is_complete(&self) -> bool {
        self.digest().is_some()
    }

    /// Expected uncompressed length of a 1-based part, `None` if out of range.
    pub fn part_length(&self, part_number: u64) -> Option<u64> {
        if part_number == 0 || part_number > self.parts {
            None
        } else if part_number == self.parts {
            Some(self.last_part_size)
        } else {
            Some(self.part_size)
        }
    }

    /// Byte offset of a 1-based part, `None` if out of range.
    pub fn part_start(&self, part_number: u64) -> Option<u64> {
        self.part_length(part_number)
            .map(|_| (part_number - 1) * self.part_size)
    }

    /// Checks the layout invariant and digest field pairing.
    pub fn validate(&self) -> Result<(), MetaError> {
        if self.id.is_empty() {
            return Err(MetaError::Inconsistent("empty file id".into()));
        }
        let (parts, last_part_size) = part_layout(self.length, self.part_size)?;
        if parts != self.parts || last_part_size != self.last_part_size {
            return Err(MetaError::Inconsistent(format!(
                "length {} with part size {} needs {parts} parts (last {last_part_size}), record says {} (last {})",
                self.length, self.part_size, self.parts, self.last_part_size
            )));
        }
        if self.first_sequence == Some(0) {
            return Err(MetaError::Inconsistent("first sequence must be positive".into()));
        }
        if self.digest_algorithm.is_some() != self.digest_value.is_some() {
            return Err(MetaError::Inconsistent(
                "digest algorithm and value must be set together".into(),
            ));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<Vec<u8>, MetaError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parses and validates a stored record.
    pub fn from_json(data: &[u8]) -> Result<Self, MetaError> {
        let meta: FileMeta = serde_json::from_slice(data)?;
        meta.validate()?;
        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn sample_meta() -> FileMeta {
        FileMeta::new("report.txt", "text/plain", 25, 10, sample_date()).unwrap()
    }

    #[test]
    fn layout_for_partial_last_part() {
        assert_eq!(part_layout(25, 10).unwrap(), (3, 5));
    }

    #[test]
    fn layout_for_exact_multiple() {
        assert_eq!(part_layout(30, 10).unwrap(), (3, 10));
    }

    #[test]
    fn layout_single_part_smaller_than_part_size() {
        assert_eq!(part_layout(7, 1024).unwrap(), (1, 7));
    }

    #[test]
    fn layout_rejects_empty_and_zero_part_size() {
        assert!(matches!(part_layout(0, 10), Err(MetaError::EmptyFile)));
        assert!(matches!(part_layout(10, 0), Err(MetaError::ZeroPartSize)));
    }

    #[test]
    fn layout_invariant_holds_across_sizes() {
        for length in 1..200u64 {
            for part_size in 1..40u64 {
                let (parts, last) = part_layout(length, part_size).unwrap();
                assert!(parts * part_size >= length);
                assert_eq!((parts - 1) * part_size + last, length);
                assert!(last > 0 && last <= part_size);
            }
        }
    }

    #[test]
    fn id_is_deterministic() {
        let a = sample_meta();
        let b = sample_meta();
        assert_eq!(a.id, b.id);
        assert_eq!(a.id.len(), FILE_ID_BYTES * 2);
    }

    #[test]
    fn id_changes_with_descriptive_fields() {
        let base = sample_meta();
        let renamed = FileMeta::new("other.txt", "text/plain", 25, 10, sample_date()).unwrap();
        let longer = FileMeta::new("report.txt", "text/plain", 26, 10, sample_date()).unwrap();
        assert_ne!(base.id, renamed.id);
        assert_ne!(base.id, longer.id);
    }

    #[test]
    fn id_ignores_part_size() {
        let a = FileMeta::new("a.bin", "application/octet-stream", 100, 10, sample_date()).unwrap();
        let b = FileMeta::new("a.bin", "application/octet-stream", 100, 64, sample_date()).unwrap();
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn part_length_and_start() {
        let meta = sample_meta();
        assert_eq!(meta.part_length(1), Some(10));
        assert_eq!(meta.part_length(3), Some(5));
        assert_eq!(meta.part_length(0), None);
        assert_eq!(meta.part_length(4), None);
        assert_eq!(meta.part_start(2), Some(10));
        assert_eq!(meta.part_start(3), Some(20));
    }

    #[test]
    fn digest_marks_completion() {
        let mut meta = sample_meta();
        assert!(!meta.is_complete());
        meta.set_digest(DigestEntry::new("SHA-256", "ABCD"));
        assert!(meta.is_complete());
        assert_eq!(meta.digest().unwrap().to_string(), "SHA-256=ABCD");
    }

    #[test]
    fn json_omits_digest_until_complete() {
        let meta = sample_meta();
        let json = String::from_utf8(meta.to_json().unwrap()).unwrap();
        assert!(json.contains("\"contentType\""));
        assert!(json.contains("\"lastPartSize\":5"));
        assert!(!json.contains("digestValue"));
        assert!(!json.contains("description"));
        assert!(!json.contains("firstSequence"));
    }

    #[test]
    fn json_roundtrip_complete_record() {
        let mut meta = sample_meta().with_description("quarterly numbers");
        meta.set_digest(DigestEntry::new("SHA-256", "0011AABB"));
        let parsed = FileMeta::from_json(&meta.to_json().unwrap()).unwrap();
        assert_eq!(parsed, meta);
    }

    #[test]
    fn from_json_rejects_broken_layout() {
        let mut meta = sample_meta();
        meta.parts = 2;
        let data = serde_json::to_vec(&meta).unwrap();
        assert!(matches!(
            FileMeta::from_json(&data),
            Err(MetaError::Inconsistent(_))
        ));
    }

    #[test]
    fn first_sequence_roundtrips_and_must_be_positive() {
        let mut meta = sample_meta();
        meta.first_sequence = Some(7);
        let json = String::from_utf8(meta.to_json().unwrap()).unwrap();
        assert!(json.contains("\"firstSequence\":7"));
        assert_eq!(FileMeta::from_json(json.as_bytes()).unwrap().first_sequence, Some(7));

        meta.first_sequence = Some(0);
        assert!(FileMeta::from_json(&serde_json::to_vec(&meta).unwrap()).is_err());
    }

    #[test]
    fn from_json_rejects_half_digest() {
        let mut meta = sample_meta();
        meta.digest_algorithm = Some("SHA-256".into());
        let data = serde_json::to_vec(&meta).unwrap();
        assert!(FileMeta::from_json(&data).is_err());
    }
}
