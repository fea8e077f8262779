//! `<algorithm>=<hex>` digest entries as carried in headers and file records.

use std::fmt;
use std::str::FromStr;

use crate::error::MetaError;

/// A named digest value, e.g. `SHA-256=AB12...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestEntry {
    pub algorithm: String,
    pub value: String,
}

impl DigestEntry {
    pub fn new(algorithm: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            value: value.into(),
        }
    }

    /// Returns `true` if both entries name the same algorithm and hex value.
    ///
    /// Comparison ignores ASCII case on both parts, so `sha-256=ab` matches
    /// `SHA-256=AB`.
    pub fn matches(&self, other: &DigestEntry) -> bool {
        self.algorithm.eq_ignore_ascii_case(&other.algorithm)
            && self.value.eq_ignore_ascii_case(&other.value)
    }
}

impl fmt::Display for DigestEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.algorithm, self.value)
    }
}

impl FromStr for DigestEntry {
    type Err = MetaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (algorithm, value) = s
            .split_once('=')
            .ok_or_else(|| MetaError::InvalidDigest(s.to_string()))?;
        let algorithm = algorithm.trim();
        let value = value.trim();
        if algorithm.is_empty() || value.is_empty() {
            return Err(MetaError::InvalidDigest(s.to_string()));
        }
        if !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(MetaError::InvalidDigest(s.to_string()));
        }
        Ok(Self::new(algorithm, value))
    }
}
