use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use chunkrelay_protocol::DigestEntry;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::TransferError;

/// Digest algorithms understood by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    /// Canonical name written into headers and file records.
    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha384 => "SHA-384",
            DigestAlgorithm::Sha512 => "SHA-512",
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = TransferError;

    /// Accepts `SHA-256`, `sha256`, `SHA_256` and so on.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_uppercase();
        match normalized.as_str() {
            "SHA256" => Ok(DigestAlgorithm::Sha256),
            "SHA384" => Ok(DigestAlgorithm::Sha384),
            "SHA512" => Ok(DigestAlgorithm::Sha512),
            _ => Err(TransferError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

enum Hasher {
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

impl Hasher {
    fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
            DigestAlgorithm::Sha384 => Hasher::Sha384(Sha384::new()),
            DigestAlgorithm::Sha512 => Hasher::Sha512(Sha512::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Sha256(h) => h.update(data),
            Hasher::Sha384(h) => h.update(data),
            Hasher::Sha512(h) => h.update(data),
        }
    }

    fn finalize_hex(&mut self) -> String {
        match self {
            Hasher::Sha256(h) => hex::encode_upper(h.finalize_reset()),
            Hasher::Sha384(h) => hex::encode_upper(h.finalize_reset()),
            Hasher::Sha512(h) => hex::encode_upper(h.finalize_reset()),
        }
    }
}

/// Incremental digest with an explicit finalize point.
///
/// The first call to [`value`](Self::value) finalizes the digest. After
/// that, `value` keeps returning the same string and further updates are
/// ignored until [`reset`](Self::reset).
pub struct Digester {
    algorithm: DigestAlgorithm,
    hasher: Hasher,
    value: Option<String>,
}

impl Digester {
    /// Creates a digester from an algorithm name such as `SHA-256`.
    pub fn new(algorithm: &str) -> Result<Self, TransferError> {
        Ok(Self::with_algorithm(algorithm.parse()?))
    }

    pub fn with_algorithm(algorithm: DigestAlgorithm) -> Self {
        Self {
            algorithm,
            hasher: Hasher::new(algorithm),
            value: None,
        }
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Clears accumulated input and any finalized value.
    pub fn reset(&mut self) -> &mut Self {
        self.hasher = Hasher::new(self.algorithm);
        self.value = None;
        self
    }

    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        if self.value.is_none() {
            self.hasher.update(data);
        }
        self
    }

    /// Upper-case hex digest of everything fed since the last reset.
    pub fn value(&mut self) -> String {
        if let Some(v) = &self.value {
            return v.clone();
        }
        let v = self.hasher.finalize_hex();
        self.value = Some(v.clone());
        v
    }

    /// `<algorithm>=<hex>` entry for the current value.
    pub fn entry(&mut self) -> DigestEntry {
        DigestEntry::new(self.algorithm.name(), self.value())
    }

    pub fn is_finalized(&self) -> bool {
        self.value.is_some()
    }
}

impl fmt::Debug for Digester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Digester")
            .field("algorithm", &self.algorithm)
            .field("finalized", &self.value.is_some())
            .finish()
    }
}

/// Digest of `data` as upper-case hex.
pub fn digest_bytes(algorithm: DigestAlgorithm, data: &[u8]) -> String {
    Digester::with_algorithm(algorithm).update(data).value()
}

/// Digest of a whole file as upper-case hex.
pub fn digest_file(path: &Path, algorithm: DigestAlgorithm) -> Result<String, TransferError> {
    let mut file = std::fs::File::open(path)?;
    let mut digester = Digester::with_algorithm(algorithm);
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        digester.update(&buf[..n]);
    }
    Ok(digester.value())
}
