//! Relay configuration.
//!
//! Stored as JSON at `~/.config/chunkrelay/config.json`. Every field has a
//! default, so a partial file is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chunkrelay_protocol::{ContentEncoding, DEFAULT_PART_PREFIX};
use chunkrelay_transfer::{
    Codec, DEFAULT_COMPRESSION_LEVEL, DEFAULT_PART_SIZE, DigestAlgorithm,
};
use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// When the downloader acknowledges accepted parts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckPolicy {
    /// Ack every accepted part.
    #[default]
    Explicit,
    /// Never ack.
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelayConfig {
    /// Parts for file `id` go to `<partPrefix>.<id>`.
    pub part_prefix: String,
    pub part_size: u64,
    /// Payload transform for uploads. `None` publishes raw bytes.
    pub compression: Option<ContentEncoding>,
    pub compression_level: i32,
    pub digest_algorithm: String,
    /// Resubscriptions allowed per download.
    pub retry_budget: u32,
    /// Wait for one message before counting idle time.
    pub read_timeout_ms: u64,
    /// Give up on a download after this much cumulative silence.
    pub max_idle_ms: u64,
    pub ack_policy: AckPolicy,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            part_prefix: DEFAULT_PART_PREFIX.into(),
            part_size: DEFAULT_PART_SIZE as u64,
            compression: None,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            digest_algorithm: DigestAlgorithm::default().name().into(),
            retry_budget: 10,
            read_timeout_ms: 1000,
            max_idle_ms: 10_000,
            ack_policy: AckPolicy::Explicit,
        }
    }
}

impl RelayConfig {
    /// Loads `~/.config/chunkrelay/config.json`.
    pub fn load() -> Result<Self, RelayError> {
        Self::load_from(&config_path())
    }

    /// Loads a config file.
    ///
    /// A missing file yields defaults. A file that fails to parse is logged
    /// and also yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, RelayError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str::<RelayConfig>(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse relay config, using defaults"
                );
                Ok(Self::default())
            }
        }
    }

    /// Writes the config as pretty JSON, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), RelayError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn validate(&self) -> Result<(), RelayError> {
        if self.part_size == 0 {
            return Err(RelayError::Config("partSize must be positive".into()));
        }
        if self.part_prefix.is_empty() || self.part_prefix.chars().any(char::is_whitespace) {
            return Err(RelayError::Config(format!(
                "invalid partPrefix: {:?}",
                self.part_prefix
            )));
        }
        self.digest()?;
        if self.read_timeout_ms == 0 {
            return Err(RelayError::Config("readTimeoutMs must be positive".into()));
        }
        if self.max_idle_ms < self.read_timeout_ms {
            return Err(RelayError::Config(
                "maxIdleMs must be at least readTimeoutMs".into(),
            ));
        }
        Ok(())
    }

    pub fn digest(&self) -> Result<DigestAlgorithm, RelayError> {
        Ok(self.digest_algorithm.parse()?)
    }

    /// Upload codec, if compression is enabled.
    pub fn codec(&self) -> Option<Codec> {
        self.compression
            .map(|encoding| Codec::new(encoding, self.compression_level))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn max_idle(&self) -> Duration {
        Duration::from_millis(self.max_idle_ms)
    }
}

/// `~/.config/chunkrelay/config.json` (or the platform equivalent).
pub fn config_path() -> PathBuf {
    config_base_dir().join("chunkrelay").join("config.json")
}

fn config_base_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home).join(".config")
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata)
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        PathBuf::from("/tmp")
    }
}
